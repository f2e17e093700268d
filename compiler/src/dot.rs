// dot.rs — Graphviz DOT output for scope graphs
//
// Renders scope graphs in DOT format: one standalone graph per scope, and a
// flattened graph with one cluster per scope, call → child-start links and a
// dashed overlay joining the two endpoints of each channel.
//
// Preconditions: `root` is a fully stitched (or reduced) scope tree built
//   from `program`.
// Postconditions: returns valid DOT text; file output is deterministic.
// Failure modes: a channel without exactly one put and one get →
//   DepError::ChannelNotInPairs; file system errors → DepError::Io.
// Side effects: `dump_files` writes into the dump directory.

use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::diag::DepError;
use crate::graph::{scope_name, ScopeGraph, ScopeKind, TaskNode, VertexKind};
use crate::id::OpId;
use crate::ir::{channel_endpoints, Program};

/// Emit a single scope (without its children) as a DOT string.
pub fn emit_scope_dot(scope: &ScopeGraph, name: &str) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph {} {{", sanitize(name)).unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    for v in scope.graph.node_indices() {
        writeln!(buf, "    n{} [{}];", v.index(), node_attrs(&scope.graph[v])).unwrap();
    }
    for (a, b) in sorted_edges(scope) {
        writeln!(buf, "    n{a} -> n{b};").unwrap();
    }
    writeln!(buf, "}}").unwrap();
    buf
}

/// Emit the whole tree as one DOT graph with a cluster per scope and the
/// channel overlay.
pub fn emit_flat_dot(program: &Program, root: &ScopeGraph) -> Result<String, DepError> {
    let scopes = root.scopes();
    let index_of: HashMap<Vec<usize>, usize> = scopes
        .iter()
        .enumerate()
        .map(|(i, (path, _))| (path.clone(), i))
        .collect();

    let mut buf = String::new();
    writeln!(buf, "digraph depcanon {{").unwrap();
    writeln!(buf, "    rankdir=LR;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();

    let mut per_kind: HashMap<ScopeKind, usize> = HashMap::new();
    let mut channel_vertices: HashMap<OpId, String> = HashMap::new();
    for (i, (_, scope)) in scopes.iter().enumerate() {
        let seq = per_kind.entry(scope.kind).or_insert(0);
        let label = format!("{}{}", scope.kind.as_str(), seq);
        *seq += 1;

        writeln!(buf).unwrap();
        writeln!(buf, "    subgraph cluster{i} {{").unwrap();
        writeln!(buf, "        label=\"{label}\";").unwrap();
        writeln!(buf, "        style=rounded;").unwrap();
        writeln!(buf, "        color=gray50;").unwrap();
        for v in scope.graph.node_indices() {
            let node = &scope.graph[v];
            writeln!(buf, "        s{i}_n{} [{}];", v.index(), node_attrs(node)).unwrap();
            if let (VertexKind::Channel, Some(op)) = (node.kind(), node.op) {
                channel_vertices.insert(op, format!("s{i}_n{}", v.index()));
            }
        }
        for (a, b) in sorted_edges(scope) {
            writeln!(buf, "        s{i}_n{a} -> s{i}_n{b};").unwrap();
        }
        writeln!(buf, "    }}").unwrap();
    }

    // Hierarchy calls enter their child scope.
    let mut wrote_header = false;
    for (i, (path, scope)) in scopes.iter().enumerate() {
        for v in scope.graph.node_indices() {
            let Some(child) = scope.graph[v].child() else {
                continue;
            };
            let mut child_path = path.clone();
            child_path.push(child);
            let (Some(&c), Some(child_scope)) = (index_of.get(&child_path), scope.children.get(child))
            else {
                continue;
            };
            if !wrote_header {
                writeln!(buf).unwrap();
                writeln!(buf, "    // Hierarchy calls").unwrap();
                wrote_header = true;
            }
            writeln!(
                buf,
                "    s{i}_n{} -> s{c}_n{} [style=dotted];",
                v.index(),
                child_scope.start.index()
            )
            .unwrap();
        }
    }

    // Channel overlay
    let endpoints = channel_endpoints(program);
    let mut channels: Vec<&String> = endpoints.keys().collect();
    channels.sort();
    if !channels.is_empty() {
        writeln!(buf).unwrap();
        writeln!(buf, "    // Channels").unwrap();
    }
    for channel in channels {
        let (puts, gets) = &endpoints[channel];
        let ([put], [get]) = (puts.as_slice(), gets.as_slice()) else {
            return Err(DepError::ChannelNotInPairs {
                channel: channel.clone(),
                puts: puts.len(),
                gets: gets.len(),
            });
        };
        if let (Some(p), Some(g)) = (channel_vertices.get(put), channel_vertices.get(get)) {
            writeln!(
                buf,
                "    {p} -> {g} [label=\"{channel}\", style=dashed, color=red, constraint=false];"
            )
            .unwrap();
        }
    }

    writeln!(buf, "}}").unwrap();
    Ok(buf)
}

/// Write `graph.dot` and one file per scope into `dir`. Returns the paths
/// written, in order.
pub fn dump_files(program: &Program, root: &ScopeGraph, dir: &Path) -> Result<Vec<PathBuf>, DepError> {
    let io_err = |path: &Path| {
        let path = path.display().to_string();
        move |source| DepError::Io { path, source }
    };
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;

    let mut written = Vec::new();
    let flat = emit_flat_dot(program, root)?;
    let path = dir.join("graph.dot");
    std::fs::write(&path, flat).map_err(io_err(&path))?;
    written.push(path);

    for (scope_path, scope) in root.scopes() {
        let name = scope_name(scope.kind, &scope_path);
        let path = dir.join(format!("{name}.dot"));
        std::fs::write(&path, emit_scope_dot(scope, &name)).map_err(io_err(&path))?;
        written.push(path);
    }
    tracing::info!(files = written.len(), dir = %dir.display(), "wrote graph dumps");
    Ok(written)
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_attrs(node: &TaskNode) -> String {
    let kind = node.kind();
    format!(
        "label=\"{}\", shape={}, style=filled, fillcolor={}",
        escape(&node.label),
        kind.shape(),
        kind.color()
    )
}

fn sorted_edges(scope: &ScopeGraph) -> Vec<(usize, usize)> {
    let mut edges: Vec<(usize, usize)> = scope
        .graph
        .raw_edges()
        .iter()
        .map(|e| (e.source().index(), e.target().index()))
        .collect();
    edges.sort();
    edges
}

// ── Tests ───────────────────────────────────────────────────────────────────
