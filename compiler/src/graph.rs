// graph.rs — Per-scope dependency graph construction
//
// Walks the program and builds one `ScopeGraph` per nesting scope: the host
// scope (every function body) and one child scope per hierarchy call. Only
// operations directly inside a scope (not inside a nested hierarchy body)
// become vertices of that scope. A compute block is expanded into a linear
// chain of sub-vertices, one per primitive effect, with the block's own
// handle attached to the entry vertex.
//
// Preconditions: `program` is lowered and structurally valid.
// Postconditions: returns the scope tree with start vertices, chain edges,
//   and every vertex registered in the `DependencyContext`. No dependency
//   edges yet — those come from `edges::resolve_edges`.
// Failure modes: a non-primitive op inside a compute body → DepError.
// Side effects: none.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::diag::DepError;
use crate::id::{BlockId, NodeKey, OpId, SeqAllocator};
use crate::ir::{channel_endpoints, HierarchyLevel, OpKind, Program};

// ── Public types ────────────────────────────────────────────────────────────

/// The kind of a vertex. Sequence numbers are allocated per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    Start,
    Transfer,
    Channel,
    Compute,
    ControlLoop,
    HierarchyCall,
    HierarchyTerminator,
    Barrier,
    Terminator,
}

impl VertexKind {
    pub const COUNT: usize = 9;

    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VertexKind::Start => "start",
            VertexKind::Transfer => "transfer",
            VertexKind::Channel => "channel",
            VertexKind::Compute => "compute",
            VertexKind::ControlLoop => "control_loop",
            VertexKind::HierarchyCall => "hierarchy",
            VertexKind::HierarchyTerminator => "hierarchy_terminator",
            VertexKind::Barrier => "barrier",
            VertexKind::Terminator => "terminator",
        }
    }

    /// Fill color used by the exporters.
    pub fn color(self) -> &'static str {
        match self {
            VertexKind::Start | VertexKind::HierarchyCall | VertexKind::HierarchyTerminator => {
                "yellow"
            }
            VertexKind::Transfer | VertexKind::Channel => "cyan",
            VertexKind::Compute => "chartreuse",
            VertexKind::ControlLoop | VertexKind::Barrier | VertexKind::Terminator => "crimson",
        }
    }

    /// Node shape used by the exporters.
    pub fn shape(self) -> &'static str {
        match self {
            VertexKind::Transfer
            | VertexKind::Channel
            | VertexKind::Compute
            | VertexKind::Barrier => "oval",
            _ => "box",
        }
    }
}

/// Which nesting level a scope graph models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Host,
    Launch,
    Segment,
    Herd,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Host => "host",
            ScopeKind::Launch => "launch",
            ScopeKind::Segment => "segment",
            ScopeKind::Herd => "herd",
        }
    }
}

impl From<HierarchyLevel> for ScopeKind {
    fn from(level: HierarchyLevel) -> Self {
        match level {
            HierarchyLevel::Launch => ScopeKind::Launch,
            HierarchyLevel::Segment => ScopeKind::Segment,
            HierarchyLevel::Herd => ScopeKind::Herd,
        }
    }
}

/// Link between a vertex and a neighbouring scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLink {
    /// Hierarchy-call vertex → index into the owning scope's `children`.
    Child(usize),
    /// Child terminator → hierarchy-call vertex in the parent scope's graph.
    Parent(NodeIndex),
}

/// A vertex: one asynchronous event in a scope.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub key: NodeKey,
    pub label: String,
    /// Backing operation. On a compute chain only the entry vertex has one.
    pub op: Option<OpId>,
    /// Operation whose completion this vertex belongs to (shared by every
    /// vertex of a compute chain).
    pub owner: Option<OpId>,
    pub link: Option<ScopeLink>,
}

impl TaskNode {
    pub fn kind(&self) -> VertexKind {
        self.key.kind
    }

    pub fn child(&self) -> Option<usize> {
        match self.link {
            Some(ScopeLink::Child(i)) => Some(i),
            _ => None,
        }
    }
}

/// Dependency graph of one nesting scope. Owns its child scopes.
#[derive(Debug, Clone)]
pub struct ScopeGraph {
    pub kind: ScopeKind,
    /// Hierarchy call this scope is the body of (`None` for the host scope).
    pub hierarchy_op: Option<OpId>,
    pub graph: DiGraph<TaskNode, ()>,
    pub start: NodeIndex,
    pub terminator: Option<NodeIndex>,
    pub children: Vec<ScopeGraph>,
}

/// Position of a scope in the tree: child indices from the root.
pub type ScopePath = Vec<usize>;

impl ScopeGraph {
    fn new(kind: ScopeKind, hierarchy_op: Option<OpId>, start: TaskNode) -> Self {
        let mut graph = DiGraph::new();
        let start = graph.add_node(start);
        ScopeGraph {
            kind,
            hierarchy_op,
            graph,
            start,
            terminator: None,
            children: Vec::new(),
        }
    }

    pub fn node(&self, v: NodeIndex) -> &TaskNode {
        &self.graph[v]
    }

    /// Add `a → b` unless present. Returns whether an edge was added.
    pub fn add_edge_if_new(&mut self, a: NodeIndex, b: NodeIndex) -> bool {
        if self.graph.find_edge(a, b).is_some() {
            return false;
        }
        self.graph.add_edge(a, b, ());
        true
    }

    pub fn in_degree(&self, v: NodeIndex) -> usize {
        self.graph.neighbors_directed(v, Direction::Incoming).count()
    }

    pub fn out_degree(&self, v: NodeIndex) -> usize {
        self.graph.neighbors_directed(v, Direction::Outgoing).count()
    }

    /// Hierarchy-call vertices in vertex (declaration) order.
    pub fn call_vertices(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&v| self.graph[v].kind() == VertexKind::HierarchyCall)
            .collect()
    }

    pub fn scope(&self, path: &[usize]) -> Option<&ScopeGraph> {
        let mut current = self;
        for &i in path {
            current = current.children.get(i)?;
        }
        Some(current)
    }

    pub fn scope_mut(&mut self, path: &[usize]) -> Option<&mut ScopeGraph> {
        let mut current = self;
        for &i in path {
            current = current.children.get_mut(i)?;
        }
        Some(current)
    }

    /// Every scope in the tree with its path, parents before children.
    pub fn scopes(&self) -> Vec<(ScopePath, &ScopeGraph)> {
        let mut out = Vec::new();
        let mut stack: Vec<(ScopePath, &ScopeGraph)> = vec![(Vec::new(), self)];
        while let Some((path, scope)) = stack.pop() {
            for (i, child) in scope.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child_path, child));
            }
            out.push((path, scope));
        }
        out
    }

    /// Edge set as (source key, target key) pairs.
    pub fn edge_keys(&self) -> BTreeSet<(NodeKey, NodeKey)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].key, self.graph[e.target()].key))
            .collect()
    }

    pub fn find_key(&self, key: NodeKey) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&v| self.graph[v].key == key)
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Total vertex and edge counts over the whole tree.
    pub fn totals(&self) -> (usize, usize) {
        self.scopes().iter().fold((0, 0), |(v, e), (_, s)| {
            (v + s.vertex_count(), e + s.edge_count())
        })
    }
}

/// Deterministic scope name: `host`, `launch_1`, `segment_1.2`, `herd_1.2.1`.
pub fn scope_name(kind: ScopeKind, path: &[usize]) -> String {
    if path.is_empty() {
        return kind.as_str().to_string();
    }
    let dotted: Vec<String> = path.iter().map(|i| (i + 1).to_string()).collect();
    format!("{}_{}", kind.as_str(), dotted.join("."))
}

// ── Analysis session ────────────────────────────────────────────────────────

/// Per-run state shared by every analysis stage: per-kind sequence
/// counters and the lookup tables from keys and operations to vertices.
/// Created at pass entry, dropped at pass exit.
#[derive(Debug, Default)]
pub struct DependencyContext {
    seq: SeqAllocator,
    vertices: HashMap<NodeKey, (ScopePath, NodeIndex)>,
    /// op → (entry key, exit key). Equal except for compute chains.
    op_vertices: HashMap<OpId, (NodeKey, NodeKey)>,
}

impl DependencyContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: VertexKind) -> NodeKey {
        self.seq.alloc(kind)
    }

    fn register(&mut self, key: NodeKey, path: &[usize], v: NodeIndex) {
        self.vertices.insert(key, (path.to_vec(), v));
    }

    pub fn lookup(&self, key: NodeKey) -> Option<(&[usize], NodeIndex)> {
        self.vertices.get(&key).map(|(p, v)| (p.as_slice(), *v))
    }

    /// Vertex external dependencies of `op` attach to.
    pub fn entry_of(&self, op: OpId) -> Option<NodeKey> {
        self.op_vertices.get(&op).map(|(entry, _)| *entry)
    }

    /// Vertex whose completion stands for the completion of `op`.
    pub fn exit_of(&self, op: OpId) -> Option<NodeKey> {
        self.op_vertices.get(&op).map(|(_, exit)| *exit)
    }

    pub fn count(&self, kind: VertexKind) -> u32 {
        self.seq.count(kind)
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Build the scope-graph tree of `program`.
pub fn build_scope_graphs(
    program: &Program,
    ctx: &mut DependencyContext,
) -> Result<ScopeGraph, DepError> {
    let roots: Vec<BlockId> = program.funcs.iter().map(|f| f.body).collect();
    let mut builder = GraphBuilder {
        program,
        ctx,
        channels: channel_endpoints(program),
    };
    builder.build_scope(ScopeKind::Host, None, &roots, Vec::new())
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for ScopeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, scope) in self.scopes() {
            let pad = "  ".repeat(path.len());
            writeln!(
                f,
                "{}scope '{}': {} vertices, {} edges",
                pad,
                scope_name(scope.kind, &path),
                scope.vertex_count(),
                scope.edge_count()
            )?;
            for e in scope.graph.edge_references() {
                let (s, t) = (&scope.graph[e.source()], &scope.graph[e.target()]);
                writeln!(f, "{}  {} ({}) -> {} ({})", pad, s.key, s.label, t.key, t.label)?;
            }
        }
        Ok(())
    }
}

// ── JSON summary ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct VertexSummary {
    pub key: String,
    pub kind: VertexKind,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ScopeSummary {
    pub name: String,
    pub kind: ScopeKind,
    pub vertices: Vec<VertexSummary>,
    pub edges: Vec<(String, String)>,
    pub children: Vec<ScopeSummary>,
}

impl ScopeGraph {
    /// Serializable view of the scope tree.
    pub fn summary(&self) -> ScopeSummary {
        self.summary_at(&mut Vec::new())
    }

    fn summary_at(&self, path: &mut Vec<usize>) -> ScopeSummary {
        let vertices = self
            .graph
            .node_indices()
            .map(|v| VertexSummary {
                key: self.graph[v].key.to_string(),
                kind: self.graph[v].kind(),
                label: self.graph[v].label.clone(),
            })
            .collect();
        let edges = self
            .edge_keys()
            .into_iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect();
        let mut children = Vec::with_capacity(self.children.len());
        for (i, child) in self.children.iter().enumerate() {
            path.push(i);
            children.push(child.summary_at(path));
            path.pop();
        }
        ScopeSummary {
            name: scope_name(self.kind, path),
            kind: self.kind,
            vertices,
            edges,
            children,
        }
    }
}

// ── Internal builder ────────────────────────────────────────────────────────

struct GraphBuilder<'a> {
    program: &'a Program,
    ctx: &'a mut DependencyContext,
    channels: HashMap<String, (Vec<OpId>, Vec<OpId>)>,
}

impl<'a> GraphBuilder<'a> {
    fn new_node(&mut self, kind: VertexKind, label: String, op: Option<OpId>) -> TaskNode {
        TaskNode {
            key: self.ctx.alloc(kind),
            label,
            op,
            owner: op,
            link: None,
        }
    }

    fn add_vertex(&mut self, scope: &mut ScopeGraph, path: &[usize], node: TaskNode) -> NodeIndex {
        let key = node.key;
        let v = scope.graph.add_node(node);
        self.ctx.register(key, path, v);
        v
    }

    fn add_op_vertex(
        &mut self,
        scope: &mut ScopeGraph,
        path: &[usize],
        kind: VertexKind,
        label: String,
        op: OpId,
    ) -> NodeIndex {
        let node = self.new_node(kind, label, Some(op));
        let key = node.key;
        let v = self.add_vertex(scope, path, node);
        self.ctx.op_vertices.insert(op, (key, key));
        v
    }

    fn build_scope(
        &mut self,
        kind: ScopeKind,
        hierarchy_op: Option<OpId>,
        roots: &[BlockId],
        path: ScopePath,
    ) -> Result<ScopeGraph, DepError> {
        let start = self.new_node(VertexKind::Start, "start".to_string(), None);
        let start_key = start.key;
        let mut scope = ScopeGraph::new(kind, hierarchy_op, start);
        self.ctx.register(start_key, &path, scope.start);

        // Document-order walk that does not enter compute or hierarchy bodies.
        let mut stack: Vec<OpId> = roots
            .iter()
            .rev()
            .flat_map(|&b| self.program.block(b).ops.iter().rev().copied())
            .collect();

        while let Some(op) = stack.pop() {
            if !self.program.is_live(op) {
                continue;
            }
            let kind = self.program.kind(op).clone();
            match &kind {
                OpKind::Compute => self.add_compute_chain(&mut scope, &path, op)?,
                OpKind::Transfer { .. } => {
                    self.add_op_vertex(&mut scope, &path, VertexKind::Transfer, kind.label(), op);
                }
                OpKind::Put { .. } | OpKind::Get { .. } => {
                    let label = self.channel_label(op);
                    self.add_op_vertex(&mut scope, &path, VertexKind::Channel, label, op);
                }
                OpKind::Join => {
                    self.add_op_vertex(&mut scope, &path, VertexKind::Barrier, kind.label(), op);
                }
                OpKind::Loop(_) => {
                    self.add_op_vertex(&mut scope, &path, VertexKind::ControlLoop, kind.label(), op);
                    self.push_regions(&mut stack, op);
                }
                OpKind::If => self.push_regions(&mut stack, op),
                OpKind::Yield => {
                    let in_loop = self
                        .program
                        .parent_op(op)
                        .is_some_and(|p| matches!(self.program.kind(p), OpKind::Loop(_)));
                    if in_loop {
                        self.add_op_vertex(&mut scope, &path, VertexKind::Terminator, kind.label(), op);
                    }
                }
                OpKind::End => {
                    let label = match scope.kind {
                        ScopeKind::Host => "EndOp".to_string(),
                        other => format!("{}Terminator", capitalize(other.as_str())),
                    };
                    let v = self.add_op_vertex(
                        &mut scope,
                        &path,
                        VertexKind::HierarchyTerminator,
                        label,
                        op,
                    );
                    scope.terminator = Some(v);
                }
                OpKind::Hierarchy { level, .. } => {
                    self.add_op_vertex(&mut scope, &path, VertexKind::HierarchyCall, kind.label(), op);
                    let mut child_path = path.clone();
                    child_path.push(scope.children.len());
                    let body: Vec<BlockId> = self.program.body(op).into_iter().collect();
                    let child = self.build_scope((*level).into(), Some(op), &body, child_path)?;
                    scope.children.push(child);
                }
                OpKind::Const(_)
                | OpKind::Alloc
                | OpKind::Dealloc
                | OpKind::Copy
                | OpKind::Transform { .. }
                | OpKind::MulI
                | OpKind::AddI
                | OpKind::Apply => {}
            }
        }

        tracing::trace!(
            scope = %scope_name(kind, &path),
            vertices = scope.vertex_count(),
            children = scope.children.len(),
            "built scope graph"
        );
        Ok(scope)
    }

    fn push_regions(&self, stack: &mut Vec<OpId>, op: OpId) {
        for region in self.program.op(op).regions.iter().rev() {
            stack.extend(self.program.block(*region).ops.iter().rev().copied());
        }
    }

    /// Expand a compute block into a chain of sub-vertices in source order.
    fn add_compute_chain(
        &mut self,
        scope: &mut ScopeGraph,
        path: &[usize],
        op: OpId,
    ) -> Result<(), DepError> {
        let body: Vec<OpId> = match self.program.body(op) {
            Some(b) => self.program.block(b).ops.clone(),
            None => Vec::new(),
        };
        if body.is_empty() {
            self.add_op_vertex(scope, path, VertexKind::Compute, "ComputeOp".into(), op);
            return Ok(());
        }

        let mut entry = None;
        let mut prev: Option<NodeIndex> = None;
        for (i, &child) in body.iter().enumerate() {
            let child_kind = self.program.kind(child);
            if !child_kind.is_compute_primitive() {
                return Err(DepError::UnknownOpInCompute {
                    op: child,
                    label: child_kind.label(),
                    span: self.program.op(child).span,
                });
            }
            let node = TaskNode {
                key: self.ctx.alloc(VertexKind::Compute),
                label: child_kind.label(),
                op: (i == 0).then_some(op),
                owner: Some(op),
                link: None,
            };
            let key = node.key;
            let v = self.add_vertex(scope, path, node);
            if let Some(p) = prev {
                scope.add_edge_if_new(p, v);
            }
            entry.get_or_insert(key);
            prev = Some(v);
        }

        if let (Some(entry), Some(last)) = (entry, prev) {
            let exit = scope.graph[last].key;
            self.ctx.op_vertices.insert(op, (entry, exit));
        }
        Ok(())
    }

    /// `ChannelPutOp@ch(L1-->L2)` / `ChannelGetOp@ch(L2<--L1)`; the far end
    /// is `?` when the channel has no unique partner.
    fn channel_label(&self, op: OpId) -> String {
        let kind = self.program.kind(op);
        let Some(channel) = kind.channel() else {
            return kind.label();
        };
        let space_of = |o: OpId| {
            let buf = self.program.op(o).operands[0];
            self.program
                .value_type(buf)
                .space()
                .map(|s| s.as_str())
                .unwrap_or("?")
        };
        let here = space_of(op);
        let (puts, gets) = self.channels.get(channel).cloned().unwrap_or_default();
        let is_put = matches!(kind, OpKind::Put { .. });
        let partners = if is_put { gets } else { puts };
        let there = match partners.as_slice() {
            [one] => space_of(*one),
            _ => "?",
        };
        if is_put {
            format!("{}({}-->{})", kind.label(), here, there)
        } else {
            format!("{}({}<--{})", kind.label(), here, there)
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::parse_program;

    fn build(source: &str) -> (Program, ScopeGraph, DependencyContext) {
        let program = parse_program(source).unwrap_or_else(|d| panic!("diagnostics: {:#?}", d));
        let mut ctx = DependencyContext::new();
        let graph = build_scope_graphs(&program, &mut ctx).expect("build failed");
        (program, graph, ctx)
    }

    fn labels(scope: &ScopeGraph) -> Vec<String> {
        scope
            .graph
            .node_indices()
            .map(|v| scope.graph[v].label.clone())
            .collect()
    }

    #[test]
    fn one_vertex_per_async_op() {
        let (_, g, ctx) = build(
            "func @f(%a: memref<1, L3>, %b: memref<1, L1>) {\n  %t0 = transfer %b <- %a\n  %t1 = join [%t0]\n  %c = const 0\n}",
        );
        assert_eq!(labels(&g), vec!["start", "TransferOp", "JoinOp"]);
        assert_eq!(ctx.count(VertexKind::Transfer), 1);
        assert_eq!(ctx.count(VertexKind::Barrier), 1);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn compute_block_becomes_chain() {
        let (p, g, ctx) = build(
            "func @f(%a: memref<1, L1>) {\n  %t, %m = compute {\n    %x = alloc : memref<1, L1>\n    copy %a, %x\n    yield %x\n  }\n}",
        );
        assert_eq!(labels(&g), vec!["start", "AllocOp", "CopyOp", "YieldOp"]);
        let compute = p.walk()[0];
        let entry = ctx.entry_of(compute).unwrap();
        let exit = ctx.exit_of(compute).unwrap();
        assert_eq!(entry.seq, 0);
        assert_eq!(exit.seq, 2);
        let (_, entry_v) = ctx.lookup(entry).unwrap();
        let (_, exit_v) = ctx.lookup(exit).unwrap();
        assert_eq!(g.node(entry_v).op, Some(compute));
        assert_eq!(g.node(exit_v).op, None);
        assert_eq!(g.node(exit_v).owner, Some(compute));
        assert_eq!(g.edge_count(), 2, "chain edges alloc -> copy -> yield");
    }

    #[test]
    fn unknown_op_in_compute_is_fatal() {
        let program = parse_program(
            "func @f() {\n  %t = compute {\n    %j = join\n    yield\n  }\n}",
        )
        .unwrap();
        let mut ctx = DependencyContext::new();
        let err = build_scope_graphs(&program, &mut ctx).unwrap_err();
        assert!(matches!(err, DepError::UnknownOpInCompute { ref label, .. } if label == "JoinOp"));
    }

    #[test]
    fn hierarchy_opens_child_scope() {
        let (_, g, ctx) = build(
            "func @f(%a: memref<1, L3>) {\n  %h = launch args(%x = %a) {\n    %s = segment {\n      end\n    }\n    %t = join\n    end\n  }\n}",
        );
        assert_eq!(labels(&g), vec!["start", "LaunchOp"]);
        assert_eq!(g.children.len(), 1);
        let launch = &g.children[0];
        assert_eq!(launch.kind, ScopeKind::Launch);
        assert_eq!(
            labels(launch),
            vec!["start", "SegmentOp", "JoinOp", "LaunchTerminator"]
        );
        assert!(launch.terminator.is_some());
        let segment = &launch.children[0];
        assert_eq!(segment.kind, ScopeKind::Segment);
        assert_eq!(labels(segment), vec!["start", "SegmentTerminator"]);
        let (path, _) = ctx.lookup(segment.node(segment.start).key).unwrap();
        assert_eq!(path, &[0, 0]);
    }

    #[test]
    fn loop_body_lives_in_enclosing_scope() {
        let (_, g, _) = build(
            "func @f(%t0: token) {\n  %c0 = const 0\n  %c1 = const 1\n  %r = for %i = %c0 to %c1 step %c1 iter(%tok = %t0) {\n    %j = join [%tok]\n    yield %j\n  }\n}",
        );
        assert_eq!(labels(&g), vec!["start", "ForOp", "JoinOp", "YieldOp"]);
        let kinds: Vec<VertexKind> = g.graph.node_indices().map(|v| g.graph[v].kind()).collect();
        assert_eq!(kinds[3], VertexKind::Terminator);
    }

    #[test]
    fn conditional_has_no_vertex_but_branches_do() {
        let (_, g, _) = build(
            "func @f(%c: index) {\n  %r = if %c {\n    %a = join\n    yield %a\n  } else {\n    %b = join\n    yield %b\n  }\n}",
        );
        assert_eq!(labels(&g), vec!["start", "JoinOp", "JoinOp"]);
    }

    #[test]
    fn channel_labels_name_both_spaces() {
        let (_, g, _) = build(
            "func @f(%a: memref<1, L1>, %b: memref<1, L2>) {\n  %p = put @ch %a\n  %q = get @ch %b\n}",
        );
        assert_eq!(
            labels(&g),
            vec!["start", "ChannelPutOp@ch(L1-->L2)", "ChannelGetOp@ch(L2<--L1)"]
        );
    }

    #[test]
    fn scope_names_use_dotted_paths() {
        assert_eq!(scope_name(ScopeKind::Host, &[]), "host");
        assert_eq!(scope_name(ScopeKind::Launch, &[0]), "launch_1");
        assert_eq!(scope_name(ScopeKind::Herd, &[0, 1, 0]), "herd_1.2.1");
    }

    #[test]
    fn summary_serializes() {
        let (_, g, _) = build("func @f() {\n  %j = join\n}");
        let json = serde_json::to_value(g.summary()).unwrap();
        assert_eq!(json["name"], "host");
        assert_eq!(json["vertices"][1]["kind"], "barrier");
        assert_eq!(json["vertices"][1]["key"], "barrier#0");
    }
}
