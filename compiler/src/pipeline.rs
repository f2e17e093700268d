// pipeline.rs — Canonicalization state and pass orchestration
//
// Holds the program and every pass artifact in one state struct and runs
// the minimal set of passes for a given terminal PassId.
//
// Preconditions: the program has been parsed and lowered without errors.
// Postconditions: artifacts for all required passes are populated, or a
//   PipelineError names the failing pass.
// Failure modes: any structural DepError raised by a pass; dump I/O errors.
// Side effects: mutates the program's dependency lists; writes dump files
//   when a dump directory is configured.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::diag::{DepError, Diagnostic};
use crate::graph::{build_scope_graphs, DependencyContext, ScopeGraph};
use crate::ir::Program;
use crate::pass::{descriptor, required_passes, ArtifactId, PassId};
use crate::reduce::{reduce_tree, VertexMapTree};
use crate::rewrite::{cleanup, rewrite_tokens, RewriteStats};
use crate::stitch::{stitch, StitchStats};
use crate::tracer::{trace_program, ConflictMode, TraceStats};

// ── Options ────────────────────────────────────────────────────────────────

/// Knobs for one canonicalization run.
#[derive(Debug, Clone, Default)]
pub struct CanonicalizeOptions {
    /// Synthesize dependencies from memory conflicts before resolution.
    pub trace_memory: bool,
    /// Force one conflict mode for reads and writes alike.
    pub conflict_mode: Option<ConflictMode>,
    /// Write DOT dumps of the final graphs here.
    pub dump_dir: Option<PathBuf>,
}

// ── Emit targets ───────────────────────────────────────────────────────────

/// What the driver prints after the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    /// The canonicalized program text.
    Ir,
    /// Stitched (unreduced) scope graphs.
    Graph,
    /// Reduced scope graphs.
    Reduced,
    /// Flattened DOT of the reduced graphs.
    Dot,
    /// JSON summary of the reduced graphs.
    Json,
}

impl EmitTarget {
    /// Last pass needed to produce this target.
    pub fn terminal(self) -> PassId {
        match self {
            EmitTarget::Ir => PassId::Cleanup,
            EmitTarget::Graph => PassId::Stitch,
            EmitTarget::Reduced | EmitTarget::Dot | EmitTarget::Json => PassId::Reduce,
        }
    }
}

// ── Artifact storage ───────────────────────────────────────────────────────

/// Counters collected while the passes run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub traced: Option<TraceStats>,
    pub edges_resolved: usize,
    pub stitched: Option<StitchStats>,
    pub rewrite: RewriteStats,
}

/// Holds the program, all analysis artifacts and the per-pass timings.
pub struct CompilationState {
    pub program: Program,
    pub options: CanonicalizeOptions,
    pub context: Option<DependencyContext>,
    /// Scope graphs as built, then resolved and stitched in place.
    pub graphs: Option<ScopeGraph>,
    pub reduced: Option<ScopeGraph>,
    pub vertex_maps: Option<VertexMapTree>,
    pub stats: PipelineStats,
    pub timings: Vec<(PassId, Duration)>,
    /// Artifacts produced so far, per the pass descriptors.
    pub artifacts: HashSet<ArtifactId>,
}

impl CompilationState {
    pub fn new(program: Program, options: CanonicalizeOptions) -> Self {
        Self {
            program,
            options,
            context: None,
            graphs: None,
            reduced: None,
            vertex_maps: None,
            stats: PipelineStats::default(),
            timings: Vec::new(),
            artifacts: HashSet::new(),
        }
    }

    pub fn has_artifact(&self, id: ArtifactId) -> bool {
        self.artifacts.contains(&id)
    }

    /// The most processed graph tree available.
    pub fn latest_graphs(&self) -> Option<&ScopeGraph> {
        self.reduced.as_ref().or(self.graphs.as_ref())
    }

    /// Render `target` from the populated artifacts.
    pub fn render(&self, target: EmitTarget) -> Result<String, DepError> {
        let missing = |what: &str| format!("<{what} not computed>\n");
        Ok(match target {
            EmitTarget::Ir => self.program.to_string(),
            EmitTarget::Graph => match &self.graphs {
                Some(g) => g.to_string(),
                None => missing("graph"),
            },
            EmitTarget::Reduced => match &self.reduced {
                Some(g) => g.to_string(),
                None => missing("reduced graph"),
            },
            EmitTarget::Dot => match self.latest_graphs() {
                Some(g) => crate::dot::emit_flat_dot(&self.program, g)?,
                None => missing("graph"),
            },
            EmitTarget::Json => match self.latest_graphs() {
                Some(g) => {
                    let mut text = serde_json::to_string_pretty(&g.summary())
                        .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"));
                    text.push('\n');
                    text
                }
                None => missing("graph"),
            },
        })
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed in one pass.
#[derive(Debug)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
    pub error: DepError,
}

impl PipelineError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        self.error.to_diagnostic()
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", descriptor(self.failing_pass).name, self.error)
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

fn finish_pass(state: &mut CompilationState, pass_id: PassId, elapsed: Duration) {
    let desc = descriptor(pass_id);
    tracing::debug!(
        pass = desc.name,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        invariants = desc.invariants,
        "pass complete"
    );
    state.artifacts.extend(desc.outputs.iter().copied());
    state.timings.push((pass_id, elapsed));
}

fn fail(pass_id: PassId) -> impl FnOnce(DepError) -> PipelineError {
    move |error| PipelineError {
        failing_pass: pass_id,
        error,
    }
}

fn missing(pass_id: PassId, artifact: ArtifactId) -> PipelineError {
    PipelineError {
        failing_pass: pass_id,
        error: DepError::MissingArtifact {
            pass: descriptor(pass_id).name,
            artifact,
        },
    }
}

/// Every output of every input pass of `pass_id` must already exist.
fn check_inputs(state: &CompilationState, pass_id: PassId) -> Result<(), PipelineError> {
    for &input in descriptor(pass_id).inputs {
        for &artifact in descriptor(input).outputs {
            if !state.has_artifact(artifact) {
                return Err(missing(pass_id, artifact));
            }
        }
    }
    Ok(())
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Preconditions: `state.program` is a lowered program.
/// Postconditions: artifacts for all passes in `required_passes(terminal)`
///   are populated. When `options.dump_dir` is set the latest graphs are
///   dumped after the last pass.
/// Failure modes: the first pass returning a DepError stops the run; the
///   program keeps whatever mutations earlier passes made.
/// Side effects: logs per-pass timing at debug level.
pub fn run_pipeline(state: &mut CompilationState, terminal: PassId) -> Result<(), PipelineError> {
    let passes = required_passes(terminal);

    for &pass_id in &passes {
        check_inputs(state, pass_id)?;
        let t = Instant::now();
        match pass_id {
            PassId::Build => {
                let mut ctx = DependencyContext::new();
                let graphs =
                    build_scope_graphs(&state.program, &mut ctx).map_err(fail(PassId::Build))?;
                let (vertices, edges) = graphs.totals();
                tracing::debug!(vertices, edges, scopes = graphs.scopes().len(), "built scope graphs");
                state.context = Some(ctx);
                state.graphs = Some(graphs);
            }
            PassId::Trace => {
                if !state.options.trace_memory {
                    // The declared dependency lists stand as the traced ones.
                    state.artifacts.insert(ArtifactId::TracedDeps);
                    continue;
                }
                let stats = trace_program(&mut state.program, state.options.conflict_mode);
                state.stats.traced = Some(stats);
            }
            PassId::Resolve => {
                let ctx = state
                    .context
                    .as_ref()
                    .ok_or_else(|| missing(pass_id, ArtifactId::Context))?;
                let graphs = state
                    .graphs
                    .as_mut()
                    .ok_or_else(|| missing(pass_id, ArtifactId::ScopeGraphs))?;
                state.stats.edges_resolved = crate::edges::resolve_edges(&state.program, graphs, ctx);
            }
            PassId::Stitch => {
                let graphs = state
                    .graphs
                    .as_mut()
                    .ok_or_else(|| missing(pass_id, ArtifactId::ScopeGraphs))?;
                state.stats.stitched = Some(stitch(graphs).map_err(fail(PassId::Stitch))?);
            }
            PassId::Reduce => {
                let graphs = state
                    .graphs
                    .as_ref()
                    .ok_or_else(|| missing(pass_id, ArtifactId::Stitched))?;
                let (reduced, maps) = reduce_tree(graphs).map_err(fail(PassId::Reduce))?;
                state.reduced = Some(reduced);
                state.vertex_maps = Some(maps);
            }
            PassId::Rewrite => {
                let reduced = state
                    .reduced
                    .as_ref()
                    .ok_or_else(|| missing(pass_id, ArtifactId::Reduced))?;
                rewrite_tokens(&mut state.program, reduced, &mut state.stats.rewrite);
            }
            PassId::Cleanup => cleanup(&mut state.program, &mut state.stats.rewrite),
        }
        finish_pass(state, pass_id, t.elapsed());
    }

    if let Some(dir) = state.options.dump_dir.clone() {
        if let Some(graphs) = state.latest_graphs() {
            crate::dot::dump_files(&state.program, graphs, &dir).map_err(fail(terminal))?;
        }
    }
    Ok(())
}

/// Run every pass on `program` and return the final state.
pub fn canonicalize(
    program: Program,
    options: CanonicalizeOptions,
) -> Result<CompilationState, PipelineError> {
    let mut state = CompilationState::new(program, options);
    run_pipeline(&mut state, PassId::Cleanup)?;
    Ok(state)
}

/// Parse, lower and canonicalize `source`. Front-end and pass failures are
/// both reported as diagnostics.
pub fn canonicalize_source(
    source: &str,
    options: CanonicalizeOptions,
) -> Result<CompilationState, Vec<Diagnostic>> {
    let program = crate::lower::parse_program(source)?;
    canonicalize(program, options).map_err(|e| vec![e.to_diagnostic()])
}

// ── Tests ──────────────────────────────────────────────────────────────────
