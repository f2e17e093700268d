// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the canonicalizer's 7 passes (parse and lowering happen before
// the runner), their dependency edges, and the artifacts they produce. Used
// by the pipeline runner to compute minimal pass subsets for each --emit
// target and to check that a pass's inputs exist before it runs.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Build,
    Trace,
    Resolve,
    Stitch,
    Reduce,
    Rewrite,
    Cleanup,
}

/// Machine-readable artifact identifiers. Each maps to a concrete value in
/// the pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    ScopeGraphs, // ScopeGraph tree
    Context,     // DependencyContext
    TracedDeps,  // dependency lists extended by the tracer
    Edges,       // token edges in the scope graphs
    Stitched,    // start/terminator closure and scope links
    Reduced,     // reduced ScopeGraph tree
    VertexMaps,  // VertexMapTree
    Rewritten,   // dependency lists regenerated from the reduced graphs
    Canonical,   // cleaned program
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions, logged with each completed pass.
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Build => PassDescriptor {
            name: "build",
            inputs: &[],
            outputs: &[ArtifactId::ScopeGraphs, ArtifactId::Context],
            invariants: "one vertex per async event, one child scope per hierarchy call",
        },
        PassId::Trace => PassDescriptor {
            name: "trace",
            inputs: &[],
            outputs: &[ArtifactId::TracedDeps],
            invariants: "dependency lists only grow",
        },
        PassId::Resolve => PassDescriptor {
            name: "resolve",
            inputs: &[PassId::Build, PassId::Trace],
            outputs: &[ArtifactId::Edges],
            invariants: "no duplicate edges, no cross-scope edges",
        },
        PassId::Stitch => PassDescriptor {
            name: "stitch",
            inputs: &[PassId::Resolve],
            outputs: &[ArtifactId::Stitched],
            invariants: "every non-start vertex has a predecessor",
        },
        PassId::Reduce => PassDescriptor {
            name: "reduce",
            inputs: &[PassId::Stitch],
            outputs: &[ArtifactId::Reduced, ArtifactId::VertexMaps],
            invariants: "reachability preserved per scope, graphs acyclic",
        },
        PassId::Rewrite => PassDescriptor {
            name: "rewrite",
            inputs: &[PassId::Reduce],
            outputs: &[ArtifactId::Rewritten],
            invariants: "dependency lists mirror reduced in-edges",
        },
        PassId::Cleanup => PassDescriptor {
            name: "cleanup",
            inputs: &[PassId::Rewrite],
            outputs: &[ArtifactId::Canonical],
            invariants: "no duplicate tokens, no single-input joins",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All 7 pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 7] = [
    PassId::Build,
    PassId::Trace,
    PassId::Resolve,
    PassId::Stitch,
    PassId::Reduce,
    PassId::Rewrite,
    PassId::Cleanup,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_passes_build_is_minimal() {
        assert_eq!(required_passes(PassId::Build), vec![PassId::Build]);
    }

    #[test]
    fn required_passes_stitch_skips_reduction() {
        let passes = required_passes(PassId::Stitch);
        assert_eq!(
            passes,
            vec![PassId::Build, PassId::Trace, PassId::Resolve, PassId::Stitch]
        );
        assert!(!passes.contains(&PassId::Reduce));
    }

    #[test]
    fn required_passes_cleanup_includes_all() {
        let passes = required_passes(PassId::Cleanup);
        assert_eq!(passes.len(), 7);
        assert_eq!(passes, ALL_PASSES.to_vec());
    }

    #[test]
    fn all_descriptors_have_outputs() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            assert!(
                !desc.outputs.is_empty(),
                "pass {:?} has no outputs declared",
                pass
            );
        }
    }

    #[test]
    fn dependency_edges_are_consistent() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            for dep in desc.inputs {
                let dep_passes = required_passes(*pass);
                let dep_pos = dep_passes.iter().position(|p| p == dep);
                let self_pos = dep_passes.iter().position(|p| p == pass);
                assert!(
                    dep_pos.unwrap() < self_pos.unwrap(),
                    "{:?} depends on {:?} but it comes later in topological order",
                    pass,
                    dep
                );
            }
        }
    }
}
