// Property-based tests for analysis invariants.
//
// Four categories:
// 1. Graph invariants on generated dependency DAGs: reachability is kept by
//    reduction, graphs stay acyclic, stitching closes every scope
// 2. Round-trip: rewriting from the reduced graph and rebuilding yields the
//    same reduced edge set
// 3. Token-list hygiene: deduplication is idempotent
// 4. Overlap: symmetric and deterministic; channel puts keep the read-only
//    role, pinned with a read-after-write trace
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use depcanon::edges::resolve_edges;
use depcanon::graph::{build_scope_graphs, DependencyContext, ScopeGraph};
use depcanon::ir::Program;
use depcanon::lower::parse_program;
use depcanon::memref::{overlaps, IndexExpr, PartialRef};
use depcanon::reduce::{reachability, reduce_tree};
use depcanon::rewrite::{dedup_deps, rewrite_tokens, RewriteStats};
use depcanon::stitch::stitch;
use depcanon::tracer::{trace, ConflictMode};
use petgraph::algo::toposort;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn stitched(program: &Program) -> ScopeGraph {
    let mut ctx = DependencyContext::new();
    let mut root = build_scope_graphs(program, &mut ctx).unwrap();
    resolve_edges(program, &mut root, &ctx);
    stitch(&mut root).unwrap();
    root
}

fn reduced_edges(root: &ScopeGraph) -> Vec<Vec<(String, String)>> {
    root.scopes()
        .into_iter()
        .map(|(_, s)| {
            s.edge_keys()
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect()
        })
        .collect()
}

// ── Program generator ───────────────────────────────────────────────────────

/// One op per entry; entry i lists the earlier ops it waits on.
fn arb_dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), 1..10).prop_map(
        |raw| {
            raw.iter()
                .enumerate()
                .map(|(i, picks)| {
                    if i == 0 {
                        return Vec::new();
                    }
                    let mut deps: Vec<usize> = picks.iter().map(|p| p.index(i)).collect();
                    deps.sort();
                    deps.dedup();
                    deps
                })
                .collect()
        },
    )
}

/// Render a DAG as transfers on `%m` named `%{prefix}{i}`.
fn render_ops(dag: &[Vec<usize>], prefix: &str, indent: &str, buf: &str) -> String {
    let mut out = String::new();
    for (i, deps) in dag.iter().enumerate() {
        let list: Vec<String> = deps.iter().map(|d| format!("%{prefix}{d}")).collect();
        let deps = if list.is_empty() {
            String::new()
        } else {
            format!(" [{}]", list.join(", "))
        };
        out.push_str(&format!("{indent}%{prefix}{i} = transfer{deps} %{buf} <- %{buf}\n"));
    }
    out
}

/// The DAG at host level and again inside a launch body.
fn render_program(dag: &[Vec<usize>]) -> String {
    format!(
        "func @f(%m: memref<2, L2>) {{\n{}  %h = launch args(%x = %m) {{\n{}    end\n  }}\n}}\n",
        render_ops(dag, "v", "  ", "m"),
        render_ops(dag, "w", "    ", "x"),
    )
}

fn arb_index() -> impl Strategy<Value = IndexExpr> {
    prop_oneof![
        (0i64..3).prop_map(IndexExpr::Const),
        Just(IndexExpr::Whole),
        (0u32..4).prop_map(|v| IndexExpr::Dynamic(depcanon::id::ValueId(v))),
    ]
}

fn arb_ref() -> impl Strategy<Value = PartialRef> {
    (0u32..2, prop::collection::vec(arb_index(), 1..3)).prop_map(|(base, indices)| PartialRef {
        base: depcanon::id::ValueId(100 + base),
        indices,
    })
}

// ── Graph invariants ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn reduction_preserves_reachability(dag in arb_dag()) {
        let program = parse_program(&render_program(&dag)).unwrap();
        let root = stitched(&program);
        let (reduced, _) = reduce_tree(&root).unwrap();
        let before = root.scopes();
        let after = reduced.scopes();
        prop_assert_eq!(before.len(), after.len());
        for ((_, a), (_, b)) in before.iter().zip(&after) {
            prop_assert_eq!(reachability(a), reachability(b));
            prop_assert!(b.edge_count() <= a.edge_count());
        }
    }

    #[test]
    fn graphs_stay_acyclic(dag in arb_dag()) {
        let program = parse_program(&render_program(&dag)).unwrap();
        let root = stitched(&program);
        let (reduced, _) = reduce_tree(&root).unwrap();
        for (_, scope) in root.scopes().into_iter().chain(reduced.scopes()) {
            prop_assert!(toposort(&scope.graph, None).is_ok());
        }
    }

    #[test]
    fn stitch_closes_every_scope(dag in arb_dag()) {
        let program = parse_program(&render_program(&dag)).unwrap();
        let root = stitched(&program);
        for (_, scope) in root.scopes() {
            for v in scope.graph.node_indices() {
                if v != scope.start {
                    prop_assert!(scope.in_degree(v) >= 1);
                }
                if let Some(t) = scope.terminator {
                    if v != t {
                        prop_assert!(scope.out_degree(v) >= 1);
                    }
                }
            }
        }
    }

    #[test]
    fn rewrite_round_trips(dag in arb_dag()) {
        let mut program = parse_program(&render_program(&dag)).unwrap();
        let (reduced, _) = reduce_tree(&stitched(&program)).unwrap();
        let mut stats = RewriteStats::default();
        rewrite_tokens(&mut program, &reduced, &mut stats);

        let (again, _) = reduce_tree(&stitched(&program)).unwrap();
        prop_assert_eq!(reduced_edges(&reduced), reduced_edges(&again));
    }

    #[test]
    fn dedup_is_idempotent(dag in arb_dag(), repeat in 1usize..3) {
        // Repeat every dependency to seed duplicates.
        let doubled: Vec<Vec<usize>> = dag
            .iter()
            .map(|deps| deps.iter().flat_map(|&d| std::iter::repeat(d).take(repeat + 1)).collect())
            .collect();
        let mut program = parse_program(&render_program(&doubled)).unwrap();
        dedup_deps(&mut program);
        let once = program.to_string();
        prop_assert_eq!(dedup_deps(&mut program), 0);
        prop_assert_eq!(once, program.to_string());
    }
}

// ── Overlap and roles ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn overlap_is_symmetric(a in arb_ref(), b in arb_ref()) {
        prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
        prop_assert_eq!(overlaps(&a, &b), overlaps(&a.clone(), &b.clone()));
        prop_assert!(overlaps(&a, &a));
    }

    // A channel put is classified as a read of its buffer even though it is
    // also a synchronization point. Only read-after-write separates the two
    // roles: under any-after-any a reading sink conflicts with every earlier
    // access, put or not. If puts ever become writers, this fails.
    #[test]
    fn channel_put_stays_read_only_under_raw(offset in 0i64..3, read_offset in 0i64..3) {
        let source = format!(
            "func @f(%x: memref<1, L1>, %y: memref<1, L2>) {{\n  %c = const {offset}\n  %d = const {read_offset}\n  %p = put @ch %x[%c]\n  %t = transfer %y <- %x[%d]\n  %g = get @ch %y\n}}\n"
        );
        let mut program = parse_program(&source).unwrap();
        let sink = program.op_by_result_name("t").unwrap();
        trace(&mut program, sink, ConflictMode::ReadAfterWrite);
        let put = program.value_by_name("p").unwrap();
        prop_assert!(!program.deps(sink).contains(&put));
    }
}
