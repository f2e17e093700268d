// Snapshot tests: lock the reduced scope-graph and DOT renderings to detect
// unintended changes in vertex numbering, labels or edge selection.
//
// Uses the library API (parse → lower → run_pipeline to Reduce) and
// snapshots the Display / DOT output inline with `insta`.
//
// Run `cargo insta review` after intentional output changes to update baselines.

use depcanon::dot::emit_scope_dot;
use depcanon::lower::parse_program;
use depcanon::pass::PassId;
use depcanon::pipeline::{run_pipeline, CanonicalizeOptions, CompilationState};

/// Run up to transitive reduction and return the state.
fn reduced_state(source: &str) -> CompilationState {
    let program = parse_program(source).unwrap_or_else(|d| panic!("front end failed: {:?}", d));
    let mut state = CompilationState::new(program, CanonicalizeOptions::default());
    run_pipeline(&mut state, PassId::Reduce).unwrap();
    state
}

const CHAIN: &str = "\
func @f(%m: memref<1, L1>) {
  %a = transfer %m <- %m
  %b = transfer [%a] %m <- %m
  %c = transfer [%a, %b] %m <- %m
}";

#[test]
fn chain_reduced_graph() {
    let state = reduced_state(CHAIN);
    insta::assert_snapshot!(state.reduced.unwrap().to_string(), @r"
    scope 'host': 4 vertices, 3 edges
      start#0 (start) -> transfer#0 (TransferOp)
      transfer#0 (TransferOp) -> transfer#1 (TransferOp)
      transfer#1 (TransferOp) -> transfer#2 (TransferOp)
    ");
}

#[test]
fn chain_scope_dot() {
    let state = reduced_state(CHAIN);
    let dot = emit_scope_dot(state.reduced.as_ref().unwrap(), "host");
    insta::assert_snapshot!(dot, @r#"
    digraph host {
        node [fontname="Helvetica", fontsize=10];
        n0 [label="start", shape=box, style=filled, fillcolor=yellow];
        n1 [label="TransferOp", shape=oval, style=filled, fillcolor=cyan];
        n2 [label="TransferOp", shape=oval, style=filled, fillcolor=cyan];
        n3 [label="TransferOp", shape=oval, style=filled, fillcolor=cyan];
        n0 -> n1;
        n1 -> n2;
        n2 -> n3;
    }
    "#);
}

#[test]
fn loop_with_segment_reduced_graph() {
    let state = reduced_state(
        "\
func @f(%a: memref<1, L3>, %b: memref<1, L2>, %t: token) {
  %c0 = const 0
  %c4 = const 4
  %c1 = const 1
  %p = transfer %b <- %a
  %r = for %i = %c0 to %c4 step %c1 iter(%k = %t) {
    %q = transfer [%k] %b <- %a
    %h = segment [%p, %k, %q] args(%x = %b) {
      %g = transfer %x <- %x
      end
    }
    %j = join [%h, %q]
    yield %j
  }
}",
    );
    insta::assert_snapshot!(state.reduced.unwrap().to_string(), @r"
    scope 'host': 7 vertices, 7 edges
      start#0 (start) -> transfer#0 (TransferOp)
      start#0 (start) -> control_loop#0 (ForOp)
      transfer#0 (TransferOp) -> hierarchy#0 (SegmentOp)
      control_loop#0 (ForOp) -> transfer#1 (TransferOp)
      transfer#1 (TransferOp) -> hierarchy#0 (SegmentOp)
      hierarchy#0 (SegmentOp) -> barrier#0 (JoinOp)
      barrier#0 (JoinOp) -> terminator#0 (YieldOp)
      scope 'segment_1': 3 vertices, 2 edges
        start#1 (start) -> transfer#2 (TransferOp)
        transfer#2 (TransferOp) -> hierarchy_terminator#0 (SegmentTerminator)
    ");
}
