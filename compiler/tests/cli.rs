// Integration tests for the depcanon binary.
//
// These tests verify driver behavior end to end:
// - each --emit target produces its format on stdout
// - exit codes: 0 success, 1 diagnostics or analysis errors, 2 usage/I/O
// - --dump-dir writes the deterministic file set

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn depcanon_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_depcanon"))
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("depcanon_cli_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_source(dir: &Path, source: &str) -> PathBuf {
    let path = dir.join("input.ir");
    std::fs::write(&path, source).unwrap();
    path
}

fn run(args: &[&str], input: &Path) -> Output {
    Command::new(depcanon_binary())
        .args(args)
        .arg(input)
        .output()
        .expect("failed to run depcanon")
}

const CHAIN: &str = "\
func @f(%m: memref<1, L1>) {
  %a = transfer %m <- %m
  %b = transfer [%a] %m <- %m
  %c = transfer [%a, %b] %m <- %m
}
";

const CHANNELS: &str = "\
func @f(%a: memref<1, L1>, %b: memref<1, L2>) {
  %p = put @ch %a
  %h = launch args(%x = %b) {
    %g = get @ch %x
    end
  }
}
";

#[test]
fn emit_ir_prints_canonical_program() {
    let dir = scratch_dir("ir");
    let input = write_source(&dir, CHAIN);
    let output = run(&[], &input);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("%c = transfer [%b] %m <- %m"), "got:\n{stdout}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn emit_graph_and_reduced_differ_in_edge_count() {
    let dir = scratch_dir("graph");
    let input = write_source(&dir, CHAIN);
    let graph = run(&["--emit", "graph"], &input);
    let reduced = run(&["--emit", "reduced"], &input);
    assert!(graph.status.success() && reduced.status.success());
    let graph = String::from_utf8_lossy(&graph.stdout);
    let reduced = String::from_utf8_lossy(&reduced.stdout);
    assert!(graph.starts_with("scope 'host': 4 vertices, 4 edges"), "got:\n{graph}");
    assert!(reduced.starts_with("scope 'host': 4 vertices, 3 edges"), "got:\n{reduced}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn emit_json_is_valid() {
    let dir = scratch_dir("json");
    let input = write_source(&dir, CHANNELS);
    let output = run(&["--emit", "json"], &input);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["name"], "host");
    assert_eq!(value["children"][0]["name"], "launch_1");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn emit_dot_writes_output_file() {
    let dir = scratch_dir("dot");
    let input = write_source(&dir, CHANNELS);
    let out = dir.join("graph.dot");
    let output = run(&["--emit", "dot", "-o", out.to_str().unwrap()], &input);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let dot = std::fs::read_to_string(&out).unwrap();
    assert!(dot.starts_with("digraph depcanon {"));
    assert_eq!(dot.matches("style=dashed").count(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn dump_dir_receives_per_scope_files() {
    let dir = scratch_dir("dump");
    let input = write_source(&dir, CHANNELS);
    let dump = dir.join("dump");
    let output = run(&["--dump-dir", dump.to_str().unwrap()], &input);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    for name in ["graph.dot", "host.dot", "launch_1.dot"] {
        assert!(dump.join(name).exists(), "missing {name}");
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn front_end_error_exits_with_1() {
    let dir = scratch_dir("undefined");
    let input = write_source(&dir, "func @f() {\n  %a = join [%missing]\n}\n");
    let output = run(&[], &input);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E0101"), "stderr: {stderr}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unpaired_channel_exits_with_1() {
    let dir = scratch_dir("unpaired");
    let input = write_source(
        &dir,
        "func @f(%a: memref<1, L1>) {\n  %p = put @ch %a\n  %q = put @ch %a\n  %g = get @ch %a\n}\n",
    );
    let output = run(&["--emit", "dot"], &input);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("E0204"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_conflict_mode_exits_with_2() {
    let dir = scratch_dir("mode");
    let input = write_source(&dir, CHAIN);
    let output = run(&["--trace-memory", "--conflict-mode", "RAR"], &input);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("E0301"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_input_exits_with_2() {
    let output = run(&[], Path::new("/nonexistent/depcanon/input.ir"));
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn verbose_logs_pass_timing() {
    let dir = scratch_dir("verbose");
    let input = write_source(&dir, CHAIN);
    let output = run(&["--verbose"], &input);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pass complete"), "stderr: {stderr}");
    let _ = std::fs::remove_dir_all(&dir);
}
