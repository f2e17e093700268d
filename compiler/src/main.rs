use clap::Parser;
use std::path::PathBuf;

use depcanon::pipeline::{run_pipeline, CanonicalizeOptions, CompilationState, EmitTarget};
use depcanon::tracer::ConflictMode;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    Ir,
    Graph,
    Reduced,
    Dot,
    Json,
}

impl From<EmitStage> for EmitTarget {
    fn from(stage: EmitStage) -> Self {
        match stage {
            EmitStage::Ir => EmitTarget::Ir,
            EmitStage::Graph => EmitTarget::Graph,
            EmitStage::Reduced => EmitTarget::Reduced,
            EmitStage::Dot => EmitTarget::Dot,
            EmitStage::Json => EmitTarget::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "depcanon",
    version,
    about = "Infers, reduces and rewrites the token dependencies of nested asynchronous programs"
)]
struct Cli {
    /// Input program
    source: PathBuf,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Ir)]
    emit: EmitStage,

    /// Add dependencies implied by overlapping memory accesses
    #[arg(long)]
    trace_memory: bool,

    /// Force one conflict mode for all accesses: RAW or WAW/WAR
    #[arg(long)]
    conflict_mode: Option<String>,

    /// Directory for per-scope DOT dumps
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Log passes and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(source = %cli.source.display(), emit = ?cli.emit, "starting");

    let conflict_mode = match cli.conflict_mode.as_deref().map(str::parse::<ConflictMode>) {
        None => None,
        Some(Ok(mode)) => Some(mode),
        Some(Err(e)) => {
            eprintln!("depcanon: {}", e.to_diagnostic());
            std::process::exit(2);
        }
    };

    // ── Read and parse source ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("depcanon: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    let program = match depcanon::lower::parse_program(&source) {
        Ok(p) => p,
        Err(diags) => {
            for diag in &diags {
                eprintln!("depcanon: {}", diag);
            }
            std::process::exit(1);
        }
    };

    tracing::debug!(ops = program.live_op_count(), "parsed program");

    // ── Run passes ──
    let options = CanonicalizeOptions {
        trace_memory: cli.trace_memory,
        conflict_mode,
        dump_dir: cli.dump_dir.clone(),
    };
    let target = EmitTarget::from(cli.emit);
    let mut state = CompilationState::new(program, options);
    if let Err(e) = run_pipeline(&mut state, target.terminal()) {
        eprintln!("depcanon: {}", e.to_diagnostic());
        std::process::exit(1);
    }

    let text = match state.render(target) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("depcanon: {}", e.to_diagnostic());
            std::process::exit(1);
        }
    };

    // ── Write output ──
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("depcanon: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", text),
    }
}
