use anyhow::{Context, Result};
use clap::Parser;
use codesumma::config::{load_config, load_config_file};
use codesumma::pipeline::{run_summary, RunError, RunOptions};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "codesumma")]
#[command(version)]
#[command(about = "Summarize a Python project into a token-budgeted context document for LLMs")]
struct Cli {
    /// Path to a Python file or a directory
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Write out all code instead of summaries (no token budget)
    #[arg(short, long)]
    all: bool,

    /// Ignore patterns (substrings, or globs like "*.log"); commas allowed
    #[arg(short, long, value_name = "PATTERN", num_args = 1..)]
    ignore: Vec<String>,

    /// Maximum tokens for the output document
    #[arg(short = 'o', long)]
    max_tokens_out: Option<usize>,

    /// Print full file content for files matching the pattern (e.g. "test_")
    #[arg(long, value_name = "PATTERN", num_args = 1..)]
    print_full: Vec<String>,

    /// Print full file content only for files matching the pattern
    #[arg(long, value_name = "PATTERN", num_args = 1..)]
    print_only: Vec<String>,

    /// Traceback text to resolve; leave empty to read it from stdin
    #[arg(short, long, value_name = "TEXT", num_args = 0..=1)]
    traceback: Option<Option<String>>,

    /// Completion cache file (default: <cache dir>/codesumma/cache.json)
    #[arg(long, value_name = "PATH")]
    cache_file: Option<PathBuf>,

    /// Config file (default: ./.codesumma.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "codesumma=debug,warn" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn read_traceback_from_stdin() -> Result<String> {
    eprintln!("Paste traceback (end with EOF):");
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read traceback from stdin")?;
    Ok(buf.trim_end_matches('\n').to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = match cli.config.as_ref() {
        Some(p) => load_config_file(p),
        None => load_config(&std::env::current_dir().context("Failed to get current dir")?),
    };
    if let Some(p) = cli.cache_file {
        cfg.cache.path = Some(p);
    }

    let traceback = match cli.traceback {
        None => None,
        Some(Some(text)) => Some(text),
        Some(None) => Some(read_traceback_from_stdin()?),
    };

    let opts = RunOptions {
        input: cli.input_path,
        all: cli.all,
        ignore: cli.ignore,
        max_tokens_out: cli.max_tokens_out.unwrap_or(cfg.budget.max_tokens_out),
        print_full: cli.print_full,
        print_only: cli.print_only,
        traceback,
    };

    let out = match run_summary(&opts, &cfg) {
        Ok(out) => out,
        Err(err) => {
            if let Some(run_err) = err.downcast_ref::<RunError>() {
                eprintln!("{run_err}");
                eprintln!("{}", run_err.diagnostics());
                std::process::exit(1);
            }
            return Err(err);
        }
    };

    print!("{}", out.document);
    eprintln!(
        "Summary length: {} characters, {} tokens ({} files, {} model calls)",
        out.document.chars().count(),
        out.tokens,
        out.files,
        out.remote_calls
    );
    Ok(())
}
