// Command-line entry point for Kernelize.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kernelize::application::{KernelizeUsecase, RunSummary};
use kernelize::domain::matchers::MatcherSet;
use kernelize::infrastructure::{printer_for, source_for, Config, EmitFormat, InputFormat, StderrSink};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Translation unit to check (.json generic tree or .c/.h source)
    input: PathBuf,

    /// Input format
    #[arg(short, long, value_enum, default_value_t = InputFormat::Auto)]
    format: InputFormat,

    /// What to print on stdout (overrides the config file)
    #[arg(short, long, value_enum)]
    emit: Option<EmitFormat>,

    /// Configuration file (default: ./kernelize.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the outside-critical-section scan
    #[arg(long)]
    no_warnings: bool,

    /// Skip the access-in-critical-section scan
    #[arg(long)]
    no_suggestions: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> Result<RunSummary> {
    let config = Config::discover(cli.config.as_deref()).context("failed to load configuration")?;

    let mut checks = config.check_options();
    if cli.no_warnings {
        checks.outside_section = false;
    }
    if cli.no_suggestions {
        checks.access_in_section = false;
    }

    let source = source_for(cli.format, &cli.input)?;
    let printer = printer_for(cli.emit.unwrap_or(config.output.emit));
    let matchers = MatcherSet::kernel();

    let usecase = KernelizeUsecase {
        source: source.as_ref(),
        printer: printer.as_deref(),
        matchers: &matchers,
        checks,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut sink = StderrSink::default();
    let summary = usecase.run(&cli.input, &mut out, &mut sink)?;
    out.flush().context("failed to flush stdout")?;
    Ok(summary)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(summary) => {
            tracing::debug!(
                nodes_before = summary.nodes_before,
                nodes_after = summary.nodes_after,
                findings = summary.findings.total(),
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
