//! tracelink - Trace requirements to tests and measure verification coverage
//!
//! tracelink reads requirement identifiers from markdown documents, finds
//! `@satisfies` annotations in test sources, looks the annotated tests up in
//! a test results artifact and reports per-requirement coverage.

use clap::{Args, Parser, Subcommand};
use eyre::{Result, WrapErr};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracelink::config::{DEFAULT_CONFIG_PATH, Overrides, find_project_root, load_config};
use tracelink::output::{OutputFormat, render_index, render_report};
use tracelink_core::TraceError;
use tracelink_core::pipeline::{run, scan_catalog};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Trace requirements to tests and measure verification coverage",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Path to config file (default: .config/tracelink/config.yaml)
    #[clap(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Debug logging and per-test detail in text reports
    #[clap(long, short = 'v', global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Option<Command>,

    #[clap(flatten)]
    report: ReportArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute coverage and print the traceability report (default)
    Report(ReportArgs),

    /// Print the definition index: requirements, test cases, duplicates and orphans
    Index(IndexArgs),
}

/// Where requirement documents live
#[derive(Args, Debug, Clone, Default)]
struct DocumentArgs {
    /// Requirement roots; repeatable, each value may hold `;` or `,` separated roots
    #[clap(long, short = 'r')]
    requirements: Vec<String>,

    /// Glob patterns to skip
    #[clap(long)]
    ignore: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct ReportArgs {
    #[clap(flatten)]
    documents: DocumentArgs,

    /// Test source roots
    #[clap(long, short = 't')]
    tests: Vec<String>,

    /// Test results file (CTest XML or ctest log)
    #[clap(long)]
    results: Option<PathBuf>,

    /// Minimum coverage percentage to pass (default: 75)
    #[clap(long)]
    threshold: Option<f64>,

    /// Priorities counted by the aggregate (default: P0 and P1)
    #[clap(long = "priority", short = 'p')]
    priorities: Vec<String>,

    /// Output format: text, json, markdown
    #[clap(long, short = 'f', default_value = "text")]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[clap(long, short = 'o')]
    output: Option<PathBuf>,

    /// Exit with status 1 when coverage is below the threshold
    #[clap(long)]
    check: bool,
}

#[derive(Args, Debug, Clone)]
struct IndexArgs {
    #[clap(flatten)]
    documents: DocumentArgs,

    /// Test source roots to collect `TEST-*` case identifiers from
    #[clap(long, short = 't')]
    tests: Vec<String>,

    /// Output format: text, json, markdown
    #[clap(long, short = 'f', default_value = "json")]
    format: OutputFormat,

    /// Write the index to a file instead of stdout
    #[clap(long, short = 'o')]
    output: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if let Some(trace_err) = err.downcast_ref::<TraceError>() {
                eprintln!("{} {}", "error:".red().bold(), trace_err);
                std::process::exit(2);
            }
            eprintln!("{} {:?}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    }
}

fn dispatch(cli: Cli) -> Result<i32> {
    // Relative config paths resolve against the project root, or against the
    // directory of an explicitly given config file
    let (config_path, base) = match &cli.config {
        Some(path) => {
            let base = path.parent().map(PathBuf::from).unwrap_or_default();
            (path.clone(), base)
        }
        None => {
            let root = find_project_root()?;
            (root.join(DEFAULT_CONFIG_PATH), root)
        }
    };
    let config = load_config(&config_path)?;

    match cli.command {
        Some(Command::Index(args)) => {
            let overrides = Overrides {
                requirements: args.documents.requirements,
                tests: args.tests,
                ignore: args.documents.ignore,
                ..Default::default()
            };
            let (inputs, _) = config.resolve(&overrides, &base)?;
            let (catalog, warnings) = scan_catalog(&inputs)?;
            log_warnings(&warnings);
            if catalog.is_empty() {
                return Err(TraceError::NoRequirements {
                    roots: inputs.requirements,
                }
                .into());
            }
            let rendered = render_index(&catalog, args.format)?;
            emit(&rendered, args.output.as_ref())?;
            Ok(0)
        }
        Some(Command::Report(args)) => run_report(&config, &base, args, cli.verbose),
        None => run_report(&config, &base, cli.report, cli.verbose),
    }
}

fn run_report(
    config: &tracelink::config::Config,
    base: &std::path::Path,
    args: ReportArgs,
    verbose: bool,
) -> Result<i32> {
    let overrides = Overrides {
        requirements: args.documents.requirements,
        tests: args.tests,
        results: args.results,
        ignore: args.documents.ignore,
        priorities: args.priorities,
        threshold: args.threshold,
    };
    let (inputs, options) = config.resolve(&overrides, base)?;

    let trace = run(&inputs, &options)?;
    log_warnings(&trace.warnings);

    let report = &trace.report;
    info!(
        "Coverage {:.1}% ({}/{} requirements, threshold {}%)",
        report.coverage_percent(),
        report.tested,
        report.total(),
        report.threshold
    );

    let rendered = render_report(report, args.format, verbose)?;
    emit(&rendered, args.output.as_ref())?;

    if args.check && !report.is_passing(options.threshold) {
        return Ok(1);
    }
    Ok(0)
}

fn log_warnings(warnings: &[String]) {
    if !warnings.is_empty() {
        warn!("{} inputs could not be fully read", warnings.len());
    }
}

fn emit(rendered: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).wrap_err_with(|| {
                        format!("Failed to create directory {}", parent.display())
                    })?;
                }
            }
            std::fs::write(path, rendered)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
