//! # Intruder Sweep - CLI Entry Point
//!
//! Commands:
//! - `scan <LOG>`  - Sweep an access log and print the suspect report
//! - `init-config` - Generate a default configuration file

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};

use intruder_sweep::detection::{self, SweepOutcome};
use intruder_sweep::log_sources::LogFormat;
use intruder_sweep::report::{writer, ReportFormat};
use intruder_sweep::{SweepConfig, SweepError, SweepResult};

/// Intruder Sweep - flag clients that probed broadly and then succeeded
/// against a sensitive endpoint inside a time window.
#[derive(Parser, Debug)]
#[command(name = "intruder-sweep")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "intruder-sweep.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep an access log once and report suspects.
    Scan(ScanArgs),

    /// Generate a default configuration file.
    InitConfig,
}

/// Per-run overrides. Anything left unset comes from the config file.
#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Access log to sweep.
    log: PathBuf,

    /// Window start, HH:MM:SS (inclusive).
    #[arg(long)]
    start: Option<String>,

    /// Window end, HH:MM:SS (inclusive).
    #[arg(long)]
    end: Option<String>,

    /// Distinct endpoint count a client must exceed.
    #[arg(long)]
    threshold: Option<usize>,

    /// Sensitive endpoint. Repeat to list several; replaces the configured set.
    #[arg(long = "sensitive")]
    sensitive: Vec<String>,

    /// Status code that counts as success.
    #[arg(long)]
    success_status: Option<u16>,

    /// Input layout: iso or combined.
    #[arg(long)]
    format: Option<LogFormat>,

    /// Report incomplete after this many lines.
    #[arg(long)]
    max_lines: Option<u64>,

    /// Report incomplete after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Aggregation partitions (1 = sequential).
    #[arg(long)]
    partitions: Option<usize>,

    /// Render the report as JSON.
    #[arg(long)]
    json: bool,

    /// Write the report to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> SweepResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => cmd_scan(&cli.config, args).await,
        Commands::InitConfig => cmd_init_config(&cli.config),
    }
}

/// Sweep one log:
/// 1. Load configuration and apply CLI overrides
/// 2. Validate window and policy (fatal before any line is read)
/// 3. Scan, sequential or partitioned
/// 4. Deliver the report, or fail if the scan was cut short
async fn cmd_scan(config_path: &Path, args: ScanArgs) -> SweepResult<()> {
    let mut config = if config_path.exists() {
        info!("Loading configuration from: {}", config_path.display());
        SweepConfig::from_file(config_path)?
    } else {
        info!("No config file found, using defaults. Run 'init-config' to generate one.");
        SweepConfig::default()
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    info!(
        "Window [{}, {}], threshold {}, sensitive {:?}, success status {}",
        config.window.start,
        config.window.end,
        config.policy.breadth_threshold,
        config.policy.sensitive_endpoints,
        config.policy.success_status,
    );

    match detection::sweep_file(&args.log, &config).await? {
        SweepOutcome::Complete(report) => writer::deliver(
            &report,
            config.report.format,
            config.report.output_path.as_deref(),
        ),
        SweepOutcome::Incomplete { lines_read, reason } => {
            warn!("Scan of {} did not finish; no report emitted", args.log.display());
            Err(SweepError::ScanIncomplete { lines_read, reason })
        }
    }
}

fn apply_overrides(config: &mut SweepConfig, args: &ScanArgs) {
    if let Some(ref start) = args.start {
        config.window.start = start.clone();
    }
    if let Some(ref end) = args.end {
        config.window.end = end.clone();
    }
    if let Some(threshold) = args.threshold {
        config.policy.breadth_threshold = threshold;
    }
    if !args.sensitive.is_empty() {
        config.policy.sensitive_endpoints = args.sensitive.clone();
    }
    if let Some(status) = args.success_status {
        config.policy.success_status = status;
    }
    if let Some(format) = args.format {
        config.scan.format = format;
    }
    if args.max_lines.is_some() {
        config.scan.max_lines = args.max_lines;
    }
    if args.timeout_secs.is_some() {
        config.scan.timeout_secs = args.timeout_secs;
    }
    if let Some(partitions) = args.partitions {
        config.scan.partitions = partitions;
    }
    if args.json {
        config.report.format = ReportFormat::Json;
    }
    if args.output.is_some() {
        config.report.output_path = args.output.clone();
    }
}

/// Generate a default configuration file.
fn cmd_init_config(config_path: &Path) -> SweepResult<()> {
    if config_path.exists() {
        return Err(SweepError::Config(format!(
            "Configuration file already exists: {}. Remove it first or use a different path.",
            config_path.display()
        )));
    }

    SweepConfig::write_default(config_path)?;
    println!("Default configuration written to: {}", config_path.display());
    println!();
    println!("Key settings:");
    println!("  [window] - Inspection window, HH:MM:SS, inclusive, no midnight wrap");
    println!("  [policy] - breadth_threshold, sensitive_endpoints, success_status");
    println!("  [scan]   - format (iso|combined), max_lines, timeout_secs, partitions");
    println!("  [report] - format (text|json), output_path");

    Ok(())
}
