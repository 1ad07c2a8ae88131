mod record;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use recovery_core::{run_scenario, RecoverySettings, Scenario};
use record::{default_run_id, RunRecord};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Check recovery settings and replay creature scenarios")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise. Settings with
    /// `debug = true` do the same.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a settings file with the default values.
    Init(InitArgs),
    /// Resolve a settings file and print the derived configuration.
    Check(CheckArgs),
    /// Replay a scenario file and emit a JSON run record.
    Simulate(SimulateArgs),
    /// Summarise an existing run record.
    Report(ReportArgs),
}

#[derive(Args)]
struct InitArgs {
    #[arg(long, default_value = "recovery.toml")]
    config: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct CheckArgs {
    #[arg(long, default_value = "recovery.toml")]
    config: PathBuf,
}

#[derive(Args)]
struct SimulateArgs {
    #[arg(long)]
    scenario: PathBuf,
    /// Also write the run record here.
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long)]
    id: Option<String>,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    input: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => {
            init_tracing(cli.debug);
            handle_init(args)
        }
        Commands::Check(args) => handle_check(args, cli.debug),
        Commands::Simulate(args) => handle_simulate(args, cli.debug),
        Commands::Report(args) => {
            init_tracing(cli.debug);
            handle_report(args)
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn handle_init(args: InitArgs) -> Result<()> {
    if args.config.exists() && !args.force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            args.config.display()
        );
    }
    if args.force {
        let data = RecoverySettings::default().to_toml_string()?;
        fs::write(&args.config, data)
            .with_context(|| format!("failed to write {}", args.config.display()))?;
    } else {
        RecoverySettings::load_or_init(&args.config)?;
    }
    println!("Default settings written to {}", args.config.display());
    Ok(())
}

fn handle_check(args: CheckArgs, debug: bool) -> Result<()> {
    let settings = RecoverySettings::from_path(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    init_tracing(debug || settings.debug_enabled());
    let resolved = settings.resolve();
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

fn handle_simulate(args: SimulateArgs, debug: bool) -> Result<()> {
    let scenario = Scenario::from_path(&args.scenario)
        .with_context(|| format!("failed to load {}", args.scenario.display()))?;
    init_tracing(debug || scenario.settings.debug_enabled());
    let run_id = args.id.unwrap_or_else(default_run_id);
    info!(target: "recovery.scenario", id = %run_id, ticks = scenario.ticks, "simulating");

    let record = RunRecord::new(run_id, run_scenario(&scenario));
    let json = serde_json::to_string_pretty(&record)?;
    println!("{json}");

    if let Some(path) = args.report {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Run record written to {}", path.display());
    }
    Ok(())
}

fn handle_report(args: ReportArgs) -> Result<()> {
    let data = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let record: RunRecord = serde_json::from_str(&data)?;
    println!("{}", record.summary());
    Ok(())
}
