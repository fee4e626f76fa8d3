use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{load_config, load_config_from, load_experiment};
use engine::MemoryDataset;
use orchestrator::{JsonFileExporter, Orchestrator, RunReport, RunStatus, WindowOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The main entry point for the Prism experiment analysis engine.
#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => {
            handle_analyze(args).await?;
        }
        Commands::Validate(args) => {
            handle_validate(args)?;
        }
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Windowed metric and statistics computation for multi-branch experiments.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis for an experiment as of a given date.
    Analyze(AnalyzeArgs),
    /// Check an experiment definition without running anything.
    Validate(ValidateArgs),
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// Path to the experiment definition TOML file.
    #[arg(long)]
    experiment: PathBuf,

    /// Path to the raw dataset JSON file.
    #[arg(long)]
    dataset: PathBuf,

    /// The date window due-ness and data inclusion are evaluated against
    /// (format: YYYY-MM-DD).
    #[arg(long)]
    as_of: NaiveDate,

    /// Settings file to use instead of the default config.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct ValidateArgs {
    /// Path to the experiment definition TOML file.
    #[arg(long)]
    experiment: PathBuf,
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Handles the orchestration of a full analysis run.
async fn handle_analyze(args: AnalyzeArgs) -> Result<()> {
    let settings = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let file = load_experiment(&args.experiment)?;
    let registry = file.build_registry()?;
    let dataset = MemoryDataset::from_json_file(&args.dataset)?;
    let exporter = JsonFileExporter::new(settings.run.export_dir.clone());

    println!(
        "Analyzing experiment '{}' as of {} ({} branches, {} metrics)",
        file.experiment.id,
        args.as_of,
        file.experiment.branches.len(),
        file.experiment.metrics.len()
    );

    let orchestrator = Orchestrator::new(settings, Arc::new(dataset), Arc::new(exporter));
    let report = orchestrator.run(&file.experiment, &registry, args.as_of).await?;

    print_report(&report);

    if report.status == RunStatus::Failed {
        anyhow::bail!("every due window failed; see the run report above");
    }
    Ok(())
}

/// Loads and validates an experiment definition, reporting what it found.
fn handle_validate(args: ValidateArgs) -> Result<()> {
    let file = load_experiment(&args.experiment)?;
    let registry = file.build_registry()?;

    println!(
        "Experiment '{}' is valid: {} branches, {} metric definitions, control branch {}.",
        file.experiment.id,
        file.experiment.branches.len(),
        registry.len(),
        file.experiment
            .control_branch
            .as_deref()
            .unwrap_or("(none; per-branch estimates only)")
    );
    Ok(())
}

/// Prints the per-window outcome table for a completed run.
fn print_report(report: &RunReport) {
    println!(
        "\nRun {} finished: {:?}{}",
        report.run_id,
        report.status,
        if report.cancelled { " (cancelled)" } else { "" }
    );

    let mut table = Table::new();
    table.set_header(vec!["Window", "Outcome", "Result rows", "Detail"]);

    for outcome in &report.outcomes {
        match outcome {
            WindowOutcome::Succeeded { window, results } => {
                let suppressed = results.iter().filter(|r| r.is_suppressed()).count();
                let detail = if suppressed > 0 {
                    format!("{suppressed} suppressed")
                } else {
                    String::new()
                };
                table.add_row(vec![
                    window.label(),
                    "succeeded".to_string(),
                    results.len().to_string(),
                    detail,
                ]);
            }
            WindowOutcome::Failed { window, kind, reason } => {
                table.add_row(vec![
                    window.label(),
                    "failed".to_string(),
                    String::new(),
                    format!("{kind:?}: {reason}"),
                ]);
            }
            WindowOutcome::Skipped { window } => {
                table.add_row(vec![
                    window.label(),
                    "skipped".to_string(),
                    String::new(),
                    "run cancelled".to_string(),
                ]);
            }
        }
    }

    println!("{table}");
}
