//! reviewclean CLI
//!
//! Batch cleaning and sentiment labeling for product-review datasets

mod config;
mod progress;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use reviewclean_core::pipeline::CHECKPOINT_INGEST;
use reviewclean_core::quality::{EnforcementMode, Metric};
use reviewclean_core::{Pipeline, PipelineRun, QualityHistory};
use reviewclean_formats::record::REQUIRED_COLUMNS;
use reviewclean_formats::{open_dataset, read_dataset, write_dataset, DatasetReader, Record};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::RunConfig;
use progress::ProgressReporter;

#[derive(Parser)]
#[command(name = "reviewclean")]
#[command(version, about = "Batch cleaning and sentiment labeling for product reviews", long_about = None)]
#[command(author = "reviewclean")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output statistics in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Emit log events as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full cleaning pipeline
    Run {
        /// Config file (YAML or TOML). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input file (CSV or JSONL); overrides the config
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file; overrides the config
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append quality reports to this JSONL file; overrides the config
        #[arg(long)]
        history: Option<PathBuf>,

        /// Report breaches without blocking any stage
        #[arg(long)]
        observe_only: bool,

        /// Run every stage but skip writing the result
        #[arg(long)]
        dry_run: bool,
    },

    /// Compute a quality report for a dataset without transforming it
    Profile {
        /// Path to the dataset file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Config file with quality settings (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Checkpoint name recorded in the report
        #[arg(long, default_value = CHECKPOINT_INGEST)]
        checkpoint: String,

        /// Append the report to this JSONL file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Exit with an error when a blocking threshold is breached
        #[arg(long)]
        strict: bool,
    },

    /// Show columns, required-column status and the first records of a file
    Inspect {
        /// Path to the dataset file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Number of records to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Count records and null required fields in a dataset
    Count {
        /// Path to the dataset file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Write a config file with every default filled in
    InitConfig {
        /// Destination (.yaml, .yml or .toml)
        #[arg(value_name = "FILE", default_value = "reviewclean.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG overrides the --verbose level
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    if cli.log_json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_ansi(!cli.json) // Disable colors if JSON output
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    match cli.command {
        Commands::Run {
            config,
            input,
            output,
            history,
            observe_only,
            dry_run,
        } => {
            let run_config = load_config(config.as_deref())?.with_overrides(input, output, history);
            run_pipeline(run_config, observe_only, dry_run, cli.json)?;
        }
        Commands::Profile {
            input,
            config,
            checkpoint,
            history,
            strict,
        } => {
            let run_config = load_config(config.as_deref())?;
            profile_dataset(input, run_config, &checkpoint, history, strict, cli.json)?;
        }
        Commands::Inspect { input, limit } => {
            inspect_dataset(input, limit)?;
        }
        Commands::Count { input } => {
            count_dataset(input)?;
        }
        Commands::InitConfig { path, force } => {
            init_config(&path, force)?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => {
            info!("Loading config: {:?}", path);
            RunConfig::load(path)
        }
        None => Ok(RunConfig::default()),
    }
}

fn run_pipeline(
    mut config: RunConfig,
    observe_only: bool,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    let input = config
        .input
        .path
        .clone()
        .context("No input file given (use --input or input.path in the config)")?;
    let output = config.output.path.clone();
    if output.is_none() && !dry_run {
        anyhow::bail!("No output file given (use --output or output.path in the config)");
    }
    if observe_only {
        let policy = config.pipeline.quality.policy.clone();
        config.pipeline.quality.policy = Metric::ALL
            .into_iter()
            .fold(policy, |p, metric| p.with_mode(metric, EnforcementMode::Observe));
    }

    info!("Running review cleaning pipeline");
    info!("  Input: {:?}", input);
    info!("  Output: {:?}", output);
    info!("  History: {:?}", config.output.history);

    let dataset = read_dataset(&input)
        .with_context(|| format!("Failed to load input: {}", input.display()))?;
    let pipeline = Pipeline::new(config.pipeline.clone())?;

    let mut progress = ProgressReporter::new(dataset.len(), !json_output);
    let run = pipeline.run_with_listener(dataset, &mut progress);
    progress.finish();

    // Reports are kept even when a stage was blocked
    if let Some(history_path) = &config.output.history {
        let written = run
            .history
            .append_to(history_path)
            .with_context(|| format!("Failed to append history: {}", history_path.display()))?;
        info!("Appended {} quality reports to {:?}", written, history_path);
    }

    if !run.is_success() {
        let partial_output = output.as_deref().filter(|_| !dry_run);
        return fail_blocked_run(&input, partial_output, run, json_output);
    }

    let written_to = match (&output, dry_run) {
        (Some(output), false) => {
            let written = write_dataset(output, &run.dataset, config.output.columns.as_deref())
                .with_context(|| format!("Failed to write output: {}", output.display()))?;
            info!("Wrote {} records to {:?}", written, output);
            Some(output.as_path())
        }
        _ => None,
    };

    if json_output {
        print_run_json(&input, written_to, &run)?;
    } else {
        progress::print_summary_report(&input, written_to, &run.stats, &run.history);
    }

    Ok(())
}

/// Keep what a blocked run completed next to the intended output and turn
/// the failure into the command's error. Always returns `Err`.
fn fail_blocked_run(
    input: &Path,
    output: Option<&Path>,
    run: PipelineRun,
    json_output: bool,
) -> Result<()> {
    if let Some(output) = output {
        let partial = blocked_path(output);
        write_dataset(&partial, &run.dataset, None)
            .with_context(|| format!("Failed to write partial output: {}", partial.display()))?;
        warn!(
            "Wrote {} records from the last completed stage to {:?}",
            run.dataset.len(),
            partial
        );
    }
    if json_output {
        print_run_json(input, None, &run)?;
    }

    let stage = run.blocked_stage().unwrap_or("unknown").to_string();
    error!("Run stopped before stage {}", stage);
    match run.into_result() {
        Err(err) => Err(err.into()),
        Ok(_) => anyhow::bail!("Run stopped before stage {}", stage),
    }
}

fn print_run_json(
    input: &Path,
    output: Option<&Path>,
    run: &PipelineRun,
) -> Result<()> {
    let report = serde_json::json!({
        "input": input.to_string_lossy().to_string(),
        "output": output.map(|p| p.to_string_lossy().to_string()),
        "success": run.is_success(),
        "blocked_stage": run.blocked_stage(),
        "error": run.failure.as_ref().map(|e| e.to_string()),
        "completed_stages": run.completed,
        "stats": run.stats,
        "quality": run.history,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Derive the companion path for a blocked run's partial output.
///
/// Examples:
///   reviews.clean.csv → reviews.clean.blocked.csv
///   out.jsonl         → out.blocked.jsonl
fn blocked_path(output: &Path) -> PathBuf {
    let stem = output.file_stem().unwrap_or_default().to_string_lossy();
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    match output.extension() {
        Some(ext) => parent.join(format!("{}.blocked.{}", stem, ext.to_string_lossy())),
        None => parent.join(format!("{}.blocked", stem)),
    }
}

fn profile_dataset(
    input: PathBuf,
    config: RunConfig,
    checkpoint: &str,
    history_path: Option<PathBuf>,
    strict: bool,
    json_output: bool,
) -> Result<()> {
    info!("Profiling dataset: {:?}", input);

    let dataset = read_dataset(&input)
        .with_context(|| format!("Failed to load input: {}", input.display()))?;
    let pipeline = Pipeline::new(config.pipeline)?;
    let history: QualityHistory = pipeline.profile(checkpoint, &dataset);

    if let Some(path) = history_path.or(config.output.history) {
        history
            .append_to(&path)
            .with_context(|| format!("Failed to append history: {}", path.display()))?;
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else {
        for report in history.reports() {
            progress::print_quality_report(report);
        }
    }

    if strict {
        if let Some(report) = history.last().filter(|r| r.is_blocking()) {
            let reasons: Vec<String> = report.blocking_breaches().map(|b| b.to_string()).collect();
            anyhow::bail!("Blocking quality breaches: {}", reasons.join("; "));
        }
    }

    Ok(())
}

fn inspect_dataset(input: PathBuf, limit: usize) -> Result<()> {
    info!("Inspecting dataset: {:?}", input);

    let mut reader = open_dataset(&input)?;
    let header = reader.header();
    let records = reader
        .by_ref()
        .take(limit)
        .collect::<reviewclean_formats::Result<Vec<Record>>>()?;

    // JSONL has no header; the first record stands in for it
    let columns = header.unwrap_or_else(|| {
        records
            .first()
            .map(|r| r.data.keys().cloned().collect())
            .unwrap_or_default()
    });
    println!("Columns:");
    for (column, status) in column_status(&columns) {
        println!("  {:<24} {}", column, status);
    }

    for record in &records {
        println!(
            "Record #{}: {}",
            record.source_line,
            serde_json::to_string_pretty(&record.data)?
        );
        let nulls = null_required(record);
        if !nulls.is_empty() {
            println!("  null required fields: {}", nulls.join(", "));
        }
    }

    info!(
        "Processed {} records ({} bytes)",
        reader.records_processed(),
        reader.bytes_processed()
    );

    Ok(())
}

/// Each input column marked `required` or `extra`, followed by the required
/// columns the input lacks, marked `missing`
fn column_status(columns: &[String]) -> Vec<(String, &'static str)> {
    let mut status: Vec<(String, &'static str)> = columns
        .iter()
        .map(|column| {
            let kind = if REQUIRED_COLUMNS.contains(&column.as_str()) {
                "required"
            } else {
                "extra"
            };
            (column.clone(), kind)
        })
        .collect();
    status.extend(
        REQUIRED_COLUMNS
            .iter()
            .filter(|required| !columns.iter().any(|c| c.as_str() == **required))
            .map(|required| (required.to_string(), "missing")),
    );
    status
}

fn null_required(record: &Record) -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| record.is_null(column))
        .collect()
}

/// Record totals gathered by `count`
#[derive(Debug, Default, PartialEq)]
struct RecordCounts {
    total: usize,
    /// Records with at least one null required field
    incomplete: usize,
    nulls: BTreeMap<&'static str, usize>,
}

fn tally_records(
    reader: &mut dyn DatasetReader,
    pb: Option<&indicatif::ProgressBar>,
) -> Result<RecordCounts> {
    let mut counts = RecordCounts::default();
    while let Some(result) = reader.next() {
        let record = result?;
        counts.total += 1;

        let nulls = null_required(&record);
        if !nulls.is_empty() {
            counts.incomplete += 1;
        }
        for column in nulls {
            *counts.nulls.entry(column).or_insert(0) += 1;
        }

        if let Some(pb) = pb {
            pb.set_position(reader.bytes_processed());
        }
        if counts.total % 10000 == 0 {
            info!("Processed {} records...", counts.total);
        }
    }
    Ok(counts)
}

fn count_dataset(input: PathBuf) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    info!("Counting records in: {:?}", input);

    let mut reader = open_dataset(&input)?;

    let pb = if let Some(total) = reader.total_bytes() {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let counts = tally_records(reader.as_mut(), pb.as_ref())?;
    if let Some(pb) = pb {
        pb.finish();
    }

    println!("Total records:      {}", progress::format_with_commas(counts.total));
    println!(
        "Incomplete records: {}",
        progress::format_with_commas(counts.incomplete)
    );
    for (column, nulls) in &counts.nulls {
        println!("  {:<17} {} null", format!("{}:", column), progress::format_with_commas(*nulls));
    }
    info!("Processed {} bytes", reader.bytes_processed());

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    RunConfig::example().save(path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
}
