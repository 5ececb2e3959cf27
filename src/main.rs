//! @ai:module:intent CLI for batch inference runs and run comparison
//! @ai:module:layer presentation

use anyhow::Result;
use clap::{Parser, Subcommand};
use llm_batch_bench::{
    config::{BenchConfig, ProviderKind},
    dataset::{DatasetLoader, DatasetLoaderTrait, LabeledExample},
    experiment::{ExperimentRecorderTrait, ExperimentRun, JsonRecorder, RunHandle},
    metrics::{default_analyses, ComparisonResults},
    pipeline::{run_experiment, RunRequest},
    report::{ComparativeVisualizerTrait, ReportGenerator, VisualizerConfig},
    runner::{create_provider, BatchExecutor, BatchStats},
    template::PromptTemplate,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "llm-batch-bench")]
#[command(about = "Rate-limited batch LLM inference with experiment run comparison")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a prompt template over the dataset and record the predictions
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Name of the recorded run (defaults to model and timestamp)
        #[arg(short, long)]
        name: Option<String>,

        /// Model identifier override
        #[arg(long)]
        model: Option<String>,

        /// Provider override: hosted, local or mock
        #[arg(long)]
        provider: Option<ProviderKind>,

        /// Requests per minute override (0 disables throttling)
        #[arg(long, allow_hyphen_values = true)]
        rpm: Option<i64>,

        /// Only use the first N examples
        #[arg(long)]
        limit: Option<usize>,

        /// Run without making API calls
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare recorded runs and write reports
    Compare {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Runs to compare (comma-separated, defaults to all)
        #[arg(long)]
        runs: Option<String>,

        /// Output directory for reports
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Domain tag recorded in the report
        #[arg(long, default_value = "text-classification")]
        domain: String,

        /// Dataset field shown as the example text
        #[arg(long, default_value = "text")]
        text_field: String,
    },

    /// List recorded runs
    List {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check that every dataset record renders against the template
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "bench.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("llm_batch_bench=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            name,
            model,
            provider,
            rpm,
            limit,
            dry_run,
        } => {
            run_batch(RunArgs {
                config,
                name,
                model,
                provider,
                rpm,
                limit,
                dry_run,
            })
            .await
        }
        Commands::Compare {
            config,
            runs,
            output,
            domain,
            text_field,
        } => compare_runs(config, runs, output, &domain, &text_field),
        Commands::List { config } => list_runs(config),
        Commands::Validate { config } => validate(config),
        Commands::Init { output } => init_config(output),
    }
}

struct RunArgs {
    config: Option<PathBuf>,
    name: Option<String>,
    model: Option<String>,
    provider: Option<ProviderKind>,
    rpm: Option<i64>,
    limit: Option<usize>,
    dry_run: bool,
}

/// @ai:intent Execute one batch and record it
/// @ai:effects network, fs:read, fs:write
async fn run_batch(args: RunArgs) -> Result<()> {
    let mut config = BenchConfig::load_or_default(args.config.as_deref())?;

    if let Some(model) = args.model {
        config.model.model = model;
    }
    if let Some(provider) = args.provider {
        config.model.provider = provider;
    }
    if let Some(rpm) = args.rpm {
        config.generation.requests_per_minute = Some(rpm);
    }
    if args.limit.is_some() {
        config.run.limit = args.limit;
    }
    config.run.dry_run |= args.dry_run;

    config.validate()?;

    let examples = load_examples(&config)?;
    let template = PromptTemplate::load(&config.paths.template_file)?;

    if examples.is_empty() {
        tracing::warn!("Dataset is empty; the run will contain no predictions");
    }

    let name = args
        .name
        .unwrap_or_else(|| default_run_name(&config.model.model));

    if config.run.dry_run {
        tracing::info!("Running in dry-run mode");
    }

    let provider = Arc::new(create_provider(&config.model, config.run.dry_run)?);
    let executor = BatchExecutor::new(provider, &config.run);
    let recorder = JsonRecorder::new(&config.paths.results_dir);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling batch");
            trigger.cancel();
        }
    });

    tracing::info!(
        "Running {} examples through {} ({})",
        examples.len(),
        config.model.model,
        config.model.provider
    );

    let (handle, stats) = run_experiment(
        &executor,
        &recorder,
        RunRequest {
            name: &name,
            examples: &examples,
            template: &template,
            model: &config.model,
            generation: &config.generation,
        },
        &cancel,
    )
    .await?;

    print_run_summary(&handle, &stats);
    Ok(())
}

/// @ai:intent Load the dataset and apply the configured limit
/// @ai:effects fs:read
fn load_examples(config: &BenchConfig) -> Result<Vec<LabeledExample>> {
    tracing::info!("Loading dataset from {}", config.paths.dataset.display());

    let mut examples = DatasetLoader::new().load(&config.paths.dataset)?;

    if let Some(limit) = config.run.limit {
        examples.truncate(limit);
    }

    Ok(examples)
}

/// @ai:intent Build a run name that the recorder accepts
/// @ai:effects time
fn default_run_name(model: &str) -> String {
    let sanitized: String = model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");

    format!("{}_{}", sanitized.trim_start_matches('.'), timestamp)
}

/// @ai:intent Compare recorded runs over the dataset
/// @ai:effects fs:read, fs:write
fn compare_runs(
    config_path: Option<PathBuf>,
    runs: Option<String>,
    output: Option<PathBuf>,
    domain: &str,
    text_field: &str,
) -> Result<()> {
    let config = BenchConfig::load_or_default(config_path.as_deref())?;
    let recorder = JsonRecorder::new(&config.paths.results_dir);

    let handles: Vec<RunHandle> = match runs {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(RunHandle::new)
            .collect(),
        None => recorder.list()?,
    };

    if handles.is_empty() {
        tracing::warn!("No runs to compare");
        return Ok(());
    }

    let runs = handles
        .iter()
        .map(|handle| recorder.load(handle))
        .collect::<Result<Vec<ExperimentRun>>>()?;

    let mut examples = DatasetLoader::new().load(&config.paths.dataset)?;

    // Runs recorded with a limit cover a prefix of the dataset
    let lengths: std::collections::BTreeSet<usize> =
        runs.iter().map(|run| run.predictions().len()).collect();
    if let (1, Some(&len)) = (lengths.len(), lengths.iter().next()) {
        if len < examples.len() {
            tracing::info!("Comparing against the first {} examples", len);
            examples.truncate(len);
        }
    }

    let visualizer_config = VisualizerConfig {
        output_dir: output.unwrap_or_else(|| config.paths.results_dir.join("comparison")),
    };

    let results = ReportGenerator::new().render(
        &examples,
        &runs,
        domain,
        text_field,
        &default_analyses(),
        &visualizer_config,
    )?;

    print_comparison_summary(&results);
    println!(
        "Reports generated in {}",
        visualizer_config.output_dir.display()
    );
    Ok(())
}

/// @ai:intent List recorded runs
/// @ai:effects fs:read
fn list_runs(config_path: Option<PathBuf>) -> Result<()> {
    let config = BenchConfig::load_or_default(config_path.as_deref())?;
    let recorder = JsonRecorder::new(&config.paths.results_dir);
    let handles = recorder.list()?;

    println!("Recorded runs ({}):", handles.len());
    println!();
    println!(
        "{:<40} {:<30} {:>8} {:>8}",
        "Name", "Model", "Slots", "Failed"
    );
    println!("{}", "-".repeat(90));

    for handle in &handles {
        match recorder.load(handle) {
            Ok(run) => println!(
                "{:<40} {:<30} {:>8} {:>8}",
                run.name(),
                run.model().unwrap_or("-"),
                run.predictions().len(),
                run.failed_count()
            ),
            Err(e) => tracing::warn!("Skipping unreadable run {}: {}", handle, e),
        }
    }

    Ok(())
}

/// @ai:intent Render every record without calling a provider
/// @ai:effects fs:read
fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let config = BenchConfig::load_or_default(config_path.as_deref())?;
    config.validate()?;

    let examples = load_examples(&config)?;
    let template = PromptTemplate::load(&config.paths.template_file)?;

    let failures: Vec<(usize, String)> = examples
        .iter()
        .enumerate()
        .filter_map(|(index, example)| {
            template
                .render(&example.record)
                .err()
                .map(|e| (index, e.to_string()))
        })
        .collect();

    println!("Template placeholders: {}", template.placeholders().join(", "));
    println!("Examples: {}", examples.len());

    if failures.is_empty() {
        println!("Validation passed!");
        return Ok(());
    }

    println!("Records that cannot be rendered ({}):", failures.len());
    for (index, reason) in failures.iter().take(20) {
        println!("  - line {}: {}", index + 1, reason);
    }

    anyhow::bail!("{} of {} records failed to render", failures.len(), examples.len())
}

/// @ai:intent Initialize default configuration file
/// @ai:effects fs:write
fn init_config(output: PathBuf) -> Result<()> {
    let config = BenchConfig::default();
    config.save(&output)?;
    println!("Configuration saved to {}", output.display());
    Ok(())
}

/// @ai:intent Print batch counters to console
/// @ai:effects io
fn print_run_summary(handle: &RunHandle, stats: &BatchStats) {
    println!();
    println!("Run {}", handle);
    println!("{}", "=".repeat(40));
    println!("{:<20} {:>10}", "Examples:", stats.total);
    println!("{:<20} {:>10}", "Completed:", stats.completed);
    println!("{:<20} {:>10}", "Failed:", stats.failed);
    println!("{:<20} {:>10}", "Provider calls:", stats.calls_made);
    println!("{:<20} {:>10}", "Input tokens:", stats.input_tokens);
    println!("{:<20} {:>10}", "Output tokens:", stats.output_tokens);
    println!("{:<20} {:>8}ms", "Elapsed:", stats.elapsed_ms);
    println!();
}

/// @ai:intent Print per-run metrics to console
/// @ai:effects io
fn print_comparison_summary(results: &ComparisonResults) {
    println!();
    println!("Run Comparison ({})", results.domain);
    println!("{}", "=".repeat(60));
    println!();
    println!(
        "{:<30} {:>10} {:>8} {:>10}",
        "Run", "Completed", "Failed", "Exact %"
    );
    println!("{}", "-".repeat(60));

    for run in &results.runs {
        let rate = run
            .metrics
            .get("exact_match_rate")
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<30} {:>10} {:>8} {:>10}",
            run.run, run.completed, run.failed, rate
        );
    }

    println!();
    println!(
        "Examples with disagreement: {}/{}",
        results.disagreements,
        results.examples.len()
    );
    println!();
}
