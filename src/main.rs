use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use ticketlens::{
    AppConfig, ClusteringEngine, EmbeddingClient, EmbeddingModelInfo, EmbeddingProvider,
    ExtractionStrategy, HashingEmbedder, LabelerClient, Record, ResultTable, RunConfig,
    TaskRegistry, TaskStatus, extract,
};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "ticketlens", version, about = "Topic discovery over free-text records")]
struct Cli {
    /// TOML configuration file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode, reduce, cluster and summarize a JSON array of records.
    Run {
        /// JSON array of `{ "text": ..., "id": ... }` objects.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        /// passthrough, section-body or call-transcript.
        #[arg(long, default_value = "passthrough")]
        strategy: ExtractionStrategy,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Cluster the stored embeddings again with new parameters.
    Recluster {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Fold clusters whose centroids are nearly parallel.
    Merge {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Quality metrics, size distribution, redundancy and a 2-D projection.
    Evaluate {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Name each cluster through the labelling service.
    Label {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Tuning {
    #[arg(long)]
    min_cluster_size: Option<usize>,
    #[arg(long)]
    neighbors: Option<usize>,
    #[arg(long)]
    components: Option<usize>,
    #[arg(long)]
    top_n: Option<usize>,
}

impl Tuning {
    fn apply(&self, mut config: RunConfig) -> RunConfig {
        if let Some(size) = self.min_cluster_size {
            config = config.with_min_cluster_size(size);
        }
        if let Some(n) = self.neighbors {
            config = config.with_neighbors(n);
        }
        if let Some(k) = self.components {
            config = config.with_components(k);
        }
        if let Some(n) = self.top_n {
            config = config.with_top_n(n);
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let start_time = Instant::now();
    match cli.command {
        Command::Run {
            input,
            state,
            output,
            strategy,
            tuning,
        } => run(&config, &input, &state, output.as_deref(), strategy, &tuning)?,
        Command::Recluster {
            state,
            output,
            tuning,
        } => recluster(&config, &state, output.as_deref(), &tuning)?,
        Command::Merge {
            state,
            threshold,
            output,
        } => merge(&config, &state, threshold, output.as_deref())?,
        Command::Evaluate { state, output } => evaluate(&config, &state, output.as_deref())?,
        Command::Label {
            state,
            endpoint,
            output,
        } => label(&config, &state, endpoint, output.as_deref())?,
    }

    eprintln!("\n✓ Finished in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("ticketlens=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ticketlens=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn provider(config: &AppConfig) -> Arc<dyn EmbeddingProvider> {
    match &config.embedding.endpoint {
        Some(endpoint) => {
            let info = EmbeddingModelInfo {
                name: config.embedding.model.clone(),
                ..EmbeddingModelInfo::default()
            };
            Arc::new(EmbeddingClient::new(endpoint.clone()).with_model(info))
        }
        None => Arc::new(HashingEmbedder::new(config.embedding.hashing_dim)),
    }
}

fn engine(config: &AppConfig) -> ClusteringEngine {
    ClusteringEngine::new(provider(config)).with_settings(config.engine.clone())
}

/// Engine restored from `state`; commands other than `run` need one.
fn restored_engine(config: &AppConfig, state: &Path) -> Result<ClusteringEngine> {
    let mut engine = engine(config);
    if !engine.load_state(state) {
        bail!("No usable saved state at {}", state.display());
    }
    Ok(engine)
}

fn run(
    config: &AppConfig,
    input: &Path,
    state: &Path,
    output: Option<&Path>,
    strategy: ExtractionStrategy,
    tuning: &Tuning,
) -> Result<()> {
    let step_start = Instant::now();
    eprintln!("Step 1: Reading records...");
    let file = File::open(input).context(format!("Failed to open {}", input.display()))?;
    let records: Vec<Record> = serde_json::from_reader(BufReader::new(file))
        .context(format!("Failed to parse records from {}", input.display()))?;
    let records = extract::prepare(records, &strategy);
    eprintln!(
        "✓ {} records ready ({}) [{:.2}s]\n",
        records.len(),
        strategy.name(),
        step_start.elapsed().as_secs_f64()
    );

    let step_start = Instant::now();
    eprintln!("Step 2: Clustering...");
    let run_config = tuning.apply(config.pipeline.clone());
    let mut engine = engine(config);
    let state_path = state.to_path_buf();

    let registry: TaskRegistry<ResultTable> = TaskRegistry::new();
    let id = registry.submit(move |reporter| {
        engine.set_reporter(reporter);
        let table = engine.run(records, &run_config)?;
        engine.save_state(&state_path)?;
        Ok(table)
    });

    let mut last_progress = None;
    let snapshot = loop {
        let Some(snapshot) = registry.wait(&id, PROGRESS_INTERVAL) else {
            bail!("Task {id} disappeared");
        };
        if last_progress != Some(snapshot.progress) {
            eprintln!("  [{:>3}%] {}", snapshot.progress, snapshot.message);
            last_progress = Some(snapshot.progress);
        }
        if snapshot.is_finished() {
            break snapshot;
        }
    };

    match (snapshot.status, snapshot.result) {
        (TaskStatus::Done, Some(table)) => {
            eprintln!(
                "✓ {} clusters, {} noise records [{:.2}s]",
                table.cluster_count(),
                table.noise_count(),
                step_start.elapsed().as_secs_f64()
            );
            eprintln!("✓ State saved to {}", state.display());
            write_json(output, table.rows())
        }
        _ => bail!(
            "Clustering failed: {}",
            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

fn recluster(config: &AppConfig, state: &Path, output: Option<&Path>, tuning: &Tuning) -> Result<()> {
    let mut engine = restored_engine(config, state)?;
    let step_start = Instant::now();
    eprintln!("Re-clustering stored embeddings...");
    let table = engine.re_cluster(&tuning.apply(config.pipeline.clone()))?;
    engine.save_state(state)?;
    eprintln!(
        "✓ {} clusters, {} noise records [{:.2}s]",
        table.cluster_count(),
        table.noise_count(),
        step_start.elapsed().as_secs_f64()
    );
    write_json(output, table.rows())
}

fn merge(config: &AppConfig, state: &Path, threshold: Option<f32>, output: Option<&Path>) -> Result<()> {
    let mut engine = restored_engine(config, state)?;
    let threshold = threshold.unwrap_or(config.engine.merge_threshold);
    eprintln!("Merging clusters above similarity {threshold}...");

    let report = engine.merge_similar_clusters(threshold)?;
    for step in &report.merges {
        eprintln!(
            "  {} → {} (similarity {:.3})",
            step.source, step.target, step.similarity
        );
    }
    if let Some(reason) = &report.skipped {
        eprintln!("  skipped: {reason}");
    }
    if report.merged_count() > 0 {
        engine.save_state(state)?;
    }
    eprintln!(
        "✓ {} merges in {} passes",
        report.merged_count(),
        report.passes
    );

    match engine.results() {
        Some(table) => write_json(output, table.rows()),
        None => Ok(()),
    }
}

fn evaluate(config: &AppConfig, state: &Path, output: Option<&Path>) -> Result<()> {
    let engine = restored_engine(config, state)?;
    let report = engine.evaluator()?.report();

    let metrics = &report.metrics;
    eprintln!(
        "✓ {} records, {} clusters, noise ratio {:.3}",
        metrics.total, metrics.clusters, metrics.noise_ratio
    );
    eprintln!("  silhouette: {}", describe(metrics.silhouette.value()));
    eprintln!(
        "  calinski-harabasz: {}",
        describe(metrics.calinski_harabasz.value())
    );
    eprintln!(
        "  merge candidates: {}",
        report.similarity.candidates.len()
    );
    write_json(output, &report)
}

fn label(
    config: &AppConfig,
    state: &Path,
    endpoint: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let Some(endpoint) = endpoint.or_else(|| config.labeler.endpoint.clone()) else {
        bail!("No labelling endpoint; pass --endpoint or set [labeler] endpoint");
    };
    let mut engine = restored_engine(config, state)?;
    engine.set_reporter(Arc::new(|current: usize, total: usize, message: &str| {
        eprintln!("  [{current}/{total}] {message}");
    }));

    let client = LabelerClient::with_timeout(
        endpoint,
        Duration::from_secs(config.labeler.timeout_secs),
    );
    let labels = engine.label_clusters(&client, config.labeler.seed)?;
    eprintln!("✓ Labelled {} clusters", labels.len());
    write_json(output, &labels)
}

fn describe(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

/// Pretty JSON to `path`, or to stdout without one.
fn write_json<T: Serialize + ?Sized>(path: Option<&Path>, value: &T) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path).context(format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
            eprintln!("✓ Wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, value)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}
