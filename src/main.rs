use avatar_resizer::config::{self, AppConfig};
use avatar_resizer::fetch::{Fetcher, HttpFetcher};
use avatar_resizer::jobs::{JobId, JobOrchestrator, JobStatus, JobStore, OrchestratorConfig};
use avatar_resizer::naming::{default_name, sanitize_name};
use avatar_resizer::output::{self, BatchEntry, DirectOutcome};
use avatar_resizer::process;
use avatar_resizer::sink::DirectorySink;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often `batch` checks on outstanding jobs.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "avatar-resizer")]
#[command(about = "Turn image URLs into square avatar thumbnails")]
#[command(long_about = "\
Turn image URLs into square avatar thumbnails

Each image is downloaded, center-cropped to a square, halved with bilinear
filtering while it is at least twice the target size, then resized with a
bicubic filter to the exact size (128x128 by default). Results are written
as PNG with alpha.

Output files are never overwritten: if avatar_1.png exists, avatar_1_1.png
is used, then avatar_1_2.png, and so on.

Modes:
  resize   process URLs concurrently ([jobs] workers at a time) and report
           the time each took
  batch    submit a file of URLs as background jobs to a worker pool

Logging goes to stderr and honors RUST_LOG (e.g. RUST_LOG=avatar_resizer=debug).

Run 'avatar-resizer gen-config' to generate a documented avatar-resizer.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (optional; stock defaults apply when absent)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output directory (overrides [output] dir)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and resize URLs directly, a few at a time
    Resize {
        /// Image URLs
        #[arg(required = true)]
        urls: Vec<String>,
        /// Output name for the URL at the same position (default avatar_<n>)
        #[arg(long = "name")]
        names: Vec<String>,
    },
    /// Submit every URL in FILE (one per line) as a job and collect the results
    Batch {
        /// File with one URL per line; blank lines are skipped
        file: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock avatar-resizer.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let app_config = config::load_config(&cli.config)?;
    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&app_config.output.dir));

    match cli.command {
        Command::Resize { urls, names } => run_resize(&app_config, &output_dir, &urls, &names).await,
        Command::Batch { file, json } => run_batch(&app_config, &output_dir, &file, json).await,
        Command::GenConfig => Ok(()),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `--log-level`.
fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("avatar_resizer={log_level}"))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_resize(
    app_config: &AppConfig,
    output_dir: &Path,
    urls: &[String],
    names: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let size = app_config.thumbnail.thumbnail_size()?;
    let fetcher = Arc::new(HttpFetcher::new(&app_config.fetch)?);
    let sink = Arc::new(DirectorySink::create(output_dir)?);
    // Same bound as the job pool.
    let permits = Arc::new(Semaphore::new(app_config.jobs.workers.max(1)));

    let mut tasks = JoinSet::new();
    for (i, url) in urls.iter().enumerate() {
        let index = i + 1;
        let name = names
            .get(i)
            .and_then(|n| sanitize_name(n))
            .unwrap_or_else(|| default_name(index));
        let url = url.clone();
        let fetcher = Arc::clone(&fetcher);
        let sink = Arc::clone(&sink);
        let permits = Arc::clone(&permits);

        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let started = Instant::now();
            let outcome =
                match process::resize_to_sink(fetcher.as_ref(), &url, size, sink.as_ref(), &name)
                    .await
                {
                    Ok(path) => DirectOutcome::Saved {
                        path,
                        elapsed: started.elapsed(),
                    },
                    Err(e) => DirectOutcome::Failed {
                        error: e.to_string(),
                    },
                };
            (index, url, outcome)
        });
    }

    let mut results = Vec::with_capacity(urls.len());
    while let Some(joined) = tasks.join_next().await {
        results.push(joined?);
    }
    results.sort_by_key(|(index, _, _)| *index);

    let mut failed = 0;
    for (index, url, outcome) in &results {
        if let DirectOutcome::Failed { .. } = outcome {
            failed += 1;
        }
        output::print_direct_result(*index, url, outcome);
    }

    println!();
    println!("{}", output::format_summary(results.len() - failed, failed));
    if failed > 0 {
        return Err(format!("{failed} of {} images failed", results.len()).into());
    }
    Ok(())
}

async fn run_batch(
    app_config: &AppConfig,
    output_dir: &Path,
    file: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&app_config.fetch)?);
    let sink = DirectorySink::create(output_dir)?;
    let orchestrator = JobOrchestrator::start(
        OrchestratorConfig::from_app_config(app_config)?,
        fetcher,
        Arc::new(JobStore::new()),
    );

    let mut submitted: Vec<(usize, String, JobId)> = Vec::with_capacity(urls.len());
    for (i, url) in urls.into_iter().enumerate() {
        let id = orchestrator.submit(url.clone())?;
        submitted.push((i + 1, url, id));
    }
    info!(
        jobs = submitted.len(),
        workers = orchestrator.worker_count(),
        "batch submitted"
    );

    let mut entries = Vec::with_capacity(submitted.len());
    for (index, url, id) in submitted {
        orchestrator.wait_for(id, POLL_INTERVAL).await;
        let Some(job) = orchestrator.store().get(id) else {
            continue;
        };

        let mut entry = BatchEntry {
            index,
            url,
            job_id: id,
            status: job.status,
            saved_to: None,
            error: job.error.clone(),
            processing_ms: job
                .processing_time()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        };
        if job.status == JobStatus::Completed {
            match orchestrator.write_result(id, &sink, &default_name(index)) {
                Ok(path) => entry.saved_to = Some(path),
                Err(e) => entry.error = Some(e.to_string()),
            }
        }
        entries.push(entry);
    }

    let outcome = orchestrator
        .shutdown(app_config.jobs.shutdown_timeout())
        .await;

    if json {
        println!("{}", output::batch_report_json(&entries)?);
    } else {
        output::print_batch_report(&entries);
        println!("{}", output::format_shutdown(outcome));
    }

    let failed = entries.iter().filter(|e| !e.is_saved()).count();
    if failed > 0 {
        return Err(format!("{failed} of {} jobs failed", entries.len()).into());
    }
    Ok(())
}
