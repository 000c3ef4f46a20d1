//! Fetch a range of hourly GH Archive chunks into the local cache.
//!
//! # Pipeline
//!
//! ```text
//! [from..to] → [hourly tokens] → [download .json.gz] → [decompress .json]
//!                                        ↓                     ↓
//!                                   .part + rename        .part + rename
//! ```
//!
//! # Usage
//!
//! ```bash
//! # The previous hour
//! ghpatches-ingest
//!
//! # One day, eight downloads at a time
//! ghpatches-ingest --from 2024-01-02-00 --to 2024-01-02-23 --concurrency 8
//!
//! # Custom cache directory, with metrics
//! ghpatches-ingest -o ./cache --from 2024-01-02-00 --to 2024-01-02-05 --metrics-port 9091
//!
//! # Only print the upstream URLs
//! ghpatches-ingest --from 2024-01-02-00 --to 2024-01-02-05 --list-urls
//! ```

use anyhow::{Context, Result, bail};
use clap::Parser;
use ghpatches_core::metrics::{init_metrics, start_metrics_server};
use ghpatches_core::timestamp;
use ghpatches_ingest::{IngestConfig, IngestReport, orchestrator, resolve_concurrency};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Download and decompress hourly GH Archive dumps.
#[derive(Parser, Debug)]
#[command(name = "ghpatches-ingest")]
#[command(about = "Fetch hourly GH Archive chunks into a local cache")]
struct Args {
    /// Cache directory for downloaded chunks
    #[arg(short, long, default_value = ghpatches_core::DEFAULT_CACHE_DIR)]
    output_dir: PathBuf,

    /// First hour to fetch, YYYY-MM-DD-HH (omit both bounds for the previous hour)
    #[arg(long, default_value = "")]
    from: String,

    /// Last hour to fetch, YYYY-MM-DD-HH (inclusive)
    #[arg(long, default_value = "")]
    to: String,

    /// Fetch chunks in parallel
    #[arg(long, default_value = "false")]
    concurrent: bool,

    /// Number of parallel fetches (implies --concurrent)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Archive base URL
    #[arg(long, default_value = "https://data.gharchive.org")]
    archive_url: String,

    /// Per-chunk download timeout in seconds
    #[arg(long, default_value = "600")]
    timeout_secs: u64,

    /// Print the upstream URL of every chunk in the range and exit
    #[arg(long, default_value = "false")]
    list_urls: bool,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,
}

impl Args {
    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            cache_dir: self.output_dir.clone(),
            archive_base_url: self.archive_url.clone(),
            concurrency: resolve_concurrency(self.concurrent, self.concurrency),
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    let config = args.ingest_config();

    if args.list_urls {
        return list_urls(&args, &config);
    }

    // Initialize metrics and start server (if enabled)
    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle).await?;
    }

    let start = Instant::now();
    let (from, to) = (args.from.clone(), args.to.clone());
    // The blocking HTTP client must be built and dropped off the async runtime.
    let report = tokio::task::spawn_blocking(move || orchestrator::run(config, &from, &to))
        .await
        .context("ingest task panicked")?
        .context("ingest failed")?;
    let elapsed = start.elapsed();

    print_summary(&args, &report, elapsed);

    if report.failure_count() > 0 {
        bail!("{} of {} chunks failed", report.failure_count(), report.len());
    }

    Ok(())
}

fn list_urls(args: &Args, config: &IngestConfig) -> Result<()> {
    let tokens = match timestamp::generate(&args.from, &args.to) {
        Ok(tokens) => tokens,
        Err(e) if e.is_input_validation() => {
            tracing::error!("{}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for token in &tokens {
        println!("{}", config.archive_url(token));
    }
    Ok(())
}

fn print_summary(args: &Args, report: &IngestReport, elapsed: Duration) {
    println!("\n══════════════════════════════════════════════════════════════════");
    println!("SUMMARY");
    println!("══════════════════════════════════════════════════════════════════\n");

    println!("Cache:       {}", args.output_dir.display());
    println!("Archive:     {}", args.archive_url);
    println!();
    println!("Chunks:            {:>12}", report.len());
    println!("  - Downloaded:      {:>10}", report.count_outcome("downloaded"));
    println!("  - Decompressed:    {:>10}", report.count_outcome("decompressed"));
    println!("  - Already cached:  {:>10}", report.count_outcome("cached"));
    println!("Failed:            {:>12}", report.failure_count());
    for chunk in report.failed() {
        if let Err(e) = &chunk.result {
            println!("  - {}: {}", chunk.token, e);
        }
    }
    println!();
    println!("Elapsed:           {:>10.1}s", elapsed.as_secs_f64());

    info!(
        "Ingest complete: {} chunks, {} failed",
        report.len(),
        report.failure_count()
    );
}
