//! Print enriched events from cached chunks as JSON lines.
//!
//! Reads a chunk file, or every `{token}.json` in a cache directory, and
//! writes one enriched event per line to stdout: the decoded event plus
//! `patch_urls` (one per commit) and `domains` (third-party domains seen on
//! the raw line).
//!
//! # Usage
//!
//! ```bash
//! # Everything in the default cache
//! ghpatches-events
//!
//! # Push events from one chunk
//! ghpatches-events -i .githubCommits/2024-01-02-5.json --push-only
//!
//! # Only patch URLs
//! ghpatches-events --push-only | jq -r '.patch_urls[]'
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use ghpatches_core::EventKind;
use ghpatches_ingest::{ChunkSource, ChunkSourceConfig, EventSource, ParserConfig};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Parse cached GH Archive chunks into enriched events.
#[derive(Parser, Debug)]
#[command(name = "ghpatches-events")]
#[command(about = "Print enriched events from cached chunks as JSON lines")]
struct Args {
    /// Chunk file or cache directory
    #[arg(short, long, default_value = ghpatches_core::DEFAULT_CACHE_DIR)]
    input: PathBuf,

    /// Limit number of files to process
    #[arg(long)]
    limit: Option<usize>,

    /// Only print PushEvents
    #[arg(long, default_value = "false")]
    push_only: bool,

    /// Keep repeated domains within an event
    #[arg(long, default_value = "false")]
    keep_duplicate_domains: bool,

    /// Stop at the first file that fails to parse
    #[arg(long, default_value = "false")]
    fail_fast: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON lines
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut source = ChunkSource::new(ChunkSourceConfig {
        input: args.input.clone(),
        limit: args.limit,
        continue_on_error: !args.fail_fast,
        parser: ParserConfig {
            dedupe_domains: !args.keep_duplicate_domains,
            ..Default::default()
        },
        ..Default::default()
    });

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut printed = 0usize;

    let start = Instant::now();
    let stats = source
        .process(|event| {
            if args.push_only && event.event.kind() != EventKind::Push {
                return Ok(true);
            }
            serde_json::to_writer(&mut out, &event).map_err(ghpatches_core::Error::from)?;
            out.write_all(b"\n")?;
            printed += 1;
            Ok(true)
        })
        .with_context(|| format!("failed to process {}", args.input.display()))?;
    out.flush()?;

    info!(
        "Processed {} files ({} failed), {} events, {} printed in {:.1}s",
        stats.files_processed,
        stats.files_failed,
        stats.events,
        printed,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
