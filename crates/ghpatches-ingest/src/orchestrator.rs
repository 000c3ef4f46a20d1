//! Fetches every chunk in a timestamp range into the cache.
//!
//! With `concurrency == 1` chunks are fetched one after another in token
//! order. Otherwise a fixed pool of scoped worker threads pulls tokens from a
//! channel. In both modes a failed chunk is logged and recorded in the
//! [`IngestReport`]; it never stops the remaining chunks.

use crate::Result;
use crate::config::IngestConfig;
use crate::fetch::{ArchiveClient, ChunkFetcher, ChunkOutcome, HttpArchiveClient};
use crossbeam_channel::unbounded;
use ghpatches_core::TimestampToken;
use ghpatches_core::metrics::{
    CHUNKS_FAILED_TOTAL, CHUNKS_FETCHED_TOTAL, INGEST_RUNNING, record_bytes,
};
use ghpatches_core::timestamp;
use std::thread;
use tracing::{error, info};

/// Result of fetching one chunk.
#[derive(Debug)]
pub struct ChunkReport {
    pub token: TimestampToken,
    pub result: Result<ChunkOutcome>,
}

/// Per-token results of a run, in token order.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub chunks: Vec<ChunkReport>,
}

impl IngestReport {
    /// Chunks that ended up ready in the cache.
    pub fn succeeded(&self) -> impl Iterator<Item = &ChunkReport> {
        self.chunks.iter().filter(|c| c.result.is_ok())
    }

    /// Chunks whose fetch or decompression failed.
    pub fn failed(&self) -> impl Iterator<Item = &ChunkReport> {
        self.chunks.iter().filter(|c| c.result.is_err())
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// Number of chunks with the given outcome label.
    pub fn count_outcome(&self, label: &str) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(&c.result, Ok(outcome) if outcome.label() == label))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// Drives a [`ChunkFetcher`] over a timestamp range.
pub struct IngestionOrchestrator<C> {
    config: IngestConfig,
    fetcher: ChunkFetcher<C>,
}

impl IngestionOrchestrator<HttpArchiveClient> {
    /// Orchestrator backed by the real archive over HTTP.
    pub fn from_config(config: IngestConfig) -> Result<Self> {
        let client = HttpArchiveClient::new(&config)?;
        Self::new(config, client)
    }
}

impl<C: ArchiveClient> IngestionOrchestrator<C> {
    /// Create an orchestrator using `client` for downloads.
    pub fn new(config: IngestConfig, client: C) -> Result<Self> {
        config.validate()?;
        let fetcher = ChunkFetcher::new(&config, client);
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &ChunkFetcher<C> {
        &self.fetcher
    }

    /// Fetch every hour from `from` to `to` (inclusive) into the cache.
    ///
    /// A malformed or partial range is returned as an input-validation error
    /// before any filesystem or network activity; callers treat it as empty
    /// work. Per-chunk failures are reported in the [`IngestReport`].
    pub fn run(&self, from: &str, to: &str) -> Result<IngestReport> {
        let tokens = timestamp::generate(from, to)?;
        if tokens.is_empty() {
            info!("No chunks to fetch");
            return Ok(IngestReport::default());
        }

        self.fetcher.cache().ensure_root()?;
        Ok(self.run_tokens(tokens))
    }

    /// Fetch the given tokens. The cache root must already exist.
    pub fn run_tokens(&self, tokens: Vec<TimestampToken>) -> IngestReport {
        let workers = self.config.concurrency.min(tokens.len()).max(1);
        info!(
            "Fetching {} chunks into {} with {} worker(s)",
            tokens.len(),
            self.config.cache_dir.display(),
            workers
        );

        metrics::gauge!(INGEST_RUNNING).set(1.0);
        let chunks = if workers == 1 {
            tokens
                .into_iter()
                .map(|token| {
                    let result = self.fetch_one(&token);
                    ChunkReport { token, result }
                })
                .collect()
        } else {
            self.run_pool(tokens, workers)
        };
        metrics::gauge!(INGEST_RUNNING).set(0.0);

        IngestReport { chunks }
    }

    fn run_pool(&self, tokens: Vec<TimestampToken>, workers: usize) -> Vec<ChunkReport> {
        let total = tokens.len();
        let (job_tx, job_rx) = unbounded::<(usize, TimestampToken)>();
        let (done_tx, done_rx) = unbounded::<(usize, ChunkReport)>();

        for job in tokens.into_iter().enumerate() {
            // Receiver is alive until the scope below ends.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move || {
                    for (index, token) in job_rx {
                        let result = self.fetch_one(&token);
                        if done_tx.send((index, ChunkReport { token, result })).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(done_tx);

        let mut done: Vec<_> = done_rx.into_iter().collect();
        debug_assert_eq!(done.len(), total);
        done.sort_by_key(|(index, _)| *index);
        done.into_iter().map(|(_, report)| report).collect()
    }

    fn fetch_one(&self, token: &TimestampToken) -> Result<ChunkOutcome> {
        match self.fetcher.fetch(token) {
            Ok(outcome) => {
                metrics::counter!(CHUNKS_FETCHED_TOTAL, "outcome" => outcome.label()).increment(1);
                match outcome {
                    ChunkOutcome::AlreadyCached => {}
                    ChunkOutcome::Decompressed { bytes } => record_bytes("decompressed", bytes),
                    ChunkOutcome::Downloaded {
                        compressed_bytes,
                        bytes,
                    } => {
                        record_bytes("compressed", compressed_bytes);
                        record_bytes("decompressed", bytes);
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                metrics::counter!(CHUNKS_FAILED_TOTAL).increment(1);
                error!("Chunk {} failed: {}", token, e);
                Err(e)
            }
        }
    }
}

/// Convenience wrapper: fetch a range with the real HTTP client.
///
/// Input-validation errors (partial or malformed ranges) are logged and give
/// an empty report.
pub fn run(config: IngestConfig, from: &str, to: &str) -> Result<IngestReport> {
    let orchestrator = IngestionOrchestrator::from_config(config)?;
    match orchestrator.run(from, to) {
        Err(e) if e.is_input_validation() => {
            error!("{}", e);
            Ok(IngestReport::default())
        }
        other => other,
    }
}
