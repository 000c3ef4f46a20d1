//! Ingestion configuration.
//!
//! One [`IngestConfig`] value is threaded through the orchestrator, cache and
//! fetcher, so runs with different cache directories can share a process.

use crate::{Error, Result};
use ghpatches_core::{ARCHIVE_HOST, DEFAULT_CACHE_DIR, TimestampToken};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on workers when concurrency is requested without a count.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Configuration for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Cache root holding `{token}.json.gz` and `{token}.json` artifacts.
    /// Default: `.githubCommits`
    pub cache_dir: PathBuf,

    /// Base URL of the archive; chunk URLs are `{base}/{token}.json.gz`.
    /// Default: `https://data.gharchive.org`
    pub archive_base_url: String,

    /// Number of chunks fetched at once. `1` fetches in token order.
    /// Default: 1
    pub concurrency: usize,

    /// Timeout for a whole chunk download, body included.
    /// Default: 10 minutes
    pub request_timeout: Duration,

    /// User-Agent sent to the archive.
    pub user_agent: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            archive_base_url: format!("https://{ARCHIVE_HOST}"),
            concurrency: 1,
            request_timeout: Duration::from_secs(600),
            user_agent: concat!("ghpatches/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl IngestConfig {
    /// Check the values a run depends on.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if !(self.archive_base_url.starts_with("http://")
            || self.archive_base_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "archive URL must be http(s): {}",
                self.archive_base_url
            )));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("cache directory must not be empty".to_string()));
        }
        Ok(())
    }

    /// Upstream URL of the compressed dump for `token`.
    pub fn archive_url(&self, token: &TimestampToken) -> String {
        format!(
            "{}/{}",
            self.archive_base_url.trim_end_matches('/'),
            token.archive_file_name()
        )
    }
}

/// Resolve a worker count from the `concurrent` switch and an optional count.
///
/// An explicit count wins. `concurrent` alone gives [`DEFAULT_MAX_WORKERS`];
/// neither gives sequential processing.
pub fn resolve_concurrency(concurrent: bool, requested: Option<usize>) -> usize {
    match (concurrent, requested) {
        (_, Some(n)) => n.max(1),
        (true, None) => DEFAULT_MAX_WORKERS,
        (false, None) => 1,
    }
}
