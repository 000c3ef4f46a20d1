//! Chunk fetching: download, decompress, and cache one hour of events.
//!
//! # State machine
//!
//! ```text
//! Absent ──download──▶ Compressed ──decompress──▶ Ready
//!                          ▲
//!   (left over from an earlier run)
//! ```
//!
//! - Ready chunks are returned without touching the network.
//! - A leftover compressed artifact is decompressed instead of re-downloaded;
//!   if that fails, the artifact is kept so a later run can retry.
//! - A freshly downloaded artifact that fails to decompress is deleted, so the
//!   next run downloads it again.
//! - The compressed artifact is deleted once decompression succeeds.
//!
//! All copies stream; no chunk is held in memory.

use crate::cache::{ChunkCache, partial_path};
use crate::config::IngestConfig;
use crate::{Error, Result};
use flate2::read::MultiGzDecoder;
use ghpatches_core::TimestampToken;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Source of compressed archive dumps.
///
/// Implementations stream the resource at `url` into `dest` and return the
/// number of bytes written. A non-success response must be an error.
pub trait ArchiveClient: Send + Sync {
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64>;
}

impl<T: ArchiveClient + ?Sized> ArchiveClient for &T {
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        (**self).download(url, dest)
    }
}

/// Blocking HTTP client for the archive.
pub struct HttpArchiveClient {
    client: reqwest::blocking::Client,
}

impl HttpArchiveClient {
    /// Build a client with the configured timeout and user agent.
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl ArchiveClient for HttpArchiveClient {
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        let mut response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(io::copy(&mut response, dest)?)
    }
}

/// What a successful fetch had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The decompressed artifact already existed.
    AlreadyCached,
    /// A leftover compressed artifact was decompressed.
    Decompressed {
        /// Decompressed bytes written.
        bytes: u64,
    },
    /// The chunk was downloaded and decompressed.
    Downloaded {
        /// Compressed bytes received.
        compressed_bytes: u64,
        /// Decompressed bytes written.
        bytes: u64,
    },
}

impl ChunkOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyCached => "cached",
            Self::Decompressed { .. } => "decompressed",
            Self::Downloaded { .. } => "downloaded",
        }
    }
}

/// Makes chunks ready in a [`ChunkCache`], using an [`ArchiveClient`] only
/// when the cache cannot satisfy the request.
pub struct ChunkFetcher<C> {
    cache: ChunkCache,
    client: C,
    config: IngestConfig,
}

impl<C: ArchiveClient> ChunkFetcher<C> {
    /// Create a fetcher for the cache and archive named in `config`.
    pub fn new(config: &IngestConfig, client: C) -> Self {
        Self {
            cache: ChunkCache::new(&config.cache_dir),
            client,
            config: config.clone(),
        }
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Make the chunk for `token` ready.
    pub fn fetch(&self, token: &TimestampToken) -> Result<ChunkOutcome> {
        let json_path = self.cache.decompressed_path(token);
        let gz_path = self.cache.compressed_path(token);

        if self.cache.is_ready(token) {
            debug!("JSON file {} already exists, skipping", json_path.display());
            return Ok(ChunkOutcome::AlreadyCached);
        }

        if self.cache.is_compressed_present(token) {
            info!("Extracting {} to {}", gz_path.display(), json_path.display());
            let bytes = decompress(&gz_path, &json_path)?;
            remove_compressed(&gz_path);
            info!("Extracted to {}", json_path.display());
            return Ok(ChunkOutcome::Decompressed { bytes });
        }

        let url = self.config.archive_url(token);
        info!("Downloading {}", url);
        let compressed_bytes =
            write_via_partial(&gz_path, |writer| self.client.download(&url, writer))?;

        match decompress(&gz_path, &json_path) {
            Ok(bytes) => {
                remove_compressed(&gz_path);
                info!(
                    "Downloaded {} bytes, extracted {} bytes to {}",
                    compressed_bytes,
                    bytes,
                    json_path.display()
                );
                Ok(ChunkOutcome::Downloaded {
                    compressed_bytes,
                    bytes,
                })
            }
            Err(e) => {
                // Fresh download that cannot be decompressed: re-download next time.
                remove_compressed(&gz_path);
                Err(e)
            }
        }
    }
}

/// Stream-decompress `gz_path` into `json_path`.
fn decompress(gz_path: &Path, json_path: &Path) -> Result<u64> {
    let input = File::open(gz_path)?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(input));

    write_via_partial(json_path, |writer| {
        io::copy(&mut decoder, writer).map_err(|source| Error::Decompress {
            path: gz_path.to_path_buf(),
            source,
        })
    })
}

/// Write `dest` through its `.part` sibling, renaming only on success.
fn write_via_partial<F>(dest: &Path, write: F) -> Result<u64>
where
    F: FnOnce(&mut dyn Write) -> Result<u64>,
{
    let part = partial_path(dest);

    let result = File::create(&part).map_err(Error::from).and_then(|file| {
        let mut writer = BufWriter::new(file);
        let written = write(&mut writer)?;
        writer.flush()?;
        Ok(written)
    });

    let result = result.and_then(|written| {
        fs::rename(&part, dest)?;
        Ok(written)
    });

    if result.is_err() {
        remove_partial(&part);
    }
    result
}

fn remove_partial(part: &Path) {
    if let Err(e) = fs::remove_file(part)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!("Failed to remove {}: {}", part.display(), e);
    }
}

fn remove_compressed(gz_path: &Path) {
    if let Err(e) = fs::remove_file(gz_path) {
        warn!("Failed to delete {}: {}", gz_path.display(), e);
    }
}
