//! Event sources over decompressed chunks.
//!
//! # Available Sources
//!
//! - [`EventStream`] - Lazily parses one chunk file, line by line
//! - [`ChunkSource`] - Drives many chunk files through a handler
//!
//! # Architecture
//!
//! Sources implement the [`EventSource`] trait, which lets consumers process
//! enriched events without caring where the files came from. A malformed line
//! ends the parse of its file; other files are unaffected.

mod chunk;
mod stream;

pub use chunk::{ChunkSource, ChunkSourceConfig};
pub use stream::{EventStream, parse, parse_all, parse_with};

use crate::Result;
use ghpatches_core::{DEFAULT_DOMAIN_BLACKLIST, DomainFilter, EnrichedEvent};

/// A source of enriched archive events.
pub trait EventSource {
    /// Human-readable name for this source (used in logs).
    fn name(&self) -> &'static str;

    /// Process events from this source, calling the handler for each one.
    ///
    /// The handler returns `Ok(true)` to continue, `Ok(false)` to stop
    /// gracefully, or `Err` to abort.
    fn process<F>(&mut self, handler: F) -> Result<SourceStats>
    where
        F: FnMut(EnrichedEvent) -> Result<bool>;
}

/// Statistics from processing an event source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Events decoded and handed to the handler.
    pub events: usize,

    /// Files whose events were all handed to the handler.
    pub files_processed: usize,

    /// Files abandoned because of a malformed line or I/O error.
    pub files_failed: usize,

    /// Bytes of decompressed input covered by the processed files.
    pub bytes_read: u64,
}

/// How raw lines are enriched.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Domains (and their subdomains) dropped from extracted domain lists.
    /// Default: the archive's own hosting domains
    pub blacklist: Vec<String>,

    /// Keep each domain once per event, in first-seen order.
    /// Default: true
    pub dedupe_domains: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            blacklist: DEFAULT_DOMAIN_BLACKLIST
                .iter()
                .map(|d| d.to_string())
                .collect(),
            dedupe_domains: true,
        }
    }
}

impl ParserConfig {
    /// Build the domain filter for this configuration.
    pub fn domain_filter(&self) -> DomainFilter {
        DomainFilter::new(&self.blacklist, self.dedupe_domains)
    }
}
