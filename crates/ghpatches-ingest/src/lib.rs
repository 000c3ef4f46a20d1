//! GH Archive ingestion pipeline components.
//!
//! This crate fetches hourly event dumps from the archive into a local cache
//! and turns cached chunks into enriched events.
//!
//! # Modules
//!
//! - [`orchestrator`] - Runs a timestamp range through the fetcher, sequentially or on a worker pool
//! - [`fetch`] - Downloads and decompresses one chunk
//! - [`cache`] - On-disk layout of cached chunks
//! - [`source`] - Parses cached chunks into enriched events
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ TimestampRange   │  "2024-01-02-00" .. "2024-01-02-23" → hourly tokens
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Orchestrator    │  One fetch per token, N workers
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  ChunkFetcher    │  HTTP → {token}.json.gz → {token}.json
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  ChunkSource     │  Lines → EnrichedEvent (patch URLs, domains)
//! └──────────────────┘
//! ```
//!
//! The cache is the hand-off point: fetching and parsing can run in separate
//! processes, and a chunk whose decompressed file exists is never fetched again.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod source;

pub use error::{Error, Result};

pub use cache::ChunkCache;
pub use config::{DEFAULT_MAX_WORKERS, IngestConfig, resolve_concurrency};
pub use fetch::{ArchiveClient, ChunkFetcher, ChunkOutcome, HttpArchiveClient};
pub use orchestrator::{ChunkReport, IngestReport, IngestionOrchestrator};
pub use source::{
    ChunkSource, ChunkSourceConfig, EventSource, EventStream, ParserConfig, SourceStats, parse,
    parse_all, parse_with,
};
