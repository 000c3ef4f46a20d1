//! Core types, enrichment, and shared utilities for the GH Archive patch pipeline.
//!
//! This crate provides:
//! - Hourly timestamp tokens and range generation for the archive feed
//! - The event model decoded from archive lines, plus patch-URL and domain enrichment
//! - Prometheus metrics helpers
//! - Shared error types

pub mod domains;
mod error;
pub mod event;
pub mod metrics;
pub mod timestamp;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Host serving the hourly gzip-compressed event dumps.
pub const ARCHIVE_HOST: &str = "data.gharchive.org";

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".githubCommits";

/// Hosting domains that appear in every archive line as an artifact of URL
/// fields. They carry no signal and are removed from extracted domain lists.
pub const DEFAULT_DOMAIN_BLACKLIST: &[&str] = &[
    "github.dev",
    "github.com",
    "githubusercontent.com",
    "gravatar.com",
    "akamai.net",
];

pub use domains::{DomainFilter, extract_domains};
pub use error::{Error, Result};
pub use event::{
    Actor, Author, Commit, EnrichedEvent, EventKind, Org, Payload, RawEvent, Repo, enrich_line,
    make_patch_url,
};
pub use timestamp::{TimestampToken, generate, generate_at};
