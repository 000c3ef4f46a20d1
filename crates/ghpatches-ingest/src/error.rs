//! Error types for the ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// Range validation or event decoding error.
    #[error(transparent)]
    Core(#[from] ghpatches_core::Error),

    /// Upstream answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The compressed artifact could not be decompressed.
    #[error("decompression of {} failed: {source}", path.display())]
    Decompress {
        /// The compressed artifact.
        path: PathBuf,
        /// The underlying I/O error from the decoder or writer.
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl Error {
    /// True for malformed or partial timestamp ranges.
    pub fn is_input_validation(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_input_validation())
    }

    /// True for failures that leave a compressed artifact worth retrying.
    pub fn is_decompress(&self) -> bool {
        matches!(self, Self::Decompress { .. })
    }
}
