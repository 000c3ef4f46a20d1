//! Error types for the GH Archive patch pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building ranges or decoding events.
#[derive(Error, Debug)]
pub enum Error {
    /// One or both range bounds are not in `YYYY-MM-DD-HH` form.
    #[error("invalid timestamp range (from {from:?}, to {to:?}): use the format '2006-01-02-15'")]
    TimestampFormat {
        /// The `from` bound as supplied.
        from: String,
        /// The `to` bound as supplied.
        to: String,
    },

    /// `from` is a valid timestamp but `to` is not.
    #[error("timestamp range starting at {from:?} has no valid end")]
    TimeOverflow {
        /// The valid `from` bound.
        from: String,
    },

    /// A chunk line could not be decoded as an event.
    #[error("parse error in {} at line {line}: {source}", path.display())]
    Parse {
        /// The chunk file being parsed.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for malformed or partial timestamp ranges.
    ///
    /// These are recoverable: the caller should treat them as "nothing to do".
    pub fn is_input_validation(&self) -> bool {
        matches!(self, Self::TimestampFormat { .. } | Self::TimeOverflow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Error Display formatting tests
    // =========================================================================

    #[test]
    fn test_timestamp_format_display() {
        let err = Error::TimestampFormat {
            from: "yesterday".to_string(),
            to: "2024-01-01-00".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("yesterday"));
        assert!(msg.contains("2006-01-02-15"));
    }

    #[test]
    fn test_time_overflow_display() {
        let err = Error::TimeOverflow {
            from: "2024-01-01-05".to_string(),
        };
        assert!(err.to_string().contains("2024-01-01-05"));
    }

    #[test]
    fn test_parse_display_names_file_and_line() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = Error::Parse {
            path: PathBuf::from("/cache/2024-01-01-5.json"),
            line: 2,
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-01-01-5.json"));
        assert!(msg.contains("line 2"));
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn test_is_input_validation() {
        assert!(
            Error::TimestampFormat {
                from: String::new(),
                to: String::new()
            }
            .is_input_validation()
        );
        assert!(
            Error::TimeOverflow {
                from: String::new()
            }
            .is_input_validation()
        );

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!Error::from(io_err).is_input_validation());
    }

    // =========================================================================
    // Error From conversions
    // =========================================================================

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not valid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().contains("JSON error"));
    }
}
