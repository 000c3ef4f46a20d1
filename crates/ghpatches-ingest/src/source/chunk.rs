//! Multi-file source over decompressed chunks.
//!
//! Reads a single chunk file or every ready chunk in a cache directory and
//! passes enriched events to a handler. A file that fails to parse is logged,
//! counted, and skipped unless `continue_on_error` is off. A handler error
//! always stops processing.

use super::{EventSource, ParserConfig, SourceStats, parse_with};
use crate::cache::ChunkCache;
use crate::{Error, Result};
use ghpatches_core::metrics::PARSE_FAILURES_TOTAL;
use ghpatches_core::{DomainFilter, EnrichedEvent};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for the chunk source.
#[derive(Debug, Clone)]
pub struct ChunkSourceConfig {
    /// Chunk file, or cache directory holding `{token}.json` files.
    pub input: PathBuf,

    /// Limit number of files to process.
    pub limit: Option<usize>,

    /// Skip files that fail to parse instead of aborting.
    pub continue_on_error: bool,

    /// Progress reporting interval (events).
    pub progress_interval: usize,

    /// Enrichment settings.
    pub parser: ParserConfig,
}

impl Default for ChunkSourceConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            limit: None,
            continue_on_error: true,
            progress_interval: 100_000,
            parser: ParserConfig::default(),
        }
    }
}

/// Chunk file event source.
pub struct ChunkSource {
    config: ChunkSourceConfig,
    filter: Arc<DomainFilter>,
}

impl ChunkSource {
    pub fn new(config: ChunkSourceConfig) -> Self {
        let filter = Arc::new(config.parser.domain_filter());
        Self { config, filter }
    }

    pub fn config(&self) -> &ChunkSourceConfig {
        &self.config
    }

    /// Files to process, in name order.
    pub fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let input = &self.config.input;

        let mut files = if input.is_file() {
            vec![input.clone()]
        } else if input.is_dir() {
            ChunkCache::new(input).ready_chunks()?
        } else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Input path does not exist: {}", input.display()),
            )));
        };

        if let Some(limit) = self.config.limit {
            files.truncate(limit);
        }

        Ok(files)
    }

    /// Feed one file's events to `handler`. Returns `Ok(false)` if the handler
    /// asked to stop.
    fn process_file<F>(
        &self,
        path: &Path,
        handler: &mut F,
        stats: &mut SourceStats,
    ) -> std::result::Result<bool, FileError>
    where
        F: FnMut(EnrichedEvent) -> Result<bool>,
    {
        let stream = parse_with(path, Arc::clone(&self.filter)).map_err(FileError::Read)?;
        for event in stream {
            let event = event.map_err(FileError::Read)?;
            stats.events += 1;

            if !handler(event).map_err(FileError::Handler)? {
                tracing::info!("Handler signaled stop");
                return Ok(false);
            }

            if stats.events.is_multiple_of(self.config.progress_interval.max(1)) {
                tracing::info!(
                    "Progress: {} events from {} files",
                    stats.events,
                    stats.files_processed
                );
            }
        }

        Ok(true)
    }
}

impl EventSource for ChunkSource {
    fn name(&self) -> &'static str {
        "chunks"
    }

    fn process<F>(&mut self, mut handler: F) -> Result<SourceStats>
    where
        F: FnMut(EnrichedEvent) -> Result<bool>,
    {
        let mut stats = SourceStats::default();

        let files = self.collect_files()?;
        tracing::info!("Found {} chunk files to process", files.len());

        for (file_idx, path) in files.iter().enumerate() {
            tracing::debug!(
                "[{}/{}] Processing: {}",
                file_idx + 1,
                files.len(),
                path.display()
            );

            match self.process_file(path, &mut handler, &mut stats) {
                Ok(keep_going) => {
                    stats.files_processed += 1;
                    stats.bytes_read += fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                    if !keep_going {
                        break;
                    }
                }
                Err(FileError::Handler(e)) => {
                    tracing::warn!("Handler failed on {}: {}", path.display(), e);
                    return Err(e);
                }
                Err(FileError::Read(e)) => {
                    metrics::counter!(PARSE_FAILURES_TOTAL).increment(1);
                    stats.files_failed += 1;
                    tracing::warn!("Error processing {}: {}", path.display(), e);
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                }
            }
        }

        Ok(stats)
    }
}

/// Why a file stopped early.
enum FileError {
    /// The file could not be opened, read or parsed.
    Read(Error),
    /// The handler returned an error.
    Handler(Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event_line(id: &str) -> String {
        format!(
            r#"{{"id":"{id}","type":"PushEvent","payload":{{"commits":[{{"sha":"{id}","url":"https://api.github.com/repos/o/r/commits/{id}"}}]}},"created_at":"2024-01-02T05:00:00Z"}}"#
        )
    }

    fn write(dir: &Path, name: &str, lines: &[String]) {
        fs::write(dir.join(name), lines.join("\n")).unwrap();
    }

    fn source(input: &Path) -> ChunkSource {
        ChunkSource::new(ChunkSourceConfig {
            input: input.to_path_buf(),
            ..Default::default()
        })
    }

    #[test]
    fn test_processes_directory_in_name_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "2024-01-02-6.json", &[event_line("c")]);
        write(tmp.path(), "2024-01-02-5.json", &[event_line("a"), event_line("b")]);
        fs::write(tmp.path().join("2024-01-02-7.json.gz"), b"ignored").unwrap();

        let mut ids = Vec::new();
        let stats = source(tmp.path())
            .process(|event| {
                ids.push(event.event.id);
                Ok(true)
            })
            .unwrap();

        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(stats.events, 3);
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_failed, 0);
    }

    #[test]
    fn test_bad_file_does_not_stop_others() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "2024-01-02-5.json",
            &[event_line("a"), "{broken".to_string(), event_line("b")],
        );
        write(tmp.path(), "2024-01-02-6.json", &[event_line("c")]);

        let mut ids = Vec::new();
        let stats = source(tmp.path())
            .process(|event| {
                ids.push(event.event.id);
                Ok(true)
            })
            .unwrap();

        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.files_failed, 1);
    }

    #[test]
    fn test_handler_error_aborts_without_counting_parse_failure() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "2024-01-02-5.json", &[event_line("a")]);
        write(tmp.path(), "2024-01-02-6.json", &[event_line("b")]);
        write(tmp.path(), "2024-01-02-7.json", &[event_line("c")]);

        let mut calls = 0;
        let mut source = source(tmp.path());
        let result = source.process(|_| {
            calls += 1;
            Err(Error::Config("stdout closed".to_string()))
        });

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_fail_fast() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "2024-01-02-5.json", &["{broken".to_string()]);
        write(tmp.path(), "2024-01-02-6.json", &[event_line("c")]);

        let mut source = ChunkSource::new(ChunkSourceConfig {
            input: tmp.path().to_path_buf(),
            continue_on_error: false,
            ..Default::default()
        });
        let result = source.process(|_| Ok(true));
        assert!(matches!(
            result,
            Err(Error::Core(ghpatches_core::Error::Parse { line: 1, .. }))
        ));
    }

    #[test]
    fn test_handler_can_stop() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "2024-01-02-5.json",
            &[event_line("a"), event_line("b")],
        );

        let mut seen = 0;
        let stats = source(tmp.path())
            .process(|_| {
                seen += 1;
                Ok(false)
            })
            .unwrap();

        assert_eq!(seen, 1);
        assert_eq!(stats.events, 1);
    }

    #[test]
    fn test_single_file_and_limit() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "2024-01-02-5.json", &[event_line("a")]);
        write(tmp.path(), "2024-01-02-6.json", &[event_line("b")]);

        let single = source(&tmp.path().join("2024-01-02-6.json"));
        assert_eq!(
            single.collect_files().unwrap(),
            vec![tmp.path().join("2024-01-02-6.json")]
        );

        let limited = ChunkSource::new(ChunkSourceConfig {
            input: tmp.path().to_path_buf(),
            limit: Some(1),
            ..Default::default()
        });
        assert_eq!(
            limited.collect_files().unwrap(),
            vec![tmp.path().join("2024-01-02-5.json")]
        );
    }

    #[test]
    fn test_missing_input() {
        let tmp = TempDir::new().unwrap();
        assert!(source(&tmp.path().join("nope")).collect_files().is_err());
    }
}
