//! Lazy parsing of one decompressed chunk file.

use crate::{Error, Result};
use ghpatches_core::metrics::EVENTS_PARSED_TOTAL;
use ghpatches_core::{DomainFilter, EnrichedEvent, enrich_line};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Iterator over the enriched events of one chunk file.
///
/// Each call to [`parse`] opens the file afresh, so a path can be parsed any
/// number of times. Blank lines are skipped and invalid UTF-8 is replaced
/// with U+FFFD rather than rejected. The first malformed line yields
/// a [`ghpatches_core::Error::Parse`] and ends the stream; events before it
/// have already been yielded.
pub struct EventStream {
    path: PathBuf,
    reader: BufReader<File>,
    buf: Vec<u8>,
    line_no: usize,
    filter: Arc<DomainFilter>,
    done: bool,
}

impl EventStream {
    /// Open `path` for parsing with `filter`.
    pub fn open(path: impl Into<PathBuf>, filter: Arc<DomainFilter>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            buf: Vec::new(),
            line_no: 0,
            filter,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1-based number of the last line read.
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl Iterator for EventStream {
    type Item = Result<EnrichedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::Io(e)));
                }
            }
            self.line_no += 1;

            let line = String::from_utf8_lossy(trim_line_ending(&self.buf));

            if line.trim().is_empty() {
                continue;
            }

            return match enrich_line(&line, &self.filter) {
                Ok(event) => {
                    metrics::counter!(EVENTS_PARSED_TOTAL).increment(1);
                    Some(Ok(event))
                }
                Err(source) => {
                    self.done = true;
                    Some(Err(ghpatches_core::Error::Parse {
                        path: self.path.clone(),
                        line: self.line_no,
                        source,
                    }
                    .into()))
                }
            };
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Lazily parse `path` with the default domain filter.
pub fn parse(path: impl AsRef<Path>) -> Result<EventStream> {
    parse_with(path, Arc::new(DomainFilter::default()))
}

/// Lazily parse `path` with a custom domain filter.
pub fn parse_with(path: impl AsRef<Path>, filter: Arc<DomainFilter>) -> Result<EventStream> {
    EventStream::open(path.as_ref(), filter)
}

/// Parse the whole of `path`, failing if any line is malformed.
pub fn parse_all(path: impl AsRef<Path>) -> Result<Vec<EnrichedEvent>> {
    parse(path)?.collect()
}
