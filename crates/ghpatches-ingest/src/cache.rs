//! On-disk chunk cache.
//!
//! # Layout
//!
//! ```text
//! {root}/{token}.json.gz        compressed, transient
//! {root}/{token}.json           decompressed, durable
//! {root}/{token}.json*.part     in-flight writes, renamed into place when complete
//! ```
//!
//! A chunk is ready when its decompressed file exists; contents are not
//! verified. Because every artifact is written under a `.part` name first, an
//! existing final file is always a complete one.

use crate::Result;
use ghpatches_core::TimestampToken;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix for artifacts that are still being written.
const PARTIAL_SUFFIX: &str = ".part";

/// Maps timestamp tokens to cached artifacts under one root directory.
#[derive(Debug, Clone)]
pub struct ChunkCache {
    root: PathBuf,
}

impl ChunkCache {
    /// Create a cache rooted at `root`. The directory is not touched.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a cache and make sure its root directory exists.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let cache = Self::new(root);
        cache.ensure_root()?;
        Ok(cache)
    }

    /// Create the root directory, including parents, if it is missing.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{token}.json.gz`
    pub fn compressed_path(&self, token: &TimestampToken) -> PathBuf {
        self.root.join(token.archive_file_name())
    }

    /// The compressed path without its `.gz` suffix.
    pub fn decompressed_path(&self, token: &TimestampToken) -> PathBuf {
        self.compressed_path(token).with_extension("")
    }

    /// The chunk's decompressed artifact exists.
    pub fn is_ready(&self, token: &TimestampToken) -> bool {
        self.decompressed_path(token).is_file()
    }

    /// The chunk's compressed artifact exists, so a download can be skipped.
    pub fn is_compressed_present(&self, token: &TimestampToken) -> bool {
        self.compressed_path(token).is_file()
    }

    /// Decompressed chunk files in the cache root, sorted by file name.
    ///
    /// Names sort lexically, not chronologically (`-10` sorts before `-2`).
    pub fn ready_chunks(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<_> = fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();

        files.sort();
        Ok(files)
    }
}

/// Name under which `path` is written before being renamed into place.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
