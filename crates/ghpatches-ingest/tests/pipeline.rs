//! End-to-end: fetch a range into a cache, then parse the cached chunks.

use flate2::Compression;
use flate2::write::GzEncoder;
use ghpatches_ingest::{
    ArchiveClient, ChunkSource, ChunkSourceConfig, Error, EventSource, IngestConfig,
    IngestionOrchestrator, Result, parse, parse_all,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const BASE_URL: &str = "https://archive.test";

/// Serves gzip bodies from memory and counts requests.
#[derive(Default)]
struct MemoryArchive {
    bodies: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MemoryArchive {
    fn serve(mut self, token: &str, lines: &[String]) -> Self {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(lines.join("\n").as_bytes()).unwrap();
        self.bodies.insert(
            format!("{BASE_URL}/{token}.json.gz"),
            encoder.finish().unwrap(),
        );
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArchiveClient for MemoryArchive {
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.bodies.get(url) {
            Some(body) => {
                dest.write_all(body)?;
                Ok(body.len() as u64)
            }
            None => Err(Error::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn push_event(id: &str, sha: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"PushEvent","actor":{{"login":"dev","avatar_url":"https://avatars.githubusercontent.com/u/1?"}},"repo":{{"name":"acme/widget","url":"https://api.github.com/repos/acme/widget"}},"payload":{{"commits":[{{"sha":"{sha}","message":"docs at https://docs.rs/widget","url":"https://api.github.com/repos/acme/widget/commits/{sha}"}}]}},"public":true,"created_at":"2024-01-02T05:00:00Z"}}"#
    )
}

fn archive() -> MemoryArchive {
    MemoryArchive::default()
        .serve("2024-01-02-4", &[push_event("1", "aaa")])
        .serve("2024-01-02-5", &[push_event("2", "bbb"), push_event("3", "ccc")])
        .serve("2024-01-02-6", &[push_event("4", "ddd")])
}

fn config(tmp: &TempDir, concurrency: usize) -> IngestConfig {
    IngestConfig {
        cache_dir: tmp.path().join("cache"),
        archive_base_url: BASE_URL.to_string(),
        concurrency,
        ..Default::default()
    }
}

// =========================================================================
// Fetching
// =========================================================================

#[test]
fn sequential_run_then_parse() {
    let tmp = TempDir::new().unwrap();
    let archive = archive();
    let orchestrator = IngestionOrchestrator::new(config(&tmp, 1), &archive).unwrap();

    let report = orchestrator.run("2024-01-02-04", "2024-01-02-06").unwrap();
    assert_eq!(report.len(), 3);
    assert_eq!(report.failure_count(), 0);

    let mut ids = Vec::new();
    let stats = ChunkSource::new(ChunkSourceConfig {
        input: tmp.path().join("cache"),
        ..Default::default()
    })
    .process(|event| {
        ids.push(event.event.id.clone());
        assert_eq!(event.domains, vec!["docs.rs"]);
        assert_eq!(event.patch_urls.len(), 1);
        Ok(true)
    })
    .unwrap();

    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(stats.files_processed, 3);
}

#[test]
fn concurrent_run_matches_sequential() {
    let sequential = TempDir::new().unwrap();
    let concurrent = TempDir::new().unwrap();
    let archive = archive();

    IngestionOrchestrator::new(config(&sequential, 1), &archive)
        .unwrap()
        .run("2024-01-02-06", "2024-01-02-04")
        .unwrap();
    let report = IngestionOrchestrator::new(config(&concurrent, 3), &archive)
        .unwrap()
        .run("2024-01-02-06", "2024-01-02-04")
        .unwrap();

    // Descending range: report follows token order, not completion order.
    let tokens: Vec<_> = report.chunks.iter().map(|c| c.token.to_string()).collect();
    assert_eq!(tokens, vec!["2024-01-02-6", "2024-01-02-5", "2024-01-02-4"]);

    for token in ["2024-01-02-4", "2024-01-02-5", "2024-01-02-6"] {
        let name = format!("{token}.json");
        let a = std::fs::read(sequential.path().join("cache").join(&name)).unwrap();
        let b = std::fs::read(concurrent.path().join("cache").join(&name)).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn second_run_makes_no_requests() {
    let tmp = TempDir::new().unwrap();
    let archive = archive();
    let orchestrator = IngestionOrchestrator::new(config(&tmp, 2), &archive).unwrap();

    orchestrator.run("2024-01-02-04", "2024-01-02-06").unwrap();
    assert_eq!(archive.calls(), 3);

    let report = orchestrator.run("2024-01-02-04", "2024-01-02-06").unwrap();
    assert_eq!(archive.calls(), 3);
    assert_eq!(report.count_outcome("cached"), 3);
}

#[test]
fn missing_hour_is_isolated() {
    let tmp = TempDir::new().unwrap();
    let archive = archive();
    let orchestrator = IngestionOrchestrator::new(config(&tmp, 4), &archive).unwrap();

    let report = orchestrator.run("2024-01-02-03", "2024-01-02-06").unwrap();
    assert_eq!(report.len(), 4);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.failed().next().unwrap().token.as_str(), "2024-01-02-3");
    assert_eq!(report.succeeded().count(), 3);

    let cache = tmp.path().join("cache");
    assert!(!cache.join("2024-01-02-3.json").exists());
    assert!(!cache.join("2024-01-02-3.json.gz").exists());
}

#[test]
fn separate_caches_in_one_process() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let archive = archive();

    let a = IngestionOrchestrator::new(config(&first, 1), &archive).unwrap();
    let b = IngestionOrchestrator::new(config(&second, 1), &archive).unwrap();
    a.run("2024-01-02-04", "2024-01-02-04").unwrap();
    b.run("2024-01-02-05", "2024-01-02-05").unwrap();

    assert!(first.path().join("cache/2024-01-02-4.json").exists());
    assert!(!first.path().join("cache/2024-01-02-5.json").exists());
    assert!(second.path().join("cache/2024-01-02-5.json").exists());
    assert!(!second.path().join("cache/2024-01-02-4.json").exists());
}

// =========================================================================
// Parsing
// =========================================================================

#[test]
fn malformed_second_line_is_a_parse_error_for_that_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("2024-01-02-5.json");
    let lines = [
        push_event("1", "aaa"),
        "{\"id\": oops".to_string(),
        push_event("3", "ccc"),
    ];
    std::fs::write(&path, lines.join("\n")).unwrap();

    let err = parse_all(&path).unwrap_err();
    match err {
        Error::Core(ghpatches_core::Error::Parse {
            path: err_path,
            line,
            ..
        }) => {
            assert_eq!(err_path, path);
            assert_eq!(line, 2);
        }
        other => panic!("expected parse error, got {other:?}"),
    }

    // A streaming consumer sees the first event before the error.
    let seen: Vec<_> = parse(&path).unwrap().collect();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].is_ok());
    assert!(seen[1].is_err());
}
