//! Prometheus metrics helpers for the patch pipeline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ghpatches_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9091, handle).await.unwrap();
//!
//!     metrics::counter!(ghpatches_core::metrics::CHUNKS_FAILED_TOTAL).increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: pipeline stage (`chunks_`, `events_`, `parse_`)
//! - Suffix: unit or type (`_total`, `_bytes`)
//! - Labels: `outcome` on fetches, `type` on byte counters

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Chunks that reached the ready state (label: `outcome`).
pub const CHUNKS_FETCHED_TOTAL: &str = "chunks_fetched_total";
/// Chunks whose fetch or decompression failed.
pub const CHUNKS_FAILED_TOTAL: &str = "chunks_failed_total";
/// Bytes written to the cache (label: `type` = `compressed` | `decompressed`).
pub const CHUNK_BYTES_TOTAL: &str = "chunk_bytes_total";
/// Events decoded and enriched.
pub const EVENTS_PARSED_TOTAL: &str = "events_parsed_total";
/// Chunk files abandoned because of a malformed line.
pub const PARSE_FAILURES_TOTAL: &str = "parse_failures_total";
/// 1 while an ingestion run is in progress.
pub const INGEST_RUNNING: &str = "ingest_running";

/// Initialize the Prometheus metrics recorder.
///
/// Must be called once at startup before any metrics are recorded.
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_metrics();
    Some(handle)
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves `/metrics` on the given port from a background task and returns
/// once the listener is bound.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(())
}

/// Register descriptions for the pipeline metrics.
fn register_metrics() {
    describe_counter!(
        CHUNKS_FETCHED_TOTAL,
        "Chunks made ready in the cache (label: outcome)"
    );
    describe_counter!(
        CHUNKS_FAILED_TOTAL,
        "Chunks whose download or decompression failed"
    );
    describe_counter!(
        CHUNK_BYTES_TOTAL,
        "Bytes written to the chunk cache (label: type)"
    );
    describe_counter!(EVENTS_PARSED_TOTAL, "Events decoded and enriched");
    describe_counter!(
        PARSE_FAILURES_TOTAL,
        "Chunk files abandoned because of a malformed line"
    );
    describe_gauge!(
        INGEST_RUNNING,
        "Whether an ingestion run is in progress (1=yes, 0=no)"
    );
}

/// Add to a byte counter with a `type` label.
pub fn record_bytes(byte_type: &'static str, bytes: u64) {
    metrics::counter!(CHUNK_BYTES_TOTAL, "type" => byte_type).increment(bytes);
}
