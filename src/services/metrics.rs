//! Prometheus counters for playlist sync

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

lazy_static! {
    /// Refresh attempts by outcome (`success` / `failure`)
    pub static ref REFRESH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "playlist_refresh_total",
        "Playlist refresh attempts by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Network fetches issued by the sync layer
    pub static ref FETCH_TOTAL: IntCounter =
        register_int_counter!("playlist_fetch_total", "Playlist and guide fetches issued").unwrap();

    /// Reads answered from a fresh stored snapshot
    pub static ref CACHE_HITS_TOTAL: IntCounter =
        register_int_counter!("playlist_cache_hits_total", "Reads served without a refresh").unwrap();
}

pub fn record_refresh(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    REFRESH_TOTAL.with_label_values(&[outcome]).inc();
}

/// Render the default registry in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8_lossy(&buffer).into_owned()
}
