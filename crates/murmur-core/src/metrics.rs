//! Prometheus metrics helpers for the murmur connector.
//!
//! This module provides centralized recorder installation and the metric
//! descriptions used across murmur components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use murmur_core::metrics::init_metrics;
//!
//! let handle = init_metrics()?;
//! // Render the exposition text wherever the host serves it.
//! let text = handle.render();
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: Component name (`ingest_`, `live_`, `historical_`)
//! - Suffix: Unit or type (`_total`, `_unix`)
//! - Labels: Use sparingly to avoid cardinality explosion

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder and describe all murmur metrics.
///
/// Must be called once at startup before any metrics are recorded. Fails if a
/// global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_common_metrics();
    tracing::debug!("Prometheus recorder installed");
    Ok(handle)
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
///
/// Useful for tests or optional metrics.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    init_metrics().ok()
}

/// Register descriptions for the metrics emitted by murmur.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Normalization
    // =========================================================================

    describe_counter!("ingest_items_total", "Raw upstream items seen");
    describe_counter!(
        "ingest_items_malformed_total",
        "Raw items dropped for a missing or unparseable creation time or author"
    );

    // =========================================================================
    // Live reorder buffer
    // =========================================================================

    describe_counter!(
        "live_records_buffered_total",
        "Live records accepted into the reorder buffer"
    );
    describe_counter!(
        "live_records_released_total",
        "Live records released by a window flush"
    );
    describe_counter!(
        "live_records_late_total",
        "Live records dropped for arriving behind the watermark"
    );
    describe_counter!(
        "live_records_overflow_total",
        "Live records dropped because the reorder buffer was full"
    );
    describe_counter!(
        "live_stream_errors_total",
        "Transport errors reported by the live subscription"
    );
    describe_gauge!("live_buffer_depth", "Records currently held in the reorder buffer");
    describe_gauge!("live_watermark_unix", "Current live watermark (unix seconds)");

    // =========================================================================
    // Historical paginator
    // =========================================================================

    describe_counter!("historical_pages_total", "Search pages fetched");
    describe_counter!(
        "historical_fetch_errors_total",
        "Failed search fetch attempts (including timeouts)"
    );
    describe_counter!(
        "historical_records_emitted_total",
        "Records emitted by completed historical reads"
    );

    // =========================================================================
    // Throttled warnings
    // =========================================================================

    describe_counter!(
        "throttled_warnings_emitted_total",
        "Throttled warnings actually logged (label: kind)"
    );
    describe_counter!(
        "throttled_warnings_suppressed_total",
        "Throttled warnings swallowed inside a cooldown window (label: kind)"
    );
}
