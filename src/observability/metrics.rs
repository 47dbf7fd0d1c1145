//! OpenTelemetry metrics implementation.
//!
//! Key metrics:
//! - payloadq_enqueued_total: Counter for accepted payloads
//! - payloadq_rejected_total: Counter for inserts refused at capacity
//! - payloadq_removed_total: Counter for rows removed by range acknowledgement
//! - payloadq_skipped_total: Counter for rows that failed to decode on read
//! - payloadq_depth: Gauge for the cached row count

use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::path::Path;
use std::sync::OnceLock;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Payload queue metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Total number of accepted payloads.
    pub enqueued_total: Counter<u64>,
    /// Total number of inserts rejected because the queue was full.
    pub rejected_total: Counter<u64>,
    /// Total number of rows removed after delivery.
    pub removed_total: Counter<u64>,
    /// Total number of rows skipped because they could not be decoded.
    pub skipped_total: Counter<u64>,
    /// Cached number of queued rows.
    pub depth: Gauge<i64>,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter) -> Self {
        Self {
            enqueued_total: meter
                .u64_counter("payloadq_enqueued_total")
                .with_description("Total number of payloads accepted into the queue")
                .with_unit("1")
                .init(),
            rejected_total: meter
                .u64_counter("payloadq_rejected_total")
                .with_description("Inserts rejected because the queue was at capacity")
                .with_unit("1")
                .init(),
            removed_total: meter
                .u64_counter("payloadq_removed_total")
                .with_description("Rows removed by range acknowledgement")
                .with_unit("1")
                .init(),
            skipped_total: meter
                .u64_counter("payloadq_skipped_total")
                .with_description("Rows skipped on read because they failed to decode")
                .with_unit("1")
                .init(),
            depth: meter
                .i64_gauge("payloadq_depth")
                .with_description("Number of payloads currently queued")
                .with_unit("1")
                .init(),
        }
    }
}

/// Initialize metrics on a caller-supplied meter.
///
/// Use this when the embedding application owns the meter provider and its
/// readers or exporters. The global provider is left untouched. Only the
/// first initialization (through either entry point) takes effect.
pub fn init_metrics_with_meter(meter: &Meter) {
    METRICS.get_or_init(|| Metrics::new(meter));
}

/// Initialize the metrics system with a local manual reader.
///
/// Installs a global meter provider only if metrics were not already
/// initialized through [`init_metrics_with_meter`].
/// Subsequent calls are ignored.
pub fn init_metrics() {
    METRICS.get_or_init(|| {
        let reader = ManualReader::builder().build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        global::set_meter_provider(provider);

        let meter = global::meter("payloadq");
        Metrics::new(&meter)
    });
}

/// Get the global metrics instance, if initialized.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

fn queue_attrs(db_path: &Path) -> [KeyValue; 1] {
    [KeyValue::new("queue", db_path.display().to_string())]
}

/// Record an accepted payload and the resulting depth.
pub fn record_enqueue(db_path: &Path, depth: u64) {
    if let Some(m) = METRICS.get() {
        let attrs = queue_attrs(db_path);
        m.enqueued_total.add(1, &attrs);
        m.depth.record(depth as i64, &attrs);
    }
}

/// Record an insert refused at capacity.
pub fn record_rejection(db_path: &Path) {
    if let Some(m) = METRICS.get() {
        m.rejected_total.add(1, &queue_attrs(db_path));
    }
}

/// Record a range removal and the resulting depth.
pub fn record_removal(db_path: &Path, removed: usize, depth: u64) {
    if let Some(m) = METRICS.get() {
        let attrs = queue_attrs(db_path);
        m.removed_total.add(removed as u64, &attrs);
        m.depth.record(depth as i64, &attrs);
    }
}

/// Record rows skipped because they could not be decoded.
pub fn record_skipped(db_path: &Path, skipped: usize) {
    if let Some(m) = METRICS.get() {
        m.skipped_total.add(skipped as u64, &queue_attrs(db_path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        // First init should work
        init_metrics();
        // Second init should not panic
        init_metrics();
        // Metrics should be available
        assert!(metrics().is_some());
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        init_metrics();
        let path = Path::new("/tmp/metrics-test.db");
        record_enqueue(path, 1);
        record_rejection(path);
        record_removal(path, 1, 0);
        record_skipped(path, 2);
    }
}
