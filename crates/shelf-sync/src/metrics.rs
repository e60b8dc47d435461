//! Prometheus metrics for sync operations
//!
//! Exposed in Prometheus text format through [`SyncMetrics::gather`]; the
//! embedding application decides how to serve it.

use crate::status::Operation;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Sync metrics collector
#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,

    pub operations_total: IntCounterVec,
    pub operation_duration_seconds: HistogramVec,
    pub retries_total: IntCounter,
    pub local_writes_total: IntCounter,
}

impl SyncMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new("shelf_sync_operations_total", "Sync operations by kind and outcome"),
            &["operation", "outcome"],
        )?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new("shelf_sync_duration_seconds", "Push and pull round-trip duration")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0]),
            &["operation"],
        )?;

        let retries_total = IntCounter::new("shelf_sync_retries_total", "Push retries")?;

        let local_writes_total =
            IntCounter::new("shelf_local_writes_total", "Snapshots persisted locally")?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;
        registry.register(Box::new(local_writes_total.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            operation_duration_seconds,
            retries_total,
            local_writes_total,
        })
    }

    /// Record a finished (or skipped) operation
    pub fn record(&self, op: Operation, outcome: &str, elapsed: Duration) {
        self.operations_total
            .with_label_values(&[op.as_str(), outcome])
            .inc();
        if outcome != "skipped" {
            self.operation_duration_seconds
                .with_label_values(&[op.as_str()])
                .observe(elapsed.as_secs_f64());
        }
    }

    /// Export metrics in Prometheus text format
    pub fn gather(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
