//! Publish telemetry
//!
//! Aggregates invocation records into counters and latency figures for the
//! load test, and buffers the records themselves until they are flushed to
//! the log. Turning telemetry off for a call (`disable_telemetry`) skips the
//! recorder entirely; structured logging is unaffected.

use async_trait::async_trait;
use pubsub_loadtest_core::execution::{InvocationRecord, InvocationStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Records are flushed automatically once this many are buffered
pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;

/// Aggregated publish metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishMetrics {
    /// Invocations recorded
    pub attempts: u64,
    /// Invocations acknowledged by the broker
    pub acknowledged: u64,
    /// Fire-and-forget hand-offs
    pub enqueued: u64,
    /// Invocations that returned an error
    pub failed: u64,
    /// Bytes of payload across all invocations
    pub payload_bytes: u64,
    /// Sum of invocation durations (ms)
    pub total_latency_ms: u64,
    /// Slowest invocation (ms)
    pub max_latency_ms: u64,
}

impl PublishMetrics {
    /// Average invocation duration (ms)
    pub fn avg_latency_ms(&self) -> u64 {
        if self.attempts == 0 {
            0
        } else {
            self.total_latency_ms / self.attempts
        }
    }

    /// Share of attempts that did not fail (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            (self.attempts - self.failed) as f64 / self.attempts as f64
        }
    }

    fn observe(&mut self, record: &InvocationRecord) {
        self.attempts += 1;
        self.payload_bytes += record.payload_bytes as u64;

        match record.status {
            InvocationStatus::Acknowledged => self.acknowledged += 1,
            InvocationStatus::Enqueued => self.enqueued += 1,
            InvocationStatus::Failed => self.failed += 1,
            InvocationStatus::Pending => {}
        }

        let latency = record.duration_ms.unwrap_or(0);
        self.total_latency_ms += latency;
        self.max_latency_ms = self.max_latency_ms.max(latency);
    }
}

/// Sink for finished invocation records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryRecorder: Send + Sync {
    /// Record one finished invocation
    async fn record(&self, record: InvocationRecord);
}

/// In-process telemetry recorder
pub struct PublishTelemetry {
    /// Service name attached to flushed records
    service_name: String,
    metrics: Arc<tokio::sync::RwLock<PublishMetrics>>,
    buffer: Arc<tokio::sync::RwLock<Vec<InvocationRecord>>>,
    flush_threshold: usize,
    enabled: bool,
}

impl PublishTelemetry {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            metrics: Arc::new(tokio::sync::RwLock::new(PublishMetrics::default())),
            buffer: Arc::new(tokio::sync::RwLock::new(Vec::new())),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            enabled: true,
        }
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold.max(1);
        self
    }

    /// Enable or disable recording
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot of the aggregated metrics
    pub async fn metrics(&self) -> PublishMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn pending_records(&self) -> usize {
        self.buffer.read().await.len()
    }

    /// Write buffered records to the log and return them
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Vec<InvocationRecord> {
        let records: Vec<InvocationRecord> = {
            let mut buffer = self.buffer.write().await;
            std::mem::take(&mut *buffer)
        };

        if records.is_empty() {
            return records;
        }

        for record in &records {
            info!(
                service = %self.service_name,
                invocation_id = %record.id,
                topic = %record.topic,
                status = ?record.status,
                duration_ms = record.duration_ms,
                message_id = record.message_id.as_deref(),
                failure_reason = record.failure_reason.as_deref(),
                "Publish invocation"
            );
        }

        debug!(record_count = records.len(), "Flushed publish records");
        records
    }

    /// Log the aggregated metrics
    pub async fn report(&self) -> PublishMetrics {
        let metrics = self.metrics().await;
        info!(
            service = %self.service_name,
            attempts = metrics.attempts,
            acknowledged = metrics.acknowledged,
            enqueued = metrics.enqueued,
            failed = metrics.failed,
            avg_latency_ms = metrics.avg_latency_ms(),
            max_latency_ms = metrics.max_latency_ms,
            "Publish metrics"
        );
        metrics
    }
}

impl Default for PublishTelemetry {
    fn default() -> Self {
        Self::new("pubsub-loadtest")
    }
}

#[async_trait]
impl TelemetryRecorder for PublishTelemetry {
    #[instrument(skip(self, record), fields(invocation_id = %record.id))]
    async fn record(&self, record: InvocationRecord) {
        if !self.enabled {
            return;
        }

        self.metrics.write().await.observe(&record);

        let pending = {
            let mut buffer = self.buffer.write().await;
            buffer.push(record);
            buffer.len()
        };

        if pending >= self.flush_threshold {
            self.flush().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubsub_loadtest_core::config::DeliveryMode;
    use pubsub_loadtest_core::message::PublishOutcome;

    fn acknowledged() -> InvocationRecord {
        let mut record = InvocationRecord::begin("proj-1", "orders", DeliveryMode::Confirm, 5);
        record.complete(&PublishOutcome::Acknowledged {
            message_id: "1".to_string(),
        });
        record
    }

    fn failed() -> InvocationRecord {
        let mut record = InvocationRecord::begin("proj-1", "orders", DeliveryMode::Confirm, 5);
        record.fail("publish: rejected");
        record
    }

    #[tokio::test]
    async fn test_telemetry_creation() {
        let telemetry = PublishTelemetry::new("test-service");
        assert!(telemetry.is_enabled());
        assert_eq!(telemetry.pending_records().await, 0);
        assert_eq!(telemetry.metrics().await, PublishMetrics::default());
    }

    #[tokio::test]
    async fn test_record_updates_metrics() {
        let telemetry = PublishTelemetry::default();

        telemetry.record(acknowledged()).await;
        telemetry.record(acknowledged()).await;
        telemetry.record(failed()).await;

        let metrics = telemetry.metrics().await;
        assert_eq!(metrics.attempts, 3);
        assert_eq!(metrics.acknowledged, 2);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.payload_bytes, 15);
        assert!((metrics.success_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(telemetry.pending_records().await, 3);
    }

    #[tokio::test]
    async fn test_flush_drains_buffer() {
        let telemetry = PublishTelemetry::default();
        telemetry.record(acknowledged()).await;

        let flushed = telemetry.flush().await;
        assert_eq!(flushed.len(), 1);
        assert_eq!(telemetry.pending_records().await, 0);

        // Metrics survive a flush
        assert_eq!(telemetry.metrics().await.attempts, 1);
    }

    #[tokio::test]
    async fn test_auto_flush_at_threshold() {
        let telemetry = PublishTelemetry::default().with_flush_threshold(2);

        telemetry.record(acknowledged()).await;
        assert_eq!(telemetry.pending_records().await, 1);

        telemetry.record(acknowledged()).await;
        assert_eq!(telemetry.pending_records().await, 0);
    }

    #[tokio::test]
    async fn test_disabled_telemetry() {
        let telemetry = PublishTelemetry::default().with_enabled(false);
        telemetry.record(acknowledged()).await;

        // Nothing is recorded when disabled
        assert_eq!(telemetry.pending_records().await, 0);
        assert_eq!(telemetry.metrics().await.attempts, 0);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = PublishMetrics::default();
        assert_eq!(metrics.avg_latency_ms(), 0);
        assert_eq!(metrics.success_rate(), 0.0);
    }
}
