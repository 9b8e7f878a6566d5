//! Invocation records
//!
//! Every call to the publish operation produces one [`InvocationRecord`]:
//!
//! ```text
//! begin ──► Acknowledged   (broker returned a message id)
//!       ├─► Enqueued       (fire-and-forget hand-off)
//!       └─► Failed         (config, connection or publish error)
//! ```
//!
//! Records are what the telemetry recorder aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::DeliveryMode;
use crate::message::PublishOutcome;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a single publish invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Ulid);

impl InvocationId {
    /// Generate a new unique InvocationId.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse an InvocationId from its string representation.
    pub fn from_string(s: &str) -> Result<Self, String> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| format!("Invalid InvocationId: {}", e))
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Terminal status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    /// Still running
    Pending,
    Acknowledged,
    Enqueued,
    Failed,
}

/// One publish call, from decode to return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub id: InvocationId,
    pub project_id: String,
    pub topic: String,
    pub delivery: DeliveryMode,
    pub payload_bytes: usize,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub status: InvocationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl InvocationRecord {
    /// Start a record for a publish that is about to run.
    pub fn begin(
        project_id: impl Into<String>,
        topic: impl Into<String>,
        delivery: DeliveryMode,
        payload_bytes: usize,
    ) -> Self {
        Self {
            id: InvocationId::new(),
            project_id: project_id.into(),
            topic: topic.into(),
            delivery,
            payload_bytes,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            status: InvocationStatus::Pending,
            message_id: None,
            failure_reason: None,
        }
    }

    /// Close the record with the outcome returned to the caller.
    pub fn complete(&mut self, outcome: &PublishOutcome) {
        self.finish(match outcome {
            PublishOutcome::Acknowledged { .. } => InvocationStatus::Acknowledged,
            PublishOutcome::Enqueued => InvocationStatus::Enqueued,
        });
        self.message_id = outcome.message_id().map(str::to_string);
    }

    /// Close the record as failed.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.finish(InvocationStatus::Failed);
        self.failure_reason = Some(reason.into());
    }

    pub fn is_finished(&self) -> bool {
        self.status != InvocationStatus::Pending
    }

    fn finish(&mut self, status: InvocationStatus) {
        let ended_at = Utc::now();
        let duration = ended_at - self.started_at;
        self.ended_at = Some(ended_at);
        self.duration_ms = Some(duration.num_milliseconds().max(0) as u64);
        self.status = status;
    }
}

// ============================================================================
// Tests
// ============================================================================
