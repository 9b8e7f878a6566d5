//! Publisher adapter for the Pub/Sub load-test module
//!
//! This crate provides the runtime side of the module:
//! - Credentials: credential documents and application defaults via `google-cloud-auth`
//! - Client: a per-call Pub/Sub REST client and its construction options
//! - Topic: the `topics.publish` call
//! - Telemetry: publish counters, latency and invocation records
//! - Module: the publish operation exposed to the load-test host
//!
//! The adapter holds no connection state between calls. Each publish builds
//! a client, sends one message and drops the client. Fire-and-forget sends
//! are tracked by the module until drained.

pub mod client;
pub mod credentials;
pub mod module;
pub mod telemetry;
pub mod topic;

// Re-export the adapter surface for convenience
pub use client::{ClientOptions, PubSubClient};
pub use credentials::DefaultCredentials;
pub use module::{PubSubModule, MODULE_NAME};
pub use telemetry::{PublishMetrics, PublishTelemetry, TelemetryRecorder};
pub use topic::Topic;

pub use pubsub_loadtest_core::{
    DeliveryMode, OutgoingMessage, PubSubError, PubSubResult, PublishConfig, PublishOutcome,
};
