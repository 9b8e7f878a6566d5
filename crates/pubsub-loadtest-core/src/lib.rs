//! Core types for the Pub/Sub load-test publisher
//!
//! This crate holds everything the publish adapter needs that does not touch
//! the network:
//! - Config: decoding and validating the host's key/value options
//! - Credentials: credential sources and credential document types
//! - Message: outgoing messages and publish outcomes
//! - Execution: per-invocation records
//! - Error: the configuration / connection / publish error taxonomy

pub mod config;
pub mod credentials;
pub mod error;
pub mod execution;
pub mod message;

pub use config::{DeliveryMode, PublishConfig, ResolvedEndpoint};
pub use credentials::{CredentialSource, CredentialType};
pub use error::{
    ConfigError, ConfigResult, ConnectionError, ConnectionResult, PubSubError, PubSubResult,
    PublishError,
};
pub use execution::{InvocationId, InvocationRecord, InvocationStatus};
pub use message::{OutgoingMessage, PublishOutcome};
