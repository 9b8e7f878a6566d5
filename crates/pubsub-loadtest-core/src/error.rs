//! Error taxonomy for the publish adapter
//!
//! Every failure is returned to the caller. Configuration problems, client
//! construction problems and publish problems each have their own enum so a
//! load-test script can tell "my options are wrong" apart from "the broker
//! said no".

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding or validating a publish configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to decode configuration: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Configuration must be a key/value map, got {0}")]
    NotAnObject(&'static str),
    #[error("Missing required configuration key: {0}")]
    MissingField(&'static str),
    #[error("Conflicting configuration options: {0}")]
    ConflictingOptions(String),
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Errors raised while constructing a client (credentials and tokens)
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to read credentials file {path}: {source}")]
    CredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Unsupported credential type: {0}")]
    UnsupportedCredentialType(String),
    #[error("Could not find default credentials: {0}")]
    NoDefaultCredentials(String),
    #[error("Failed to obtain access token: {0}")]
    AccessToken(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors raised by the publish call itself
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Publish rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Publish transport error: {0}")]
    Transport(String),
    #[error("Publish response contained no message id")]
    EmptyResponse,
}

/// Top-level error returned by the publish operation
#[derive(Error, Debug)]
pub enum PubSubError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl PubSubError {
    /// Short label for the failure class, used in logs and invocation records
    pub fn kind(&self) -> &'static str {
        match self {
            PubSubError::Config(_) => "config",
            PubSubError::Connection(_) => "connection",
            PubSubError::Publish(_) => "publish",
        }
    }
}

/// Result type for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for client construction
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Result type for the publish operation
pub type PubSubResult<T> = Result<T, PubSubError>;
