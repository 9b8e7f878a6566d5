//! Publish configuration
//!
//! The host hands the adapter an untyped key/value bag. It is decoded into
//! [`PublishConfig`]: unknown keys are ignored, missing keys take their
//! empty/false defaults, and empty strings count as absent. A type mismatch on
//! a recognized key is a [`ConfigError::Decode`].

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::credentials::CredentialSource;
use crate::error::{ConfigError, ConfigResult};

/// Public Pub/Sub REST endpoint
pub const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";

/// Environment variable naming a local emulator (`host:port`)
pub const EMULATOR_HOST_ENV: &str = "PUBSUB_EMULATOR_HOST";

/// Per-request timeout when `timeout_secs` is not set
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How the adapter treats the broker acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Wait for the broker to acknowledge and return the message id
    #[default]
    Confirm,
    /// Hand the send to a background task and return immediately.
    /// At-most-once: the outcome is only logged.
    FireAndForget,
}

/// Typed form of the configuration bag passed to `publish`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Project that owns the topic
    #[serde(deserialize_with = "empty_as_none")]
    pub project_id: Option<String>,
    /// Path to a credentials file
    #[serde(deserialize_with = "empty_as_none")]
    pub credential_file: Option<String>,
    /// Inline credentials document
    #[serde(deserialize_with = "secret_empty_as_none")]
    pub credential_json: Option<SecretString>,
    /// Base URL (or `host:port`) of the Pub/Sub API
    #[serde(deserialize_with = "empty_as_none")]
    pub endpoint: Option<String>,
    /// Turn off publish telemetry recording for this call
    #[serde(deserialize_with = "null_as_default")]
    pub disable_telemetry: bool,
    /// Talk to the endpoint without credentials
    #[serde(deserialize_with = "null_as_default")]
    pub no_authentication: bool,
    /// Acknowledgment handling
    #[serde(deserialize_with = "null_as_default")]
    pub delivery: DeliveryMode,
    /// Per-request HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Attributes attached to every published message
    #[serde(deserialize_with = "null_as_default")]
    pub attributes: HashMap<String, String>,
    /// Ordering key attached to every published message
    #[serde(deserialize_with = "empty_as_none")]
    pub ordering_key: Option<String>,
}

/// Base URL plus whether credentials should be skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub base_url: Url,
    pub anonymous: bool,
}

impl PublishConfig {
    /// Decode from the host's key/value map
    pub fn from_map(map: &Map<String, Value>) -> ConfigResult<Self> {
        serde_json::from_value(Value::Object(map.clone())).map_err(ConfigError::Decode)
    }

    /// Decode from an arbitrary JSON value; `null` yields the defaults
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        match value {
            Value::Object(map) => {
                serde_json::from_value(Value::Object(map)).map_err(ConfigError::Decode)
            }
            Value::Null => Ok(Self::default()),
            Value::Bool(_) => Err(ConfigError::NotAnObject("boolean")),
            Value::Number(_) => Err(ConfigError::NotAnObject("number")),
            Value::String(_) => Err(ConfigError::NotAnObject("string")),
            Value::Array(_) => Err(ConfigError::NotAnObject("array")),
        }
    }

    /// Check the invariants the client relies on
    pub fn validate(&self) -> ConfigResult<()> {
        if self.project_id.is_none() {
            return Err(ConfigError::MissingField("project_id"));
        }

        if self.no_authentication && self.has_explicit_credentials() {
            return Err(ConfigError::ConflictingOptions(
                "no_authentication cannot be combined with credential_file or credential_json"
                    .to_string(),
            ));
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if let Some(endpoint) = &self.endpoint {
            parse_endpoint(endpoint, self.no_authentication)?;
        }

        Ok(())
    }

    pub fn project_id(&self) -> ConfigResult<&str> {
        self.project_id
            .as_deref()
            .ok_or(ConfigError::MissingField("project_id"))
    }

    pub fn has_explicit_credentials(&self) -> bool {
        self.credential_file.is_some() || self.credential_json.is_some()
    }

    /// Credential options in application order: file first, then JSON
    pub fn credential_sources(&self) -> Vec<CredentialSource> {
        let mut sources = Vec::new();
        if let Some(path) = &self.credential_file {
            sources.push(CredentialSource::File(PathBuf::from(path)));
        }
        if let Some(json) = &self.credential_json {
            sources.push(CredentialSource::Json(json.clone()));
        }
        sources
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Pick the API base URL.
    ///
    /// An explicit `endpoint` wins. Otherwise a non-empty emulator host
    /// selects plain HTTP without credentials. Otherwise the public endpoint.
    pub fn resolve_endpoint(&self, emulator_host: Option<&str>) -> ConfigResult<ResolvedEndpoint> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(ResolvedEndpoint {
                base_url: parse_endpoint(endpoint, self.no_authentication)?,
                anonymous: self.no_authentication,
            });
        }

        if let Some(host) = emulator_host.map(str::trim).filter(|h| !h.is_empty()) {
            return Ok(ResolvedEndpoint {
                base_url: parse_endpoint(host, true)?,
                anonymous: true,
            });
        }

        let base_url = Url::parse(DEFAULT_ENDPOINT).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reason: e.to_string(),
        })?;

        Ok(ResolvedEndpoint {
            base_url,
            anonymous: self.no_authentication,
        })
    }
}

/// Parse a full URL or a bare `host:port`.
/// Bare hosts get `http://` when plaintext is requested, `https://` otherwise.
fn parse_endpoint(raw: &str, plaintext: bool) -> ConfigResult<Url> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else if plaintext {
        format!("http://{}", raw)
    } else {
        format!("https://{}", raw)
    };

    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason,
    };

    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn secret_empty_as_none<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(empty_as_none(deserializer)?.map(SecretString::new))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
