//! Pub/Sub REST client
//!
//! [`ClientOptions`] collects construction options in the order they are
//! applied, the same way the official client libraries take a list of
//! options. [`PubSubClient::connect`] turns them into a client whose
//! credentials have already produced a first set of request headers.

use google_cloud_auth::credentials::Credentials;
use pubsub_loadtest_core::config::{PublishConfig, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
use pubsub_loadtest_core::credentials::CredentialSource;
use pubsub_loadtest_core::error::{ConfigResult, ConnectionError, ConnectionResult};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::credentials::{self, DefaultCredentials};
use crate::topic::Topic;

const USER_AGENT: &str = concat!("pubsub-loadtest/", env!("CARGO_PKG_VERSION"));

/// Options applied when constructing a client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    credential_sources: Vec<CredentialSource>,
    credentials: Option<Credentials>,
    endpoint: Option<Url>,
    anonymous: bool,
    timeout: Duration,
    default_credentials: DefaultCredentials,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            credential_sources: Vec::new(),
            credentials: None,
            endpoint: None,
            anonymous: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_credentials: DefaultCredentials::Application,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a validated configuration
    pub fn from_config(config: &PublishConfig, emulator_host: Option<&str>) -> ConfigResult<Self> {
        let resolved = config.resolve_endpoint(emulator_host)?;

        let mut options = Self::new()
            .with_endpoint(resolved.base_url)
            .with_timeout(config.timeout());

        if resolved.anonymous {
            options = options.without_authentication();
        } else {
            for source in config.credential_sources() {
                options = options.with_credential_source(source);
            }
        }

        Ok(options)
    }

    pub fn with_credentials_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_credential_source(CredentialSource::File(path.into()))
    }

    pub fn with_credentials_json(self, json: impl Into<String>) -> Self {
        self.with_credential_source(CredentialSource::Json(SecretString::new(json.into())))
    }

    pub fn with_credential_source(mut self, source: CredentialSource) -> Self {
        self.credential_sources.push(source);
        self
    }

    /// Use already built credentials instead of any credential option
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Send requests without credentials
    pub fn without_authentication(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_credentials(mut self, defaults: DefaultCredentials) -> Self {
        self.default_credentials = defaults;
        self
    }

    /// Credential options in the order they were applied
    pub fn credential_sources(&self) -> &[CredentialSource] {
        &self.credential_sources
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    async fn resolve_credentials(&self) -> ConnectionResult<Credentials> {
        if let Some(credentials) = &self.credentials {
            return Ok(credentials.clone());
        }

        match self.credential_sources.last() {
            Some(source) => {
                if self.credential_sources.len() > 1 {
                    warn!(
                        applied = self.credential_sources.len(),
                        effective = source.kind(),
                        "Multiple credential options applied; the last one takes effect"
                    );
                }
                credentials::from_source(source).await
            }
            None => self.default_credentials.resolve(),
        }
    }
}

/// A connected Pub/Sub client scoped to one project
#[derive(Debug)]
pub struct PubSubClient {
    project_id: String,
    base_url: Url,
    http: reqwest::Client,
    credentials: Option<Credentials>,
}

impl PubSubClient {
    /// Build the HTTP client and resolve credentials, fetching the first
    /// access token up front.
    ///
    /// Credential precedence: explicit credentials, then the last credential
    /// option applied, then the default credentials.
    #[instrument(skip(options), fields(anonymous = options.anonymous))]
    pub async fn connect(project_id: &str, options: ClientOptions) -> ConnectionResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        let base_url = match &options.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => Url::parse(DEFAULT_ENDPOINT)
                .map_err(|e| ConnectionError::Transport(e.to_string()))?,
        };

        let credentials = if options.anonymous {
            debug!(endpoint = %base_url, "Connecting without authentication");
            None
        } else {
            let credentials = options.resolve_credentials().await?;
            credentials::request_headers(&credentials).await?;
            Some(credentials)
        };

        debug!(project_id = %project_id, endpoint = %base_url, "Pub/Sub client connected");

        Ok(Self {
            project_id: project_id.to_string(),
            base_url,
            http,
            credentials,
        })
    }

    /// Handle to a topic in this client's project. The name is not checked.
    pub fn topic(&self, name: &str) -> Topic<'_> {
        Topic::new(self, name)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_anonymous(&self) -> bool {
        self.credentials.is_none()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Authentication headers for the next request; empty when anonymous
    pub(crate) async fn auth_headers(&self) -> ConnectionResult<Vec<(String, String)>> {
        match &self.credentials {
            Some(credentials) => credentials::request_headers(credentials).await,
            None => Ok(Vec::new()),
        }
    }

    /// Release the client
    pub fn close(self) {
        debug!(project_id = %self.project_id, "Pub/Sub client closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_cloud_auth::credentials::api_key_credentials;
    use serde_json::json;

    fn config(value: serde_json::Value) -> PublishConfig {
        PublishConfig::from_value(value).unwrap()
    }

    fn api_key() -> Credentials {
        api_key_credentials::Builder::new("test-api-key".to_string()).build()
    }

    #[test]
    fn test_options_from_config_keeps_credential_order() {
        let options = ClientOptions::from_config(
            &config(json!({
                "project_id": "proj-1",
                "credential_file": "/etc/creds.json",
                "credential_json": "{}",
                "timeout_secs": 3
            })),
            None,
        )
        .unwrap();

        let kinds: Vec<_> = options.credential_sources().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec!["file", "json"]);
        assert_eq!(options.timeout(), Duration::from_secs(3));
        assert!(!options.is_anonymous());
        assert_eq!(
            options.endpoint().map(Url::as_str),
            Some("https://pubsub.googleapis.com/")
        );
    }

    #[test]
    fn test_options_from_config_emulator() {
        let options = ClientOptions::from_config(
            &config(json!({"project_id": "proj-1", "credential_json": "{}"})),
            Some("localhost:8085"),
        )
        .unwrap();

        assert!(options.is_anonymous());
        assert!(options.credential_sources().is_empty());
        assert_eq!(options.endpoint().map(Url::as_str), Some("http://localhost:8085/"));
    }

    #[tokio::test]
    async fn test_connect_anonymous() {
        let options = ClientOptions::new()
            .with_endpoint(Url::parse("http://localhost:8085").unwrap())
            .without_authentication();

        let client = PubSubClient::connect("proj-1", options).await.unwrap();
        assert!(client.is_anonymous());
        assert_eq!(client.base_url().as_str(), "http://localhost:8085/");
        assert!(client.auth_headers().await.unwrap().is_empty());
        client.close();
    }

    #[tokio::test]
    async fn test_connect_with_explicit_credentials() {
        let options = ClientOptions::new()
            .with_credentials(api_key())
            .with_default_credentials(DefaultCredentials::Unavailable);

        let client = PubSubClient::connect("proj-1", options).await.unwrap();
        assert!(!client.is_anonymous());
        assert_eq!(client.base_url().as_str(), "https://pubsub.googleapis.com/");

        let headers = client.auth_headers().await.unwrap();
        assert!(headers.iter().any(|(_, value)| value == "test-api-key"));
    }

    #[tokio::test]
    async fn test_connect_falls_back_to_default_credentials() {
        let options =
            ClientOptions::new().with_default_credentials(DefaultCredentials::Fixed(api_key()));

        let client = PubSubClient::connect("proj-1", options).await.unwrap();
        assert!(!client.is_anonymous());
    }

    #[tokio::test]
    async fn test_connect_without_any_credentials_fails() {
        let options = ClientOptions::new().with_default_credentials(DefaultCredentials::Unavailable);
        let err = PubSubClient::connect("proj-1", options).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NoDefaultCredentials(_)));
    }

    #[tokio::test]
    async fn test_connect_json_takes_precedence_over_file() {
        // The file does not exist; it is never read because JSON was applied last
        let options = ClientOptions::new()
            .with_credentials_file("/nonexistent/creds.json")
            .with_credentials_json(r#"{"type": "api_key_file"}"#)
            .with_default_credentials(DefaultCredentials::Unavailable);

        let err = PubSubClient::connect("proj-1", options).await.unwrap_err();
        assert!(matches!(err, ConnectionError::UnsupportedCredentialType(_)));
    }
}
