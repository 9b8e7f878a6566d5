//! Credentials for the Pub/Sub client
//!
//! Credential documents are handed to the `google-cloud-auth` builder for
//! their type. The library owns token exchange, caching and refresh; this
//! module only picks the builder and turns the library's request headers
//! into plain name/value pairs.

use google_cloud_auth::credentials::{self, CacheableResource, Credentials};
use pubsub_loadtest_core::credentials::{CredentialSource, CredentialType};
use pubsub_loadtest_core::error::{ConnectionError, ConnectionResult};
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

/// What to use when no credential option was applied
#[derive(Debug, Clone, Default)]
pub enum DefaultCredentials {
    /// Application default credentials: `GOOGLE_APPLICATION_CREDENTIALS`,
    /// the gcloud well-known file, then the metadata server
    #[default]
    Application,
    /// Credentials supplied by the embedding host
    Fixed(Credentials),
    /// No ambient identity; connecting without a credential option fails
    Unavailable,
}

impl DefaultCredentials {
    pub fn resolve(&self) -> ConnectionResult<Credentials> {
        match self {
            DefaultCredentials::Application => credentials::Builder::default()
                .build()
                .map_err(|e| ConnectionError::NoDefaultCredentials(e.to_string())),
            DefaultCredentials::Fixed(credentials) => Ok(credentials.clone()),
            DefaultCredentials::Unavailable => Err(ConnectionError::NoDefaultCredentials(
                "default credential lookup is disabled".to_string(),
            )),
        }
    }
}

/// Build credentials from a file or inline JSON document
#[instrument(skip(source), fields(source = source.kind()))]
pub async fn from_source(source: &CredentialSource) -> ConnectionResult<Credentials> {
    match source {
        CredentialSource::File(path) => {
            let raw = tokio::fs::read_to_string(path).await.map_err(|source| {
                ConnectionError::CredentialsFile {
                    path: path.clone(),
                    source,
                }
            })?;
            from_json(&raw)
        }
        CredentialSource::Json(json) => from_json(json.expose_secret()),
    }
}

/// Build credentials from a JSON credential document
pub fn from_json(raw: &str) -> ConnectionResult<Credentials> {
    let (kind, document) = CredentialType::from_json(raw)?;
    debug!(credential_type = %kind, "Building credentials");

    let built = match kind {
        CredentialType::ServiceAccount => credentials::service_account::Builder::new(document).build(),
        CredentialType::AuthorizedUser => credentials::user_account::Builder::new(document).build(),
        CredentialType::ExternalAccount => credentials::external_account::Builder::new(document).build(),
        CredentialType::ImpersonatedServiceAccount => {
            credentials::impersonated::Builder::new(document).build()
        }
    };

    built.map_err(|e| ConnectionError::InvalidCredentials(format!("{}: {}", kind, e)))
}

/// Request headers carrying the current access token
pub async fn request_headers(credentials: &Credentials) -> ConnectionResult<Vec<(String, String)>> {
    let headers = match credentials
        .headers(Default::default())
        .await
        .map_err(|e| ConnectionError::AccessToken(e.to_string()))?
    {
        CacheableResource::New { data, .. } => data,
        CacheableResource::NotModified => {
            return Err(ConnectionError::AccessToken(
                "credentials returned no headers".to_string(),
            ));
        }
    };

    headers
        .iter()
        .map(|(name, value)| {
            value
                .to_str()
                .map(|value| (name.as_str().to_string(), value.to_string()))
                .map_err(|e| ConnectionError::AccessToken(format!("header {}: {}", name, e)))
        })
        .collect()
}
