//! Credential sources
//!
//! A [`CredentialSource`] says where authentication material comes from.
//! [`CredentialType`] names the kind of credential document so it can be
//! handed to the matching builder; the document itself is never interpreted
//! here. Secrets stay wrapped in [`SecretString`].

use secrecy::SecretString;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use crate::error::{ConnectionError, ConnectionResult};

/// Where credentials are loaded from, in the order they were applied
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Load credentials from a file on disk
    File(PathBuf),
    /// Load credentials from an inline JSON document
    Json(SecretString),
}

impl CredentialSource {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSource::File(_) => "file",
            CredentialSource::Json(_) => "json",
        }
    }
}

/// The `type` of a credential document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialType {
    /// Service account key
    ServiceAccount,
    /// `gcloud auth application-default login` output
    AuthorizedUser,
    /// Workload or workforce identity federation
    ExternalAccount,
    /// Service account impersonation on top of source credentials
    ImpersonatedServiceAccount,
}

impl CredentialType {
    /// Read the `type` field of a parsed credential document
    pub fn from_value(value: &Value) -> ConnectionResult<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectionError::InvalidCredentials("missing 'type' field".to_string()))?;

        match kind {
            "service_account" => Ok(CredentialType::ServiceAccount),
            "authorized_user" => Ok(CredentialType::AuthorizedUser),
            "external_account" => Ok(CredentialType::ExternalAccount),
            "impersonated_service_account" => Ok(CredentialType::ImpersonatedServiceAccount),
            other => Err(ConnectionError::UnsupportedCredentialType(other.to_string())),
        }
    }

    /// Parse a credential document and read its `type`
    pub fn from_json(raw: &str) -> ConnectionResult<(Self, Value)> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ConnectionError::InvalidCredentials(e.to_string()))?;
        let kind = Self::from_value(&value)?;
        Ok((kind, value))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::ServiceAccount => "service_account",
            CredentialType::AuthorizedUser => "authorized_user",
            CredentialType::ExternalAccount => "external_account",
            CredentialType::ImpersonatedServiceAccount => "impersonated_service_account",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_types() {
        let cases = [
            ("service_account", CredentialType::ServiceAccount),
            ("authorized_user", CredentialType::AuthorizedUser),
            ("external_account", CredentialType::ExternalAccount),
            ("impersonated_service_account", CredentialType::ImpersonatedServiceAccount),
        ];

        for (name, expected) in cases {
            let (kind, value) = CredentialType::from_json(&json!({"type": name}).to_string()).unwrap();
            assert_eq!(kind, expected);
            assert_eq!(kind.as_str(), name);
            assert_eq!(value["type"], name);
        }
    }

    #[test]
    fn test_workload_identity_document() {
        let raw = json!({
            "type": "external_account",
            "audience": "//iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/pool/providers/github",
            "subject_token_type": "urn:ietf:params:oauth:token-type:jwt",
            "token_url": "https://sts.googleapis.com/v1/token",
            "credential_source": {"file": "/var/run/secrets/token"}
        })
        .to_string();

        let (kind, _) = CredentialType::from_json(&raw).unwrap();
        assert_eq!(kind, CredentialType::ExternalAccount);
    }

    #[test]
    fn test_unsupported_type() {
        let err = CredentialType::from_json(r#"{"type": "api_key_file"}"#).unwrap_err();
        assert!(matches!(err, ConnectionError::UnsupportedCredentialType(t) if t == "api_key_file"));
    }

    #[test]
    fn test_missing_type() {
        let err = CredentialType::from_json(r#"{"client_email": "a@b"}"#).unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidCredentials(_)));
    }

    #[test]
    fn test_not_json() {
        let err = CredentialType::from_json("not json").unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidCredentials(_)));
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let source = CredentialSource::Json(SecretString::new("{\"secret\":1}".to_string()));
        let rendered = format!("{:?}", source);
        assert!(!rendered.contains("secret\":1"));
        assert_eq!(source.kind(), "json");
    }
}
