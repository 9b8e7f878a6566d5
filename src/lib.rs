//! Shared helpers for the end-to-end publish tests
//!
//! The fixture key under `tests/fixtures` is a throwaway RSA key generated
//! for these tests only.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// PEM-encoded private key matching [`service_account_json`]
pub const SERVICE_ACCOUNT_KEY_PEM: &str = include_str!("../tests/fixtures/service_account_key.pem");

/// Access token handed out by [`token_response`] when the credentials
/// exchange at the fixture token endpoint
pub const TEST_ACCESS_TOKEN: &str = "ya29.integration-test-token";

/// A service-account key document whose token exchange goes to `token_uri`
pub fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "proj-1",
        "private_key_id": "integration-key",
        "private_key": SERVICE_ACCOUNT_KEY_PEM,
        "client_email": "loadtest@proj-1.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri
    })
    .to_string()
}

/// Body of a successful OAuth2 token response
pub fn token_response() -> Value {
    json!({
        "access_token": TEST_ACCESS_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer"
    })
}

/// Turn a JSON object literal into the options bag the module accepts
pub fn options(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("options must be a JSON object, got {}", other),
    }
}

/// A message as the broker received it, with the payload decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub ordering_key: Option<String>,
}

impl PublishedMessage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

#[derive(Deserialize)]
struct RawRequest {
    messages: Vec<RawMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    data: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    ordering_key: Option<String>,
}

/// Decode the messages in a `topics.publish` request body
pub fn decode_publish_request(body: &[u8]) -> Vec<PublishedMessage> {
    let request: RawRequest =
        serde_json::from_slice(body).expect("publish request is not valid JSON");

    request
        .messages
        .into_iter()
        .map(|raw| PublishedMessage {
            data: STANDARD.decode(raw.data).expect("message data is not base64"),
            attributes: raw.attributes,
            ordering_key: raw.ordering_key,
        })
        .collect()
}
