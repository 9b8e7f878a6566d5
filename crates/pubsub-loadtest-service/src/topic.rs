//! Topic handle and the `topics.publish` call

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pubsub_loadtest_core::error::{PubSubResult, PublishError};
use pubsub_loadtest_core::message::OutgoingMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};
use url::Url;

use crate::client::PubSubClient;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    data: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ordering_key: Option<String>,
}

impl From<&OutgoingMessage> for WireMessage {
    fn from(message: &OutgoingMessage) -> Self {
        Self {
            data: STANDARD.encode(&message.data),
            attributes: message.attributes.clone(),
            ordering_key: message.ordering_key.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// A topic in the client's project
#[derive(Debug)]
pub struct Topic<'a> {
    client: &'a PubSubClient,
    name: String,
}

impl<'a> Topic<'a> {
    pub(crate) fn new(client: &'a PubSubClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified resource name: `projects/{project}/topics/{topic}`
    pub fn resource_name(&self) -> String {
        format!("projects/{}/topics/{}", self.client.project_id(), self.name)
    }

    /// `{base}/v1/projects/{project}/topics/{topic}:publish`, with the project
    /// and topic each encoded as a single path segment
    fn publish_url(&self) -> PubSubResult<Url> {
        let mut url = self.client.base_url().clone();
        url.path_segments_mut()
            .map_err(|_| PublishError::Transport("endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["v1", "projects", self.client.project_id(), "topics"])
            .push(&format!("{}:publish", self.name));
        Ok(url)
    }

    /// Publish one message and wait for the broker to assign it an id
    #[instrument(skip(self, message), fields(topic = %self.name, bytes = message.len()))]
    pub async fn publish(&self, message: &OutgoingMessage) -> PubSubResult<String> {
        let body = PublishRequest {
            messages: vec![WireMessage::from(message)],
        };

        let mut request = self.client.http().post(self.publish_url()?).json(&body);
        for (name, value) in self.client.auth_headers().await? {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Transport(format!("malformed publish response: {}", e)))?;

        let message_id = parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or(PublishError::EmptyResponse)?;

        debug!(message_id = %message_id, "Message acknowledged");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use pubsub_loadtest_core::error::PubSubError;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn anonymous_client(server: &MockServer) -> PubSubClient {
        let options = ClientOptions::new()
            .with_endpoint(Url::parse(&server.uri()).unwrap())
            .without_authentication();
        PubSubClient::connect("proj-1", options).await.unwrap()
    }

    #[test]
    fn test_wire_message_encoding() {
        let message = OutgoingMessage::from("hello")
            .with_attribute("source", "k6")
            .with_ordering_key("key-1");
        let wire = serde_json::to_value(WireMessage::from(&message)).unwrap();

        assert_eq!(
            wire,
            json!({
                "data": "aGVsbG8=",
                "attributes": {"source": "k6"},
                "orderingKey": "key-1"
            })
        );

        let bare = serde_json::to_value(WireMessage::from(&OutgoingMessage::from("hi"))).unwrap();
        assert_eq!(bare, json!({"data": "aGk="}));
    }

    #[tokio::test]
    async fn test_publish_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/proj-1/topics/orders:publish"))
            .and(body_json(json!({"messages": [{"data": "aGVsbG8="}]})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"messageIds": ["4711"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = anonymous_client(&server).await;
        let topic = client.topic("orders");
        assert_eq!(topic.resource_name(), "projects/proj-1/topics/orders");

        let id = topic.publish(&OutgoingMessage::from("hello")).await.unwrap();
        assert_eq!(id, "4711");
    }

    #[tokio::test]
    async fn test_publish_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("Resource not found (resource=missing)."),
            )
            .mount(&server)
            .await;

        let client = anonymous_client(&server).await;
        let err = client
            .topic("missing")
            .publish(&OutgoingMessage::from("x"))
            .await
            .unwrap_err();

        match err {
            PubSubError::Publish(PublishError::Rejected { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Resource not found"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = anonymous_client(&server).await;
        let err = client
            .topic("orders")
            .publish(&OutgoingMessage::from("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PubSubError::Publish(PublishError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_empty_topic_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/proj-1/topics/:publish"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid resource name"))
            .expect(1)
            .mount(&server)
            .await;

        let client = anonymous_client(&server).await;
        let err = client
            .topic("")
            .publish(&OutgoingMessage::from("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "publish");
    }

    #[tokio::test]
    async fn test_topic_with_path_characters_stays_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid resource name"))
            .expect(1)
            .mount(&server)
            .await;

        let client = anonymous_client(&server).await;
        let err = client
            .topic("orders/../victim")
            .publish(&OutgoingMessage::from("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "publish");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].url.path(),
            "/v1/projects/proj-1/topics/orders%2F..%2Fvictim:publish"
        );
    }

    #[tokio::test]
    async fn test_endpoint_path_prefix_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pubsub/v1/projects/proj-1/topics/orders:publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messageIds": ["5"]})))
            .expect(1)
            .mount(&server)
            .await;

        let options = ClientOptions::new()
            .with_endpoint(Url::parse(&format!("{}/pubsub/", server.uri())).unwrap())
            .without_authentication();
        let client = PubSubClient::connect("proj-1", options).await.unwrap();

        let id = client.topic("orders").publish(&OutgoingMessage::from("x")).await.unwrap();
        assert_eq!(id, "5");
    }
}
