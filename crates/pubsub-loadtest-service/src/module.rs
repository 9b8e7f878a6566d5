//! Publisher adapter
//!
//! The single operation exposed to the load-test host: decode the options
//! bag, build a transient client, publish one message, release the client.
//! Every failure comes back as a `PubSubError`; nothing aborts the process.
//!
//! Fire-and-forget sends run on background tasks owned by the module. A host
//! that is about to exit calls [`PubSubModule::drain`] to let them finish.

use pubsub_loadtest_core::config::{DeliveryMode, PublishConfig, EMULATOR_HOST_ENV};
use pubsub_loadtest_core::error::PubSubResult;
use pubsub_loadtest_core::execution::InvocationRecord;
use pubsub_loadtest_core::message::{OutgoingMessage, PublishOutcome};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{ClientOptions, PubSubClient};
use crate::credentials::DefaultCredentials;
use crate::telemetry::{PublishTelemetry, TelemetryRecorder};

/// Name the module is registered under in the load-test host
pub const MODULE_NAME: &str = "k6/x/pubsub";

/// Stateless publish adapter. Cheap to clone and safe to share between
/// virtual users; each call builds its own client.
#[derive(Clone)]
pub struct PubSubModule {
    telemetry: Arc<dyn TelemetryRecorder>,
    default_credentials: DefaultCredentials,
    emulator_host: Option<String>,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PubSubModule {
    /// Adapter reading the emulator host and default credentials from the environment
    pub fn new() -> Self {
        Self {
            telemetry: Arc::new(PublishTelemetry::default()),
            default_credentials: DefaultCredentials::Application,
            emulator_host: std::env::var(EMULATOR_HOST_ENV).ok(),
            background: Arc::default(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryRecorder>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Credentials used when a call applies no credential option
    pub fn with_default_credentials(mut self, defaults: DefaultCredentials) -> Self {
        self.default_credentials = defaults;
        self
    }

    pub fn with_emulator_host(mut self, host: Option<String>) -> Self {
        self.emulator_host = host;
        self
    }

    /// Publish a message to `topic` using the host's options bag.
    ///
    /// Unknown keys are ignored and missing keys take their defaults. A
    /// recognized key of the wrong type is a configuration error.
    pub async fn publish(
        &self,
        topic: &str,
        message: impl Into<OutgoingMessage>,
        config: &Map<String, Value>,
    ) -> PubSubResult<PublishOutcome> {
        let config = PublishConfig::from_map(config).map_err(|e| {
            error!(topic = %topic, error = %e, "Failed to decode publish configuration");
            e
        })?;
        self.publish_message(topic, message.into(), &config).await
    }

    /// Publish with an already decoded configuration
    #[instrument(
        skip(self, message, config),
        fields(project_id = config.project_id.as_deref().unwrap_or(""), delivery = ?config.delivery)
    )]
    pub async fn publish_message(
        &self,
        topic: &str,
        message: OutgoingMessage,
        config: &PublishConfig,
    ) -> PubSubResult<PublishOutcome> {
        config.validate()?;
        let project_id = config.project_id()?.to_string();

        let mut message = message.with_default_attributes(&config.attributes);
        if message.ordering_key.is_none() {
            message.ordering_key = config.ordering_key.clone();
        }

        let mut record =
            InvocationRecord::begin(&project_id, topic, config.delivery, message.len());

        let result = self.run(topic, message, config, &project_id).await;

        match &result {
            Ok(outcome) => {
                record.complete(outcome);
                debug!(invocation_id = %record.id, outcome = ?outcome, "Publish finished");
            }
            Err(e) => {
                record.fail(format!("{}: {}", e.kind(), e));
                warn!(invocation_id = %record.id, error = %e, "Publish failed");
            }
        }

        if !config.disable_telemetry {
            self.telemetry.record(record).await;
        }

        result
    }

    async fn run(
        &self,
        topic: &str,
        message: OutgoingMessage,
        config: &PublishConfig,
        project_id: &str,
    ) -> PubSubResult<PublishOutcome> {
        let options = ClientOptions::from_config(config, self.emulator_host.as_deref())?
            .with_default_credentials(self.default_credentials.clone());

        let client = PubSubClient::connect(project_id, options).await?;

        match config.delivery {
            DeliveryMode::Confirm => {
                let result = client.topic(topic).publish(&message).await;
                client.close();
                let message_id = result?;
                Ok(PublishOutcome::Acknowledged { message_id })
            }
            DeliveryMode::FireAndForget => {
                let topic = topic.to_string();
                let handle = tokio::spawn(async move {
                    match client.topic(&topic).publish(&message).await {
                        Ok(message_id) => {
                            debug!(topic = %topic, message_id = %message_id, "Background publish acknowledged");
                        }
                        Err(e) => {
                            warn!(topic = %topic, error = %e, "Background publish failed");
                        }
                    }
                    client.close();
                });
                self.track(handle).await;
                Ok(PublishOutcome::Enqueued)
            }
        }
    }

    async fn track(&self, handle: JoinHandle<()>) {
        let mut background = self.background.lock().await;
        background.retain(|pending| !pending.is_finished());
        background.push(handle);
    }

    /// Background sends not yet finished
    pub async fn pending_sends(&self) -> usize {
        self.background
            .lock()
            .await
            .iter()
            .filter(|pending| !pending.is_finished())
            .count()
    }

    /// Wait for every background send started so far. Returns how many were
    /// awaited.
    #[instrument(skip(self))]
    pub async fn drain(&self) -> usize {
        let handles = std::mem::take(&mut *self.background.lock().await);
        let count = handles.len();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background publish task did not complete");
            }
        }

        debug!(count, "Background sends drained");
        count
    }
}

impl Default for PubSubModule {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PubSubModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubModule")
            .field("default_credentials", &self.default_credentials)
            .field("emulator_host", &self.emulator_host)
            .finish()
    }
}

/// Log a startup line naming the module, for hosts that register it by name
pub fn announce() {
    info!(module = MODULE_NAME, version = env!("CARGO_PKG_VERSION"), "Pub/Sub module loaded");
}
