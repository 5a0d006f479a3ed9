//! MQTT channel — async client for the device fleet broker.
//!
//! Wraps `rumqttc::AsyncClient` with typed publish/subscribe helpers
//! for the device topic hierarchy (spec.md §6).

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use serde::Serialize;
use std::time::Duration;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};
use hydrosense_protocol::commands::CommandPayload;
use hydrosense_protocol::topics;

/// Abstraction for MQTT message publishing and subscribing.
///
/// Enables mocking in tests without a real broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a raw payload to a topic.
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()>;

    /// Subscribe to a topic filter.
    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()>;
}

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// MQTT channel connected to the device fleet broker.
///
/// Owns the `AsyncClient` for publishing/subscribing. The `EventLoop`
/// is returned separately — the caller drives it via
/// [`crate::reconnect::drive_with_backoff`].
pub struct MqttChannel {
    client: AsyncClient,
    qos: QoS,
}

impl MqttChannel {
    /// Create a channel and its event loop from config.
    pub fn new(config: &MqttConfig) -> MqttResult<(Self, EventLoop)> {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs.into()));
        options.set_connection_timeout(config.connect_timeout_secs);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        if config.use_tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        let (client, eventloop) = AsyncClient::new(options, 256);

        Ok((
            Self {
                client,
                qos: qos_from_u8(config.qos),
            },
            eventloop,
        ))
    }

    // ── Subscription helpers (spec.md §4.2) ───────────────────

    /// Subscribe to the four inbound topic shapes the Gateway consumes.
    pub async fn subscribe_ingest(&self) -> MqttResult<()> {
        self.subscribe(topics::DATA_FILTER, self.qos).await?;
        self.subscribe(topics::REGISTER_FILTER, self.qos).await?;
        self.subscribe(topics::PRESENCE_FILTER, self.qos).await?;
        self.subscribe(topics::PRESENCE_RESPONSE, self.qos).await
    }

    // ── Outbound helpers ───────────────────────────────────────

    /// Publish the `who_is_online` broadcast query (spec.md §4.3).
    pub async fn publish_who_is_online(&self) -> MqttResult<()> {
        self.publish(topics::WHO_IS_ONLINE, b"{}", self.qos).await
    }

    /// Publish a command to a specific device (spec.md §4.9).
    pub async fn publish_command(
        &self,
        device_id: &str,
        command: &CommandPayload,
    ) -> MqttResult<()> {
        let topic = topics::device_commands(device_id);
        self.publish_json(&topic, command).await
    }

    async fn publish_json<T: Serialize>(&self, topic: &str, payload: &T) -> MqttResult<()> {
        let bytes =
            serde_json::to_vec(payload).map_err(|e| MqttError::Serialization(e.to_string()))?;
        self.publish(topic, &bytes, self.qos).await
    }
}

#[async_trait]
impl Channel for MqttChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.client
            .subscribe(filter, qos)
            .await
            .map_err(|e| MqttError::Subscribe(e.to_string()))
    }
}
