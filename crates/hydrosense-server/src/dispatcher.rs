//! Command Dispatcher (spec.md §4.9 "Command Dispatcher (C9)"): a thin
//! wrapper over the MQTT channel for outbound device commands. Fails
//! fast, never queues — the caller decides whether to retry.

use std::sync::Arc;

use rumqttc::QoS;

use hydrosense_mqtt::Channel;
use hydrosense_protocol::commands::CommandPayload;
use hydrosense_protocol::topics;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("broker link is down: {0}")]
    NotConnected(String),
}

pub struct Dispatcher {
    channel: Arc<dyn Channel>,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Publish a command to `devices/<id>/commands` at QoS 1 (spec.md
    /// §4.9). Resolves on broker acknowledgement; any publish failure
    /// is surfaced as `NotConnected` since the Dispatcher does not queue.
    pub async fn publish_command(
        &self,
        device_id: &str,
        command: &CommandPayload,
    ) -> Result<(), DispatchError> {
        let topic = topics::device_commands(device_id);
        let payload = serde_json::to_vec(command)
            .map_err(|e| DispatchError::NotConnected(format!("failed to encode command: {e}")))?;

        self.channel
            .publish(&topic, &payload, QoS::AtLeastOnce)
            .await
            .map_err(|e| DispatchError::NotConnected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrosense_mqtt::MockChannel;

    #[tokio::test]
    async fn publishes_send_now_to_the_device_command_topic() {
        let mock = Arc::new(MockChannel::new());
        let dispatcher = Dispatcher::new(mock.clone());

        dispatcher
            .publish_command("tank-01", &CommandPayload::send_now(Some("operator".into())))
            .await
            .unwrap();

        let published = mock.last_published().unwrap();
        assert_eq!(published.topic, "devices/tank-01/commands");
        assert_eq!(published.qos, QoS::AtLeastOnce);

        let body: serde_json::Value = serde_json::from_slice(&published.payload).unwrap();
        assert_eq!(body["command"], "send_now");
    }

    #[tokio::test]
    async fn deregister_and_go_commands_encode_correctly() {
        let mock = Arc::new(MockChannel::new());
        let dispatcher = Dispatcher::new(mock.clone());

        dispatcher
            .publish_command("tank-02", &CommandPayload::deregister(None))
            .await
            .unwrap();
        dispatcher
            .publish_command("tank-02", &CommandPayload::go())
            .await
            .unwrap();

        let messages = mock.published_to("devices/tank-02/commands");
        assert_eq!(messages.len(), 2);
    }
}
