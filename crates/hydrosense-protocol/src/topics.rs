//! MQTT topic builders and parsers for the device fleet topic hierarchy.
//!
//! Topic structure:
//! ```text
//! devices/{device_id}/data         — inbound sensor frame
//! devices/{device_id}/register     — inbound registration
//! devices/{device_id}/presence     — inbound liveness announcement
//! devices/{device_id}/commands     — outbound command to device
//! presence/response                — inbound answer to who_is_online
//! who_is_online                    — outbound broadcast query
//! ```

/// Outbound broadcast topic for the presence poll.
pub const WHO_IS_ONLINE: &str = "who_is_online";

/// Inbound topic answering a `who_is_online` poll.
pub const PRESENCE_RESPONSE: &str = "presence/response";

pub fn device_data(device_id: &str) -> String {
    format!("devices/{device_id}/data")
}

pub fn device_register(device_id: &str) -> String {
    format!("devices/{device_id}/register")
}

pub fn device_presence(device_id: &str) -> String {
    format!("devices/{device_id}/presence")
}

pub fn device_commands(device_id: &str) -> String {
    format!("devices/{device_id}/commands")
}

/// Subscription filter matching `devices/+/data`.
pub const DATA_FILTER: &str = "devices/+/data";
/// Subscription filter matching `devices/+/register`.
pub const REGISTER_FILTER: &str = "devices/+/register";
/// Subscription filter matching `devices/+/presence`.
pub const PRESENCE_FILTER: &str = "devices/+/presence";

/// The four topic shapes the gateway subscribes to, and what each means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Data,
    Register,
    Presence,
    PresenceResponse,
}

/// Parsed inbound topic: the device id (position 1, zero-indexed) and
/// which category it belongs to. `presence/response` carries no
/// device id in the topic itself — the caller extracts it from the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub device_id: Option<String>,
    pub kind: TopicKind,
}

/// Parse an inbound topic string into its components.
///
/// Returns `None` if the topic doesn't match any subscribed shape.
pub fn parse_topic(topic: &str) -> Option<ParsedTopic> {
    if topic == PRESENCE_RESPONSE {
        return Some(ParsedTopic {
            device_id: None,
            kind: TopicKind::PresenceResponse,
        });
    }

    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() != 3 || parts[0] != "devices" {
        return None;
    }

    let device_id = parts[1].to_string();
    let kind = match parts[2] {
        "data" => TopicKind::Data,
        "register" => TopicKind::Register,
        "presence" => TopicKind::Presence,
        _ => return None,
    };

    Some(ParsedTopic {
        device_id: Some(device_id),
        kind,
    })
}
