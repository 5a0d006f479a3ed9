use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outbound `devices/<id>/commands` payload kinds (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    SendNow,
    Deregister,
    Go,
}

/// Envelope published to a device's command topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPayload {
    pub command: CommandKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

impl CommandPayload {
    pub fn send_now(reason: Option<String>) -> Self {
        Self {
            command: CommandKind::SendNow,
            reason,
            at: Some(Utc::now()),
        }
    }

    pub fn deregister(reason: Option<String>) -> Self {
        Self {
            command: CommandKind::Deregister,
            reason,
            at: None,
        }
    }

    pub fn go() -> Self {
        Self {
            command: CommandKind::Go,
            reason: None,
            at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_now_serializes_snake_case_command() {
        let payload = CommandPayload::send_now(Some("operator request".into()));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["command"], "send_now");
        assert_eq!(json["reason"], "operator request");
    }

    #[test]
    fn go_omits_optional_fields() {
        let payload = CommandPayload::go();
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("reason"));
        assert!(!json.contains("\"at\""));
    }
}
