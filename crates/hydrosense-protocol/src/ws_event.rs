//! Outbound WebSocket event vocabulary (spec.md §4.7, §6 "WebSocket events").
//!
//! Every producer (Sensor Ingestor, Presence Tracker, Alert Engine,
//! Broadcast Schedulers) builds one of these and hands it to the Hub's
//! inbound channel; the Hub alone knows how to map a variant to its
//! target rooms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alert::{Alert, Severity};
use crate::device::DeviceStatus;
use crate::sensor::SensorReading;

/// A broadcastable event, always timestamped server-side (invariant I5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    #[serde(rename = "connection:status")]
    ConnectionStatus { status: String, timestamp: DateTime<Utc> },
    #[serde(rename = "sensor:data")]
    SensorData {
        device_id: String,
        reading: SensorReading,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "device:status")]
    DeviceStatus {
        device_id: String,
        status: DeviceStatus,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "device:heartbeat")]
    DeviceHeartbeat {
        device_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "alert:new")]
    AlertNew { alert: Alert, timestamp: DateTime<Utc> },
    #[serde(rename = "alert:resolved")]
    AlertResolved { alert: Alert, timestamp: DateTime<Utc> },
    #[serde(rename = "system:health")]
    SystemHealth { report: Value, timestamp: DateTime<Utc> },
    #[serde(rename = "analytics:update")]
    AnalyticsUpdate { report: Value, timestamp: DateTime<Utc> },
    #[serde(rename = "error")]
    Error {
        message: String,
        code: String,
        timestamp: DateTime<Utc>,
    },
}

impl WsEvent {
    /// Rooms this event fans out to (spec.md §4.7 "Broadcasts").
    /// `device:<id>` rooms are resolved by the Hub once it knows the
    /// device id carried in the event.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            WsEvent::SensorData { device_id, .. }
            | WsEvent::DeviceStatus { device_id, .. }
            | WsEvent::DeviceHeartbeat { device_id, .. } => Some(device_id),
            WsEvent::AlertNew { alert, .. } | WsEvent::AlertResolved { alert, .. } => {
                Some(&alert.device_id)
            }
            _ => None,
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            WsEvent::AlertNew { alert, .. } | WsEvent::AlertResolved { alert, .. } => {
                Some(alert.severity)
            }
            _ => None,
        }
    }
}
