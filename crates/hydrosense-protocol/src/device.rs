use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Maintenance,
    Error,
}

/// One of the three sensors a device may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    #[serde(rename = "pH")]
    Ph,
    Tds,
    Turbidity,
}

/// Default declared sensor set for devices that don't report one.
pub fn default_sensors() -> Vec<SensorKind> {
    vec![SensorKind::Ph, SensorKind::Tds, SensorKind::Turbidity]
}

/// Advisory physical placement for a device. Never authoritative for
/// liveness or alerting — used for display and email context only.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Persisted device record (spec.md §3 "Device").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub name: String,
    pub device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub sensors: Vec<SensorKind>,
    pub status: DeviceStatus,
    pub is_registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Build a device from an explicit `devices/<id>/register` message or
    /// operator action: registered from the moment it exists.
    pub fn new_registration(
        device_id: impl Into<String>,
        name: Option<String>,
        device_type: Option<String>,
        sensors: Option<Vec<SensorKind>>,
        location: Option<Location>,
        now: DateTime<Utc>,
    ) -> Self {
        let device_id = device_id.into();
        Self {
            name: name.unwrap_or_else(|| device_id.clone()),
            device_type: device_type.unwrap_or_else(|| "generic".to_string()),
            firmware_version: None,
            mac_address: None,
            ip_address: None,
            sensors: sensors.unwrap_or_else(default_sensors),
            status: DeviceStatus::Offline,
            is_registered: true,
            location,
            last_seen: now,
            created_at: now,
            updated_at: now,
            device_id,
        }
    }

    /// Build a placeholder for a device the Gateway has never seen
    /// registered, synthesized the first time it sends data or a
    /// presence signal (spec.md §4.2, §3 "an unregistered device may
    /// report presence and sensor frames but produces no alerts until
    /// registered"). Stays `is_registered: false` until an explicit
    /// registration event supersedes it.
    pub fn new_unregistered(
        device_id: impl Into<String>,
        sensors: Option<Vec<SensorKind>>,
        now: DateTime<Utc>,
    ) -> Self {
        let device_id = device_id.into();
        Self {
            name: device_id.clone(),
            device_type: "generic".to_string(),
            firmware_version: None,
            mac_address: None,
            ip_address: None,
            sensors: sensors.unwrap_or_else(default_sensors),
            status: DeviceStatus::Offline,
            is_registered: false,
            location: None,
            last_seen: now,
            created_at: now,
            updated_at: now,
            device_id,
        }
    }
}

/// Inbound `devices/<id>/register` payload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegisterPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub sensors: Option<Vec<SensorKind>>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// Filter for listing devices.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub status: Option<DeviceStatus>,
    pub is_registered: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DeviceStatus::Maintenance).unwrap(),
            r#""maintenance""#
        );
    }

    #[test]
    fn sensor_kind_ph_serializes_as_ph() {
        assert_eq!(
            serde_json::to_string(&SensorKind::Ph).unwrap(),
            r#""pH""#
        );
    }

    #[test]
    fn new_registration_starts_offline_and_registered() {
        let now = Utc::now();
        let device = Device::new_registration("tank-01", None, None, None, None, now);
        assert_eq!(device.status, DeviceStatus::Offline);
        assert!(device.is_registered);
        assert_eq!(device.sensors.len(), 3);
        assert_eq!(device.name, "tank-01");
    }

    #[test]
    fn register_payload_defaults_are_none() {
        let payload: RegisterPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.name.is_none());
        assert!(payload.sensors.is_none());
    }
}
