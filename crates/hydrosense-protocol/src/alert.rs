use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which monitored quantity an alert concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    #[serde(rename = "pH")]
    Ph,
    Tds,
    Turbidity,
}

/// Breach severity, ordered Advisory < Warning < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Advisory,
    Warning,
    Critical,
}

/// Alert lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

/// A persisted threshold-breach record for one `(device, parameter)` pair
/// (spec.md §3 "Alert").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub parameter: Parameter,
    pub severity: Severity,
    pub status: AlertStatus,
    pub current_value: f64,
    pub threshold: f64,
    pub message: String,
    pub occurrence_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    /// Timestamp of the most recent reading that kept this alert's
    /// parameter within nominal bands; reset to `None` on every breach.
    /// Drives the auto-resolve idle timer (spec.md §4.5 step 4).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal_since: Option<DateTime<Utc>>,
}

/// Filter for `listAlerts` and `resolveAllAlerts`.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub parameter: Option<Parameter>,
    pub status: Option<AlertStatus>,
    pub device_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Advisory < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn parameter_ph_serializes_as_ph() {
        assert_eq!(serde_json::to_string(&Parameter::Ph).unwrap(), r#""pH""#);
    }

    #[test]
    fn alert_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AlertStatus::Acknowledged).unwrap(),
            r#""acknowledged""#
        );
    }
}
