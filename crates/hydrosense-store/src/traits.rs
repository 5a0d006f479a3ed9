//! Persistence port (spec.md §4.1 "Store (C1)").
//!
//! Narrow, single-entity operations. Reads are point or filtered;
//! writes are atomic at the document level. `findOpenAlert` +
//! `createAlert` must be serializable per `(deviceId, parameter)` —
//! concrete implementations realize this with a unique partial index
//! and resolve races by upgrading to `incrementAlertOccurrence`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use hydrosense_protocol::alert::{Alert, AlertFilter, AlertStatus, Parameter};
use hydrosense_protocol::device::{Device, DeviceFilter, DeviceStatus, RegisterPayload};
use hydrosense_protocol::sensor::SensorReading;
use hydrosense_protocol::user::User;

use crate::error::StoreResult;

/// Newly-created alert fields, supplied by the Alert Engine.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub device_id: String,
    pub device_name: String,
    pub parameter: Parameter,
    pub severity: hydrosense_protocol::alert::Severity,
    pub current_value: f64,
    pub threshold: f64,
    pub message: String,
}

/// Outcome of a `create_alert_or_increment` race: whether a brand new
/// alert was created, or an existing open one absorbed the occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOrIncrement {
    Created,
    Incremented,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ── Devices ────────────────────────────────────────────────

    async fn upsert_device_on_registration(
        &self,
        device_id: &str,
        payload: &RegisterPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<Device>;

    /// Get-or-create a device record without marking it registered
    /// (spec.md §4.2 "If deviceId is unknown, the Gateway synthesizes a
    /// registration ... "). Leaves `is_registered` at its current value
    /// if the device already exists; creates it `is_registered: false`
    /// otherwise. Used by the Gateway and Presence Tracker for devices
    /// that send data or presence before ever being explicitly registered.
    async fn ensure_device(
        &self,
        device_id: &str,
        default_sensors: &[hydrosense_protocol::device::SensorKind],
        now: DateTime<Utc>,
    ) -> StoreResult<Device>;

    async fn update_device_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn update_last_seen_only(&self, device_id: &str, now: DateTime<Utc>) -> StoreResult<()>;

    async fn get_device_by_id(&self, device_id: &str) -> StoreResult<Option<Device>>;

    async fn list_devices(&self, filter: &DeviceFilter) -> StoreResult<Vec<Device>>;

    // ── Sensor readings ────────────────────────────────────────

    async fn append_sensor_reading(&self, reading: &SensorReading) -> StoreResult<()>;

    async fn get_latest_reading(&self, device_id: &str) -> StoreResult<Option<SensorReading>>;

    /// Every reading across every device with `timestamp >= since`, used
    /// by the analytics ticker's 24h rolling parameter summary (spec.md
    /// §4.8). No ordering is guaranteed.
    async fn list_readings_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<SensorReading>>;

    // ── Alerts ─────────────────────────────────────────────────

    async fn find_open_alert(
        &self,
        device_id: &str,
        parameter: Parameter,
    ) -> StoreResult<Option<Alert>>;

    async fn create_alert(&self, new: NewAlert, now: DateTime<Utc>) -> StoreResult<Alert>;

    async fn increment_alert_occurrence(
        &self,
        alert_id: Uuid,
        current_value: f64,
        severity: hydrosense_protocol::alert::Severity,
    ) -> StoreResult<Alert>;

    async fn transition_alert(
        &self,
        alert_id: Uuid,
        to_status: AlertStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Alert>;

    /// Update the rolling `nominal_since` marker used by the
    /// auto-resolve idle timer (spec.md §4.5 step 4). `None` resets it.
    async fn set_alert_nominal_since(
        &self,
        alert_id: Uuid,
        nominal_since: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    async fn list_alerts(&self, filter: &AlertFilter) -> StoreResult<Vec<Alert>>;

    /// Transition every alert matching `filter` (whose status is not
    /// already Resolved) to Resolved. Returns the count resolved.
    /// Idempotent: a second call with the same filter resolves zero.
    async fn resolve_all_alerts(
        &self,
        filter: &AlertFilter,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<usize>;

    // ── Users ──────────────────────────────────────────────────

    async fn list_active_staff_with_email_notifications(&self) -> StoreResult<Vec<User>>;

    /// Resolve a WebSocket handshake bearer token to its owning user
    /// (spec.md §4.7: role is always looked up here, never trusted
    /// from the token itself).
    async fn get_user_by_token(&self, token: &str) -> StoreResult<Option<User>>;
}
