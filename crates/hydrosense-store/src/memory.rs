//! In-memory [`Store`] implementation for unit and end-to-end tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use hydrosense_protocol::alert::{Alert, AlertFilter, AlertStatus, Parameter, Severity};
use hydrosense_protocol::device::{Device, DeviceFilter, DeviceStatus, RegisterPayload};
use hydrosense_protocol::sensor::SensorReading;
use hydrosense_protocol::user::User;

use crate::error::{StoreError, StoreResult};
use crate::traits::{NewAlert, Store};

/// Backs tests that need a `Store` without a running Postgres instance.
/// Readings are kept newest-first per device; everything else is a plain
/// map keyed by its natural id.
#[derive(Default)]
pub struct MemoryStore {
    devices: RwLock<HashMap<String, Device>>,
    readings: RwLock<HashMap<String, Vec<SensorReading>>>,
    alerts: RwLock<HashMap<Uuid, Alert>>,
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user directly, bypassing the (not-yet-built) account API.
    pub fn seed_user(&self, user: User) {
        self.users.write().unwrap().push(user);
    }

    /// Seed a device directly.
    pub fn seed_device(&self, device: Device) {
        self.devices
            .write()
            .unwrap()
            .insert(device.device_id.clone(), device);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_device_on_registration(
        &self,
        device_id: &str,
        payload: &RegisterPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        let mut devices = self.devices.write().unwrap();
        let device = devices
            .entry(device_id.to_string())
            .and_modify(|d| {
                if let Some(name) = &payload.name {
                    d.name = name.clone();
                }
                if let Some(t) = &payload.r#type {
                    d.device_type = t.clone();
                }
                if let Some(sensors) = &payload.sensors {
                    d.sensors = sensors.clone();
                }
                if let Some(location) = &payload.location {
                    d.location = Some(location.clone());
                }
                d.is_registered = true;
                d.updated_at = now;
            })
            .or_insert_with(|| {
                Device::new_registration(
                    device_id,
                    payload.name.clone(),
                    payload.r#type.clone(),
                    payload.sensors.clone(),
                    payload.location.clone(),
                    now,
                )
            });
        Ok(device.clone())
    }

    async fn ensure_device(
        &self,
        device_id: &str,
        default_sensors: &[hydrosense_protocol::device::SensorKind],
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        let mut devices = self.devices.write().unwrap();
        let device = devices.entry(device_id.to_string()).or_insert_with(|| {
            Device::new_unregistered(device_id, Some(default_sensors.to_vec()), now)
        });
        Ok(device.clone())
    }

    async fn update_device_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut devices = self.devices.write().unwrap();
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::NotFound(device_id.to_string()))?;
        device.status = status;
        device.last_seen = now;
        device.updated_at = now;
        Ok(())
    }

    async fn update_last_seen_only(&self, device_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut devices = self.devices.write().unwrap();
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::NotFound(device_id.to_string()))?;
        device.last_seen = now;
        Ok(())
    }

    async fn get_device_by_id(&self, device_id: &str) -> StoreResult<Option<Device>> {
        Ok(self.devices.read().unwrap().get(device_id).cloned())
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> StoreResult<Vec<Device>> {
        let mut devices: Vec<Device> = self
            .devices
            .read()
            .unwrap()
            .values()
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .filter(|d| filter.is_registered.is_none_or(|r| d.is_registered == r))
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }

    async fn append_sensor_reading(&self, reading: &SensorReading) -> StoreResult<()> {
        self.readings
            .write()
            .unwrap()
            .entry(reading.device_id.clone())
            .or_default()
            .push(reading.clone());
        Ok(())
    }

    async fn get_latest_reading(&self, device_id: &str) -> StoreResult<Option<SensorReading>> {
        Ok(self
            .readings
            .read()
            .unwrap()
            .get(device_id)
            .and_then(|rs| rs.last().cloned()))
    }

    async fn list_readings_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<SensorReading>> {
        Ok(self
            .readings
            .read()
            .unwrap()
            .values()
            .flatten()
            .filter(|r| r.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn find_open_alert(
        &self,
        device_id: &str,
        parameter: Parameter,
    ) -> StoreResult<Option<Alert>> {
        Ok(self
            .alerts
            .read()
            .unwrap()
            .values()
            .find(|a| {
                a.device_id == device_id && a.parameter == parameter && a.status != AlertStatus::Resolved
            })
            .cloned())
    }

    async fn create_alert(&self, new: NewAlert, now: DateTime<Utc>) -> StoreResult<Alert> {
        let mut alerts = self.alerts.write().unwrap();
        if alerts.values().any(|a| {
            a.device_id == new.device_id
                && a.parameter == new.parameter
                && a.status != AlertStatus::Resolved
        }) {
            return Err(StoreError::Conflict(format!(
                "open alert already exists for {}/{:?}",
                new.device_id, new.parameter
            )));
        }
        let alert = Alert {
            alert_id: Uuid::now_v7(),
            device_id: new.device_id,
            device_name: new.device_name,
            parameter: new.parameter,
            severity: new.severity,
            status: AlertStatus::Active,
            current_value: new.current_value,
            threshold: new.threshold,
            message: new.message,
            occurrence_count: 1,
            created_at: now,
            acknowledged_at: None,
            resolved_at: None,
            resolution_notes: None,
            nominal_since: None,
        };
        alerts.insert(alert.alert_id, alert.clone());
        Ok(alert)
    }

    async fn increment_alert_occurrence(
        &self,
        alert_id: Uuid,
        current_value: f64,
        severity: Severity,
    ) -> StoreResult<Alert> {
        let mut alerts = self.alerts.write().unwrap();
        let alert = alerts
            .get_mut(&alert_id)
            .ok_or_else(|| StoreError::NotFound(alert_id.to_string()))?;
        alert.occurrence_count += 1;
        alert.current_value = current_value;
        alert.severity = severity;
        alert.nominal_since = None;
        Ok(alert.clone())
    }

    async fn transition_alert(
        &self,
        alert_id: Uuid,
        to_status: AlertStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Alert> {
        let mut alerts = self.alerts.write().unwrap();
        let alert = alerts
            .get_mut(&alert_id)
            .ok_or_else(|| StoreError::NotFound(alert_id.to_string()))?;
        alert.status = to_status;
        match to_status {
            AlertStatus::Acknowledged => alert.acknowledged_at = Some(now),
            AlertStatus::Resolved => alert.resolved_at = Some(now),
            AlertStatus::Active => {}
        }
        if notes.is_some() {
            alert.resolution_notes = notes;
        }
        Ok(alert.clone())
    }

    async fn set_alert_nominal_since(
        &self,
        alert_id: Uuid,
        nominal_since: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut alerts = self.alerts.write().unwrap();
        let alert = alerts
            .get_mut(&alert_id)
            .ok_or_else(|| StoreError::NotFound(alert_id.to_string()))?;
        alert.nominal_since = nominal_since;
        Ok(())
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> StoreResult<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .read()
            .unwrap()
            .values()
            .filter(|a| filter.severity.is_none_or(|s| a.severity == s))
            .filter(|a| filter.parameter.is_none_or(|p| a.parameter == p))
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .filter(|a| {
                filter
                    .device_id
                    .as_ref()
                    .is_none_or(|d| &a.device_id == d)
            })
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn resolve_all_alerts(
        &self,
        filter: &AlertFilter,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut alerts = self.alerts.write().unwrap();
        let mut count = 0;
        for alert in alerts.values_mut() {
            if alert.status == AlertStatus::Resolved {
                continue;
            }
            if filter.severity.is_some_and(|s| alert.severity != s) {
                continue;
            }
            if filter.parameter.is_some_and(|p| alert.parameter != p) {
                continue;
            }
            if filter
                .device_id
                .as_ref()
                .is_some_and(|d| &alert.device_id != d)
            {
                continue;
            }
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(now);
            if notes.is_some() {
                alert.resolution_notes = notes.clone();
            }
            count += 1;
        }
        Ok(count)
    }

    async fn list_active_staff_with_email_notifications(&self) -> StoreResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .filter(|u| u.wants_alert_email())
            .cloned()
            .collect())
    }

    async fn get_user_by_token(&self, token: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.auth_token == token)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrosense_protocol::alert::{Parameter, Severity};
    use hydrosense_protocol::device::RegisterPayload;

    #[tokio::test]
    async fn registering_twice_updates_in_place() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let payload = RegisterPayload {
            name: Some("Tank 1".into()),
            ..Default::default()
        };
        store
            .upsert_device_on_registration("tank-01", &payload, now)
            .await
            .unwrap();
        let second = RegisterPayload {
            name: Some("Tank One".into()),
            ..Default::default()
        };
        let device = store
            .upsert_device_on_registration("tank-01", &second, now)
            .await
            .unwrap();
        assert_eq!(device.name, "Tank One");
        assert_eq!(store.list_devices(&DeviceFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn at_most_one_open_alert_per_device_parameter() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let new = NewAlert {
            device_id: "tank-01".into(),
            device_name: "Tank 1".into(),
            parameter: Parameter::Ph,
            severity: Severity::Warning,
            current_value: 9.0,
            threshold: 8.5,
            message: "pH high".into(),
        };
        store.create_alert(new.clone(), now).await.unwrap();
        let err = store.create_alert(new, now).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn resolve_all_is_idempotent() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let new = NewAlert {
            device_id: "tank-01".into(),
            device_name: "Tank 1".into(),
            parameter: Parameter::Tds,
            severity: Severity::Advisory,
            current_value: 100.0,
            threshold: 50.0,
            message: "tds elevated".into(),
        };
        store.create_alert(new, now).await.unwrap();
        let resolved = store
            .resolve_all_alerts(&AlertFilter::default(), None, now)
            .await
            .unwrap();
        assert_eq!(resolved, 1);
        let resolved_again = store
            .resolve_all_alerts(&AlertFilter::default(), None, now)
            .await
            .unwrap();
        assert_eq!(resolved_again, 0);
    }
}
