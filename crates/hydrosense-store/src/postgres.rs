//! PostgreSQL-backed [`Store`] implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use hydrosense_protocol::alert::{Alert, AlertFilter, AlertStatus, Parameter, Severity};
use hydrosense_protocol::device::{Device, DeviceFilter, DeviceStatus, Location, RegisterPayload};
use hydrosense_protocol::sensor::SensorReading;
use hydrosense_protocol::user::{Role, User, UserStatus};

use crate::error::StoreResult;
use crate::traits::{NewAlert, Store};

/// Connect to PostgreSQL and run the bundled migrations.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    tracing::info!("running database migrations");
    sqlx::raw_sql(include_str!("../migrations/001_devices.sql"))
        .execute(&pool)
        .await?;
    sqlx::raw_sql(include_str!("../migrations/002_sensor_readings.sql"))
        .execute(&pool)
        .await?;
    sqlx::raw_sql(include_str!("../migrations/003_alerts.sql"))
        .execute(&pool)
        .await?;
    sqlx::raw_sql(include_str!("../migrations/004_users.sql"))
        .execute(&pool)
        .await?;
    tracing::info!("migrations complete");

    Ok(pool)
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Serialize a snake_case enum to its bare string form for storage in a
/// TEXT column (our enums serialize to a JSON string, so this just
/// unwraps the surrounding quotes).
fn enum_to_text<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value).expect("enum serializes to a JSON string") {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn text_to_enum<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct DeviceRow {
    device_id: String,
    name: String,
    device_type: String,
    firmware_version: Option<String>,
    mac_address: Option<String>,
    ip_address: Option<String>,
    sensors: serde_json::Value,
    status: String,
    is_registered: bool,
    location: Option<serde_json::Value>,
    last_seen: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DeviceRow {
    fn into_device(self) -> Result<Device, serde_json::Error> {
        Ok(Device {
            device_id: self.device_id,
            name: self.name,
            device_type: self.device_type,
            firmware_version: self.firmware_version,
            mac_address: self.mac_address,
            ip_address: self.ip_address,
            sensors: serde_json::from_value(self.sensors)?,
            status: text_to_enum(&self.status)?,
            is_registered: self.is_registered,
            location: self.location.map(serde_json::from_value).transpose()?,
            last_seen: self.last_seen,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SensorReadingRow {
    device_id: String,
    ts: DateTime<Utc>,
    ph: Option<f64>,
    tds: Option<f64>,
    turbidity: Option<f64>,
    ph_valid: bool,
    tds_valid: bool,
    turbidity_valid: bool,
}

impl From<SensorReadingRow> for SensorReading {
    fn from(row: SensorReadingRow) -> Self {
        SensorReading {
            device_id: row.device_id,
            timestamp: row.ts,
            ph: row.ph,
            tds: row.tds,
            turbidity: row.turbidity,
            ph_valid: row.ph_valid,
            tds_valid: row.tds_valid,
            turbidity_valid: row.turbidity_valid,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct AlertRow {
    alert_id: Uuid,
    device_id: String,
    device_name: String,
    parameter: String,
    severity: String,
    status: String,
    current_value: f64,
    threshold: f64,
    message: String,
    occurrence_count: i32,
    created_at: DateTime<Utc>,
    acknowledged_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    resolution_notes: Option<String>,
    nominal_since: Option<DateTime<Utc>>,
}

impl AlertRow {
    fn into_alert(self) -> Result<Alert, serde_json::Error> {
        Ok(Alert {
            alert_id: self.alert_id,
            device_id: self.device_id,
            device_name: self.device_name,
            parameter: text_to_enum(&self.parameter)?,
            severity: text_to_enum(&self.severity)?,
            status: text_to_enum(&self.status)?,
            current_value: self.current_value,
            threshold: self.threshold,
            message: self.message,
            occurrence_count: self.occurrence_count as u32,
            created_at: self.created_at,
            acknowledged_at: self.acknowledged_at,
            resolved_at: self.resolved_at,
            resolution_notes: self.resolution_notes,
            nominal_since: self.nominal_since,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    auth_token: String,
    role: String,
    status: String,
    email_notifications: bool,
}

impl UserRow {
    fn into_user(self) -> Result<User, serde_json::Error> {
        Ok(User {
            id: self.id,
            email: self.email,
            auth_token: self.auth_token,
            role: text_to_enum::<Role>(&self.role)?,
            status: text_to_enum::<UserStatus>(&self.status)?,
            email_notifications: self.email_notifications,
        })
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_device_on_registration(
        &self,
        device_id: &str,
        payload: &RegisterPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        let sensors = payload
            .sensors
            .clone()
            .unwrap_or_else(hydrosense_protocol::device::default_sensors);
        let sensors_json = serde_json::to_value(&sensors).expect("sensors serialize");
        let location_json = payload
            .location
            .clone()
            .map(|l| serde_json::to_value(l).expect("location serializes"));
        let device_type = payload.r#type.clone().unwrap_or_else(|| "generic".into());
        let name = payload.name.clone().unwrap_or_else(|| device_id.to_string());
        let status = enum_to_text(&DeviceStatus::Offline);

        let row = sqlx::query_as::<_, DeviceRow>(
            "INSERT INTO devices (device_id, name, device_type, sensors, status, is_registered, location, last_seen, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, true, $6, $7, $7, $7)
             ON CONFLICT (device_id) DO UPDATE SET
                name = EXCLUDED.name,
                device_type = EXCLUDED.device_type,
                sensors = EXCLUDED.sensors,
                is_registered = true,
                location = EXCLUDED.location,
                updated_at = EXCLUDED.updated_at
             RETURNING *",
        )
        .bind(device_id)
        .bind(name)
        .bind(device_type)
        .bind(sensors_json)
        .bind(status)
        .bind(location_json)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_device().map_err(|e| {
            crate::error::StoreError::Permanent(format!("decoding device row: {e}"))
        })?)
    }

    async fn ensure_device(
        &self,
        device_id: &str,
        default_sensors: &[hydrosense_protocol::device::SensorKind],
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        let sensors_json = serde_json::to_value(default_sensors).expect("sensors serialize");
        let status = enum_to_text(&DeviceStatus::Offline);
        let row = sqlx::query_as::<_, DeviceRow>(
            "INSERT INTO devices (device_id, name, device_type, sensors, status, is_registered, last_seen, created_at, updated_at)
             VALUES ($1, $1, 'generic', $2, $3, false, $4, $4, $4)
             ON CONFLICT (device_id) DO UPDATE SET device_id = EXCLUDED.device_id
             RETURNING *",
        )
        .bind(device_id)
        .bind(sensors_json)
        .bind(status)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_device().map_err(|e| {
            crate::error::StoreError::Permanent(format!("decoding device row: {e}"))
        })?)
    }

    async fn update_device_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE devices SET status = $1, last_seen = $2, updated_at = $2 WHERE device_id = $3",
        )
        .bind(enum_to_text(&status))
        .bind(now)
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_last_seen_only(&self, device_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE devices SET last_seen = $1 WHERE device_id = $2")
            .bind(now)
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_device_by_id(&self, device_id: &str) -> StoreResult<Option<Device>> {
        let row = sqlx::query_as::<_, DeviceRow>("SELECT * FROM devices WHERE device_id = $1")
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            r.into_device()
                .map_err(|e| crate::error::StoreError::Permanent(format!("decoding device row: {e}")))
        })
        .transpose()
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> StoreResult<Vec<Device>> {
        let mut sql = String::from("SELECT * FROM devices WHERE 1=1");
        if filter.status.is_some() {
            sql.push_str(" AND status = $1");
        }
        if filter.is_registered.is_some() {
            sql.push_str(if filter.status.is_some() {
                " AND is_registered = $2"
            } else {
                " AND is_registered = $1"
            });
        }
        sql.push_str(" ORDER BY device_id");

        let mut query = sqlx::query_as::<_, DeviceRow>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(enum_to_text(&status));
        }
        if let Some(is_registered) = filter.is_registered {
            query = query.bind(is_registered);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| {
                r.into_device()
                    .map_err(|e| crate::error::StoreError::Permanent(format!("decoding device row: {e}")))
            })
            .collect()
    }

    async fn append_sensor_reading(&self, reading: &SensorReading) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sensor_readings (device_id, ts, ph, tds, turbidity, ph_valid, tds_valid, turbidity_valid)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&reading.device_id)
        .bind(reading.timestamp)
        .bind(reading.ph)
        .bind(reading.tds)
        .bind(reading.turbidity)
        .bind(reading.ph_valid)
        .bind(reading.tds_valid)
        .bind(reading.turbidity_valid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_latest_reading(&self, device_id: &str) -> StoreResult<Option<SensorReading>> {
        let row = sqlx::query_as::<_, SensorReadingRow>(
            "SELECT * FROM sensor_readings WHERE device_id = $1 ORDER BY ts DESC LIMIT 1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SensorReading::from))
    }

    async fn list_readings_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<SensorReading>> {
        let rows = sqlx::query_as::<_, SensorReadingRow>(
            "SELECT * FROM sensor_readings WHERE ts >= $1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SensorReading::from).collect())
    }

    async fn find_open_alert(
        &self,
        device_id: &str,
        parameter: Parameter,
    ) -> StoreResult<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM alerts WHERE device_id = $1 AND parameter = $2 AND status <> 'resolved'",
        )
        .bind(device_id)
        .bind(enum_to_text(&parameter))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            r.into_alert()
                .map_err(|e| crate::error::StoreError::Permanent(format!("decoding alert row: {e}")))
        })
        .transpose()
    }

    async fn create_alert(&self, new: NewAlert, now: DateTime<Utc>) -> StoreResult<Alert> {
        let alert_id = Uuid::now_v7();
        let row = sqlx::query_as::<_, AlertRow>(
            "INSERT INTO alerts (alert_id, device_id, device_name, parameter, severity, status, current_value, threshold, message, occurrence_count, created_at)
             VALUES ($1, $2, $3, $4, $5, 'active', $6, $7, $8, 1, $9)
             RETURNING *",
        )
        .bind(alert_id)
        .bind(new.device_id)
        .bind(new.device_name)
        .bind(enum_to_text(&new.parameter))
        .bind(enum_to_text(&new.severity))
        .bind(new.current_value)
        .bind(new.threshold)
        .bind(new.message)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_alert().map_err(|e| {
            crate::error::StoreError::Permanent(format!("decoding alert row: {e}"))
        })?)
    }

    async fn increment_alert_occurrence(
        &self,
        alert_id: Uuid,
        current_value: f64,
        severity: Severity,
    ) -> StoreResult<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(
            "UPDATE alerts SET occurrence_count = occurrence_count + 1, current_value = $1, severity = $2, nominal_since = NULL
             WHERE alert_id = $3
             RETURNING *",
        )
        .bind(current_value)
        .bind(enum_to_text(&severity))
        .bind(alert_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_alert().map_err(|e| {
            crate::error::StoreError::Permanent(format!("decoding alert row: {e}"))
        })?)
    }

    async fn transition_alert(
        &self,
        alert_id: Uuid,
        to_status: AlertStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Alert> {
        let (ack_col, resolved_col) = match to_status {
            AlertStatus::Acknowledged => (Some(now), None),
            AlertStatus::Resolved => (None, Some(now)),
            AlertStatus::Active => (None, None),
        };
        let row = sqlx::query_as::<_, AlertRow>(
            "UPDATE alerts SET status = $1,
                acknowledged_at = COALESCE($2, acknowledged_at),
                resolved_at = COALESCE($3, resolved_at),
                resolution_notes = COALESCE($4, resolution_notes)
             WHERE alert_id = $5
             RETURNING *",
        )
        .bind(enum_to_text(&to_status))
        .bind(ack_col)
        .bind(resolved_col)
        .bind(notes)
        .bind(alert_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_alert().map_err(|e| {
            crate::error::StoreError::Permanent(format!("decoding alert row: {e}"))
        })?)
    }

    async fn set_alert_nominal_since(
        &self,
        alert_id: Uuid,
        nominal_since: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE alerts SET nominal_since = $1 WHERE alert_id = $2")
            .bind(nominal_since)
            .bind(alert_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> StoreResult<Vec<Alert>> {
        let mut sql = String::from("SELECT * FROM alerts WHERE 1=1");
        let mut idx = 1;
        if filter.severity.is_some() {
            sql.push_str(&format!(" AND severity = ${idx}"));
            idx += 1;
        }
        if filter.parameter.is_some() {
            sql.push_str(&format!(" AND parameter = ${idx}"));
            idx += 1;
        }
        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ${idx}"));
            idx += 1;
        }
        if filter.device_id.is_some() {
            sql.push_str(&format!(" AND device_id = ${idx}"));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query_as::<_, AlertRow>(&sql);
        if let Some(severity) = filter.severity {
            query = query.bind(enum_to_text(&severity));
        }
        if let Some(parameter) = filter.parameter {
            query = query.bind(enum_to_text(&parameter));
        }
        if let Some(status) = filter.status {
            query = query.bind(enum_to_text(&status));
        }
        if let Some(device_id) = &filter.device_id {
            query = query.bind(device_id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| {
                r.into_alert()
                    .map_err(|e| crate::error::StoreError::Permanent(format!("decoding alert row: {e}")))
            })
            .collect()
    }

    async fn resolve_all_alerts(
        &self,
        filter: &AlertFilter,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut sql =
            String::from("UPDATE alerts SET status = 'resolved', resolved_at = $1, resolution_notes = COALESCE($2, resolution_notes) WHERE status <> 'resolved'");
        let mut idx = 3;
        if filter.severity.is_some() {
            sql.push_str(&format!(" AND severity = ${idx}"));
            idx += 1;
        }
        if filter.parameter.is_some() {
            sql.push_str(&format!(" AND parameter = ${idx}"));
            idx += 1;
        }
        if filter.device_id.is_some() {
            sql.push_str(&format!(" AND device_id = ${idx}"));
        }

        let mut query = sqlx::query(&sql).bind(now).bind(notes);
        if let Some(severity) = filter.severity {
            query = query.bind(enum_to_text(&severity));
        }
        if let Some(parameter) = filter.parameter {
            query = query.bind(enum_to_text(&parameter));
        }
        if let Some(device_id) = &filter.device_id {
            query = query.bind(device_id);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn list_active_staff_with_email_notifications(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE status = 'active' AND email_notifications = true",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                r.into_user()
                    .map_err(|e| crate::error::StoreError::Permanent(format!("decoding user row: {e}")))
            })
            .collect()
    }

    async fn get_user_by_token(&self, token: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE auth_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            r.into_user()
                .map_err(|e| crate::error::StoreError::Permanent(format!("decoding user row: {e}")))
        })
        .transpose()
    }
}
