//! Sensor Ingestor (spec.md §4.4 "Sensor Ingestor (C4)"): turns a
//! validated frame into a persisted reading, a presence touch, a
//! best-effort broadcast, and a hand-off to the Alert Engine.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use hydrosense_alerts::AlertEngine;
use hydrosense_protocol::sensor::{SensorReading, ValidatedFrame};
use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_store::{Store, StoreError};

/// Delay before each retry of a Transient store failure (spec.md §4.4
/// "retries append_sensor_reading up to 3 times with 100ms/500ms/2s
/// backoff before dropping the reading").
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(500),
    Duration::from_secs(2),
];

pub struct Ingestor {
    store: Arc<dyn Store>,
    events: tokio::sync::broadcast::Sender<WsEvent>,
    alerts: Arc<AlertEngine>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn Store>,
        events: tokio::sync::broadcast::Sender<WsEvent>,
        alerts: Arc<AlertEngine>,
    ) -> Self {
        Self {
            store,
            events,
            alerts,
        }
    }

    /// Persist a validated frame and drive its downstream effects. The
    /// device is assumed to already exist (the Gateway synthesizes it
    /// first) — a `NotFound` here is a Permanent failure, not retried.
    pub async fn ingest(&self, device_id: &str, frame: ValidatedFrame, now: DateTime<Utc>) {
        let reading = SensorReading::from_validated(device_id, frame);

        if let Err(e) = self.append_with_retry(&reading).await {
            tracing::error!(error = %e, device_id, "dropping sensor reading after exhausting retries");
            return;
        }

        if let Err(e) = self.store.update_last_seen_only(device_id, now).await {
            tracing::warn!(error = %e, device_id, "failed to update last_seen after ingest");
        }

        let _ = self.events.send(WsEvent::SensorData {
            device_id: device_id.to_string(),
            reading: reading.clone(),
            timestamp: now,
        });

        if reading.has_invalid_sensor() {
            tracing::debug!(device_id, "reading carries an invalid-flagged sensor, skipping alert evaluation");
            return;
        }

        let device = match self.store.get_device_by_id(device_id).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                tracing::error!(device_id, "device vanished between ingest and alert evaluation");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, device_id, "failed to load device for alert evaluation");
                return;
            }
        };

        if let Err(e) = self.alerts.evaluate_frame(&device, &reading, now).await {
            tracing::error!(error = %e, device_id, "alert evaluation failed");
        }
    }

    async fn append_with_retry(&self, reading: &SensorReading) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            match self.store.append_sensor_reading(reading).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Transient(_)) if attempt < RETRY_DELAYS.len() => {
                    tokio::time::sleep(RETRY_DELAYS[attempt]).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrosense_alerts::AlertConfig;
    use hydrosense_notify::{MockSmtpSender, NotificationQueue, NotifyConfig, QueueNotifier};
    use hydrosense_protocol::device::RegisterPayload;
    use hydrosense_store::MemoryStore;

    fn notify_config() -> NotifyConfig {
        NotifyConfig {
            queue_capacity: 16,
            batch_size: 10,
            batch_interval_secs: 1,
            max_retries: 3,
            backoff_base_secs: 1,
            backoff_cap_secs: 30,
            pool_max_connections: 5,
            smtp_host: "localhost".into(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_address: "alerts@hydrosense.example".into(),
        }
    }

    fn validated(ph: Option<f64>) -> ValidatedFrame {
        ValidatedFrame {
            ph,
            tds: Some(300.0),
            turbidity: Some(1.0),
            ph_valid: true,
            tds_valid: true,
            turbidity_valid: true,
            timestamp: Utc::now(),
        }
    }

    async fn harness() -> (Arc<MemoryStore>, Ingestor, tokio::sync::broadcast::Receiver<WsEvent>) {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .upsert_device_on_registration("tank-01", &RegisterPayload::default(), now)
            .await
            .unwrap();

        let (events, rx) = tokio::sync::broadcast::channel(16);
        let sender = Arc::new(MockSmtpSender::new());
        let queue = NotificationQueue::spawn(notify_config(), sender);
        let notifier = Arc::new(QueueNotifier::new(store.clone(), queue));
        let alerts = Arc::new(AlertEngine::new(
            store.clone(),
            events.clone(),
            notifier,
            AlertConfig::default(),
        ));
        let ingestor = Ingestor::new(store.clone(), events.clone(), alerts);
        (store, ingestor, rx)
    }

    #[tokio::test]
    async fn ingest_persists_reading_and_broadcasts_sensor_data() {
        let (store, ingestor, mut rx) = harness().await;
        let now = Utc::now();
        ingestor.ingest("tank-01", validated(Some(7.0)), now).await;

        let reading = store.get_latest_reading("tank-01").await.unwrap().unwrap();
        assert_eq!(reading.ph, Some(7.0));
        assert!(matches!(rx.try_recv().unwrap(), WsEvent::SensorData { .. }));
    }

    #[tokio::test]
    async fn invalid_flagged_sensor_skips_alert_evaluation() {
        let (store, ingestor, mut rx) = harness().await;
        let mut frame = validated(Some(5.0));
        frame.ph_valid = false;
        frame.ph = None;
        ingestor.ingest("tank-01", frame, Utc::now()).await;

        assert!(matches!(rx.try_recv().unwrap(), WsEvent::SensorData { .. }));
        assert!(rx.try_recv().is_err());
        assert!(
            store
                .find_open_alert("tank-01", hydrosense_protocol::alert::Parameter::Ph)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn valid_breach_reaches_alert_engine() {
        let (store, ingestor, mut rx) = harness().await;
        ingestor.ingest("tank-01", validated(Some(5.0)), Utc::now()).await;

        rx.try_recv().unwrap(); // SensorData
        assert!(matches!(rx.try_recv().unwrap(), WsEvent::AlertNew { .. }));
        assert!(
            store
                .find_open_alert("tank-01", hydrosense_protocol::alert::Parameter::Ph)
                .await
                .unwrap()
                .is_some()
        );
    }
}
