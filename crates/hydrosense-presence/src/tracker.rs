use std::sync::Arc;

use chrono::{DateTime, Utc};
use rumqttc::QoS;
use tokio::sync::broadcast;

use hydrosense_mqtt::Channel;
use hydrosense_protocol::device::{DeviceStatus, SensorKind};
use hydrosense_protocol::topics;
use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_store::{Store, StoreResult};

use crate::config::PresenceConfig;

/// Drives the `who_is_online` ping-pong and offline sweep (spec.md §4.3).
///
/// Holds no per-device state of its own beyond what `Store` persists —
/// `lastPollAt` lives only for logging; liveness truth is `lastSeen` on
/// the device record, compared against `offline_threshold` at each sweep.
pub struct PresenceTracker {
    store: Arc<dyn Store>,
    events: broadcast::Sender<WsEvent>,
    config: PresenceConfig,
}

impl PresenceTracker {
    pub fn new(
        store: Arc<dyn Store>,
        events: broadcast::Sender<WsEvent>,
        config: PresenceConfig,
    ) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// Handle a presence signal: a `devices/<id>/presence` announcement or
    /// a `presence/response` to the broadcast poll. Creates the device
    /// record (unregistered) if this is the first signal ever seen for it.
    pub async fn record_presence(&self, device_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let device = self
            .store
            .ensure_device(device_id, &[SensorKind::Ph, SensorKind::Tds, SensorKind::Turbidity], now)
            .await?;

        // Every presence signal is itself a heartbeat (spec.md §4.7, §6
        // "device:heartbeat"), independent of whether it also causes a
        // status transition below.
        let _ = self.events.send(WsEvent::DeviceHeartbeat {
            device_id: device_id.to_string(),
            timestamp: now,
        });

        if device.status == DeviceStatus::Maintenance {
            // Sticky: presence updates lastSeen but never clobbers Maintenance.
            self.store.update_last_seen_only(device_id, now).await?;
            return Ok(());
        }

        if device.status != DeviceStatus::Online {
            self.store
                .update_device_status(device_id, DeviceStatus::Online, now)
                .await?;
            let _ = self.events.send(WsEvent::DeviceStatus {
                device_id: device_id.to_string(),
                status: DeviceStatus::Online,
                timestamp: now,
            });
        } else {
            self.store.update_last_seen_only(device_id, now).await?;
        }
        Ok(())
    }

    /// Demote any device whose `lastSeen` has aged past the offline
    /// threshold. Returns the number of devices transitioned. Maintenance
    /// devices and already-Offline devices are left untouched.
    pub async fn sweep(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let devices = self
            .store
            .list_devices(&hydrosense_protocol::device::DeviceFilter::default())
            .await?;
        let threshold = self.config.offline_threshold();

        let mut transitioned = 0;
        for device in devices {
            if matches!(device.status, DeviceStatus::Maintenance | DeviceStatus::Offline) {
                continue;
            }
            if now - device.last_seen >= threshold {
                self.store
                    .update_device_status(&device.device_id, DeviceStatus::Offline, now)
                    .await?;
                let _ = self.events.send(WsEvent::DeviceStatus {
                    device_id: device.device_id.clone(),
                    status: DeviceStatus::Offline,
                    timestamp: now,
                });
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }

    /// Run the poll/sweep loop forever: publish `who_is_online`, then
    /// sweep for devices that have aged out. A publish or sweep failure
    /// is logged and never kills the loop (spec.md §4.8 "catches all
    /// exceptions inside the tick body").
    pub async fn run(&self, channel: Arc<dyn Channel>) -> ! {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        loop {
            interval.tick().await;
            if let Err(e) = channel.publish(topics::WHO_IS_ONLINE, b"{}", QoS::AtLeastOnce).await {
                tracing::error!(error = %e, "failed to publish who_is_online poll");
            }
            let now = Utc::now();
            match self.sweep(now).await {
                Ok(n) if n > 0 => tracing::info!(count = n, "presence sweep marked devices offline"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "presence sweep failed"),
            }
        }
    }
}
