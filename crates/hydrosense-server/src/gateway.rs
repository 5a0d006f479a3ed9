//! MQTT Gateway (spec.md §4.2): classifies inbound broker publishes by
//! topic and routes each to the Sensor Ingestor, Presence Tracker, or
//! the registration path. Grounded on the teacher's
//! `mqtt_bridge.rs` classify-then-dispatch pattern, generalized from a
//! fixed topic vocabulary to the four shapes this domain subscribes to.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::Utc;
use rumqttc::{Event, Packet};
use serde_json::Value;
use tokio::sync::mpsc;

use hydrosense_protocol::device::RegisterPayload;
use hydrosense_protocol::sensor::{SensorFrame, validate_frame};
use hydrosense_protocol::topics::{self, TopicKind};
use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_presence::PresenceTracker;
use hydrosense_store::Store;

use crate::ingestor::Ingestor;

/// Bounds how much of a malformed payload is logged (spec.md §6 "a log
/// line that bounds payload to 500 bytes").
const PAYLOAD_PREVIEW_BYTES: usize = 500;

/// Fixed pool of per-device worker slots (spec.md §5 "hashing the
/// deviceId to a fixed worker slot (per-device serial, cross-device
/// parallel)"). Every message for a given device always lands on the
/// same slot, so its handler tasks run strictly in broker-delivery
/// order; different devices land on different slots and run
/// concurrently.
const WORKER_SLOTS: usize = 8;

fn preview(payload: &[u8]) -> String {
    let bytes = &payload[..payload.len().min(PAYLOAD_PREVIEW_BYTES)];
    String::from_utf8_lossy(bytes).into_owned()
}

fn slot_for(key: &str) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % WORKER_SLOTS
}

/// A single in-flight publish, queued onto its device's worker slot.
struct Job {
    topic: String,
    payload: Vec<u8>,
}

pub struct Gateway {
    slots: Vec<mpsc::UnboundedSender<Job>>,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn Store>,
        presence: Arc<PresenceTracker>,
        ingestor: Arc<Ingestor>,
        events: tokio::sync::broadcast::Sender<WsEvent>,
    ) -> Self {
        let handler = GatewayHandler {
            store,
            presence,
            ingestor,
            events,
        };

        let slots = (0..WORKER_SLOTS)
            .map(|_| {
                let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
                let handler = handler.clone();
                tokio::spawn(async move {
                    while let Some(job) = rx.recv().await {
                        handler.handle_publish(&job.topic, &job.payload).await;
                    }
                });
                tx
            })
            .collect();

        Self { slots }
    }

    /// Handle one `rumqttc` event. Non-publish events (ConnAck, SubAck,
    /// PingResp, ...) are ignored. A handler failure is logged and
    /// never propagated — a single bad message must not kill the
    /// subscription (spec.md §4.2 "Failure semantics").
    pub fn handle_event(&self, event: Event) {
        if let Event::Incoming(Packet::Publish(publish)) = event {
            let key = routing_key(&publish.topic, &publish.payload);
            let slot = &self.slots[slot_for(&key)];
            let _ = slot.send(Job {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            });
        }
    }
}

/// The key used to pick a worker slot: the device id extracted from
/// the topic, or — for `presence/response`, which carries no device id
/// in the topic — a best-effort peek at the body's `deviceId` field.
/// Malformed bodies fall back to the raw topic so they still land
/// somewhere deterministic and get dropped inside the handler.
fn routing_key(topic: &str, payload: &[u8]) -> String {
    match topics::parse_topic(topic) {
        Some(topics::ParsedTopic { device_id: Some(id), .. }) => id,
        Some(topics::ParsedTopic { device_id: None, .. }) => serde_json::from_slice::<Value>(payload)
            .ok()
            .and_then(|v| v.get("deviceId").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| topic.to_string()),
        None => topic.to_string(),
    }
}

/// Owned clone of the Gateway's dependencies, shared by every worker
/// slot task (spec.md §5 "each incoming MQTT message is handled on a
/// bounded worker pool").
#[derive(Clone)]
struct GatewayHandler {
    store: Arc<dyn Store>,
    presence: Arc<PresenceTracker>,
    ingestor: Arc<Ingestor>,
    events: tokio::sync::broadcast::Sender<WsEvent>,
}

impl GatewayHandler {
    async fn handle_publish(&self, topic: &str, payload: &[u8]) {
        let Some(parsed) = topics::parse_topic(topic) else {
            tracing::debug!(topic, "ignoring unknown mqtt topic");
            return;
        };

        match parsed.kind {
            TopicKind::Data => {
                let Some(device_id) = parsed.device_id else { return };
                self.handle_data(&device_id, payload).await;
            }
            TopicKind::Register => {
                let Some(device_id) = parsed.device_id else { return };
                self.handle_register(&device_id, payload).await;
            }
            TopicKind::Presence => {
                let Some(device_id) = parsed.device_id else { return };
                self.handle_presence(&device_id).await;
            }
            TopicKind::PresenceResponse => {
                self.handle_presence_response(payload).await;
            }
        }
    }

    async fn handle_data(&self, device_id: &str, payload: &[u8]) {
        let frame: SensorFrame = match serde_json::from_slice(payload) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, device_id, payload = %preview(payload), "malformed sensor frame, dropping");
                return;
            }
        };

        let now = Utc::now();
        let validated = match validate_frame(&frame, now) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, device_id, "sensor frame failed validation, dropping");
                return;
            }
        };

        // Unknown device: synthesize a registration and re-enter
        // (spec.md §4.2 "If deviceId is unknown, the Gateway
        // synthesizes a registration ... and re-enters the ingestion
        // path; if this too fails, the frame is dropped").
        if let Err(e) = self
            .store
            .ensure_device(device_id, &hydrosense_protocol::device::default_sensors(), now)
            .await
        {
            tracing::error!(error = %e, device_id, "failed to synthesize registration, dropping frame");
            return;
        }

        self.ingestor.ingest(device_id, validated, now).await;
    }

    async fn handle_register(&self, device_id: &str, payload: &[u8]) {
        let register: RegisterPayload = match serde_json::from_slice(payload) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, device_id, payload = %preview(payload), "malformed registration, dropping");
                return;
            }
        };

        let now = Utc::now();
        let previous = self.store.get_device_by_id(device_id).await.ok().flatten();
        match self.store.upsert_device_on_registration(device_id, &register, now).await {
            Ok(device) => {
                let became_active = previous.map(|p| !p.is_registered).unwrap_or(true);
                if became_active {
                    let _ = self.events.send(WsEvent::DeviceStatus {
                        device_id: device.device_id.clone(),
                        status: device.status,
                        timestamp: now,
                    });
                }
            }
            Err(e) => {
                tracing::error!(error = %e, device_id, "failed to persist device registration");
            }
        }
    }

    async fn handle_presence(&self, device_id: &str) {
        let now = Utc::now();
        if let Err(e) = self.presence.record_presence(device_id, now).await {
            tracing::error!(error = %e, device_id, "failed to record presence announcement");
        }
    }

    async fn handle_presence_response(&self, payload: &[u8]) {
        let body: Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, payload = %preview(payload), "malformed presence response, dropping");
                return;
            }
        };

        let Some(device_id) = body.get("deviceId").and_then(Value::as_str) else {
            tracing::warn!(payload = %preview(payload), "presence response missing deviceId, dropping");
            return;
        };

        let now = Utc::now();
        if let Err(e) = self.presence.record_presence(device_id, now).await {
            tracing::error!(error = %e, device_id, "failed to record presence response");
        }
    }
}
