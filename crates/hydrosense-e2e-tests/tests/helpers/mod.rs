//! Shared test harness for end-to-end integration tests.
//!
//! Wires the real MQTT Gateway, Presence Tracker, Sensor Ingestor,
//! Alert Engine and Notification Queue against `MemoryStore` and
//! `MockChannel`, exercising the actual cross-crate code paths without
//! a live broker, database, or SMTP relay.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{DateTime, Utc};
use rumqttc::{Event, Packet, Publish, QoS};
use tokio::sync::broadcast;
use uuid::Uuid;

use hydrosense_alerts::{AlertConfig, AlertEngine};
use hydrosense_mqtt::{Channel, MockChannel};
use hydrosense_notify::{MockSmtpSender, NotificationQueue, NotifyConfig, QueueNotifier};
use hydrosense_presence::{PresenceConfig, PresenceTracker};
use hydrosense_protocol::alert::{Alert, AlertFilter, Parameter};
use hydrosense_protocol::commands::CommandPayload;
use hydrosense_protocol::device::Device;
use hydrosense_protocol::sensor::SensorReading;
use hydrosense_protocol::topics;
use hydrosense_protocol::user::{Role, User, UserStatus};
use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_server::dispatcher::Dispatcher;
use hydrosense_server::gateway::Gateway;
use hydrosense_server::ingestor::Ingestor;
use hydrosense_server::routes::build_router;
use hydrosense_server::state::AppState;
use hydrosense_store::MemoryStore;
use hydrosense_ws::{Hub, WsConfig};

/// End-to-end test harness wiring the ingestion/dispatch core against
/// in-memory adapters, the same way `hydrosense-server::main` wires it
/// against Postgres and a live broker.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub channel: Arc<MockChannel>,
    pub smtp: Arc<MockSmtpSender>,
    pub gateway: Arc<Gateway>,
    pub presence: Arc<PresenceTracker>,
    pub dispatcher: Dispatcher,
    pub hub: Arc<Hub>,
    pub router: Router,
    events: broadcast::Sender<WsEvent>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_configs(AlertConfig::default(), PresenceConfig::default())
    }

    pub fn with_configs(alert_config: AlertConfig, presence_config: PresenceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(MockChannel::new());
        let (events, _rx) = broadcast::channel(1024);

        let smtp = Arc::new(MockSmtpSender::new());
        let notify_queue = NotificationQueue::spawn(notify_config(), smtp.clone());
        let notifier = Arc::new(QueueNotifier::new(store.clone(), notify_queue));

        let alert_engine = Arc::new(AlertEngine::new(
            store.clone(),
            events.clone(),
            notifier,
            alert_config,
        ));
        let presence = Arc::new(PresenceTracker::new(store.clone(), events.clone(), presence_config));
        let ingestor = Arc::new(Ingestor::new(store.clone(), events.clone(), alert_engine));
        let gateway = Arc::new(Gateway::new(store.clone(), presence.clone(), ingestor, events.clone()));
        let dispatcher = Dispatcher::new(channel.clone() as Arc<dyn Channel>);
        let hub = Hub::new(WsConfig::default());

        let router = build_router(AppState {
            store: store.clone() as Arc<dyn hydrosense_store::Store>,
            channel: channel.clone() as Arc<dyn Channel>,
            events: events.clone(),
            hub: hub.clone(),
        });

        Self {
            store,
            channel,
            smtp,
            gateway,
            presence,
            dispatcher,
            hub,
            router,
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WsEvent> {
        self.events.subscribe()
    }

    /// Spawn the Hub's event-bus drive loop, the way `main` wires it at
    /// startup. Only the tests that exercise room fan-out need it running.
    pub fn start_hub(&self) {
        let hub = self.hub.clone();
        let rx = self.subscribe_events();
        tokio::spawn(async move { hub.run(rx).await });
    }

    /// Inject a simulated broker publish and give the gateway's worker
    /// slot task time to run it to completion.
    pub async fn publish(&self, topic: &str, payload: &[u8]) {
        let publish = Publish::new(topic, QoS::AtLeastOnce, payload.to_vec());
        self.gateway
            .handle_event(Event::Incoming(Packet::Publish(publish)));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    pub async fn publish_json(&self, topic: &str, body: serde_json::Value) {
        self.publish(topic, serde_json::to_vec(&body).unwrap().as_slice())
            .await;
    }

    pub async fn publish_data(&self, device_id: &str, frame: serde_json::Value) {
        self.publish_json(&topics::device_data(device_id), frame).await;
    }

    pub async fn publish_register(&self, device_id: &str, payload: serde_json::Value) {
        self.publish_json(&topics::device_register(device_id), payload)
            .await;
    }

    pub async fn publish_presence(&self, device_id: &str) {
        self.publish(&topics::device_presence(device_id), b"{}").await;
    }

    pub async fn publish_presence_response(&self, device_id: &str) {
        self.publish_json(
            topics::PRESENCE_RESPONSE,
            serde_json::json!({ "deviceId": device_id }),
        )
        .await;
    }

    pub async fn sweep_presence(&self, now: DateTime<Utc>) -> usize {
        self.presence.sweep(now).await.unwrap()
    }

    pub async fn device(&self, device_id: &str) -> Option<Device> {
        self.store.get_device_by_id(device_id).await.unwrap()
    }

    pub async fn latest_reading(&self, device_id: &str) -> Option<SensorReading> {
        self.store.get_latest_reading(device_id).await.unwrap()
    }

    pub async fn open_alert(&self, device_id: &str, parameter: Parameter) -> Option<Alert> {
        self.store.find_open_alert(device_id, parameter).await.unwrap()
    }

    pub async fn list_alerts(&self) -> Vec<Alert> {
        self.store.list_alerts(&AlertFilter::default()).await.unwrap()
    }

    /// Seed an active, email-eligible staff user directly into the store.
    pub fn seed_staff_user(&self, email: &str, token: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            auth_token: token.to_string(),
            role: Role::Staff,
            status: UserStatus::Active,
            email_notifications: true,
        };
        self.store.seed_user(user.clone());
        user
    }

    pub async fn dispatch_command(&self, device_id: &str, command: &CommandPayload) {
        self.dispatcher
            .publish_command(device_id, command)
            .await
            .unwrap();
    }

    /// Give the notification queue's drain worker a chance to run.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
}

fn notify_config() -> NotifyConfig {
    NotifyConfig {
        queue_capacity: 64,
        batch_size: 10,
        batch_interval_secs: 0,
        max_retries: 2,
        backoff_base_secs: 0,
        backoff_cap_secs: 0,
        pool_max_connections: 5,
        smtp_host: "localhost".into(),
        smtp_port: 587,
        smtp_username: None,
        smtp_password: None,
        from_address: "alerts@hydrosense.example".into(),
    }
}
