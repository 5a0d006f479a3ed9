//! MQTT channel for the device fleet broker.
//!
//! Provides a typed MQTT abstraction for the ingestion core:
//! - `Channel` trait for publish/subscribe (mockable in tests)
//! - `MqttChannel` wrapping `rumqttc::AsyncClient`
//! - `MockChannel` for testing without a broker
//! - `drive_with_backoff` — the exponential-backoff event-loop driver

pub mod channel;
pub mod config;
pub mod error;
pub mod mock;
pub mod reconnect;

pub use channel::{Channel, MqttChannel};
pub use config::MqttConfig;
pub use error::{MqttError, MqttResult};
pub use mock::MockChannel;
pub use reconnect::{BackoffPolicy, drive_with_backoff};
