//! Server configuration: HTTP bind address, database URL, and the
//! embedded tunables for every subsystem (spec.md §6 "Config knobs").

use serde::Deserialize;

use hydrosense_alerts::AlertConfig;
use hydrosense_mqtt::MqttConfig;
use hydrosense_notify::NotifyConfig;
use hydrosense_presence::PresenceConfig;
use hydrosense_ws::WsConfig;

/// Top-level server configuration, loaded from environment at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database_url: String,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    pub notify: NotifyConfig,
    #[serde(default)]
    pub ws: WsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Error loading configuration from the environment (spec.md §6 "Exit
/// codes" — a missing critical value here is Fatal, exit code 1).
#[derive(Debug, thiserror::Error)]
#[error("missing required environment variable: {0}")]
pub struct ConfigError(pub &'static str);

fn require_env(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError(key))
}

impl ServerConfig {
    /// Load config from environment variables. Missing `DATABASE_URL`,
    /// `SMTP_HOST`, or `ALERT_FROM_ADDRESS` is a Fatal startup error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| default_host()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_port),
            database_url: require_env("DATABASE_URL")?,
            mqtt: MqttConfig::from_env().map_err(|_| ConfigError("MQTT_BROKER_HOST"))?,
            presence: PresenceConfig::default(),
            alerts: AlertConfig::default(),
            notify: NotifyConfig {
                queue_capacity: 1024,
                batch_size: 10,
                batch_interval_secs: 1,
                max_retries: 3,
                backoff_base_secs: 1,
                backoff_cap_secs: 30,
                pool_max_connections: 5,
                smtp_host: require_env("SMTP_HOST")?,
                smtp_port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(587),
                smtp_username: std::env::var("SMTP_USERNAME").ok(),
                smtp_password: std::env::var("SMTP_PASSWORD").ok(),
                from_address: require_env("ALERT_FROM_ADDRESS")?,
            },
            ws: WsConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host_and_port() {
        assert_eq!(default_host(), "0.0.0.0");
        assert_eq!(default_port(), 3000);
    }
}
