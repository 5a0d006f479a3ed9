use serde::Deserialize;

/// MQTT connection configuration, loadable from TOML or environment.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// MQTT broker hostname.
    pub broker_host: String,
    /// MQTT broker port (default 1883 plaintext, 8883 TLS).
    #[serde(default = "default_port")]
    pub broker_port: u16,
    /// MQTT client ID for this server process.
    pub client_id: String,
    /// Enable TLS. When false, connects plaintext (local dev / mosquitto).
    #[serde(default)]
    pub use_tls: bool,
    /// Broker username, if the deployment requires one.
    #[serde(default)]
    pub username: Option<String>,
    /// Broker password, if the deployment requires one.
    #[serde(default)]
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// Bounded connection timeout at startup (spec.md §4.2).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// QoS for all subscriptions and publishes (spec.md §6, `mqtt_qos`).
    #[serde(default = "default_qos")]
    pub qos: u8,
    /// Reconnect backoff base (spec.md §4.2, `reconnect_base`).
    #[serde(default = "default_reconnect_base")]
    pub reconnect_base_secs: u64,
    /// Reconnect backoff cap (spec.md §4.2, `reconnect_cap`).
    #[serde(default = "default_reconnect_cap")]
    pub reconnect_cap_secs: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_keepalive() -> u16 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_qos() -> u8 {
    1
}

fn default_reconnect_base() -> u64 {
    1
}

fn default_reconnect_cap() -> u64 {
    60
}

impl MqttConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            broker_host: std::env::var("MQTT_BROKER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            broker_port: std::env::var("MQTT_BROKER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_port),
            client_id: std::env::var("MQTT_CLIENT_ID")
                .unwrap_or_else(|_| "hydrosense-server".to_string()),
            use_tls: std::env::var("MQTT_USE_TLS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            username: std::env::var("MQTT_USERNAME").ok(),
            password: std::env::var("MQTT_PASSWORD").ok(),
            keepalive_secs: default_keepalive(),
            connect_timeout_secs: default_connect_timeout(),
            qos: default_qos(),
            reconnect_base_secs: default_reconnect_base(),
            reconnect_cap_secs: default_reconnect_cap(),
        })
    }
}
