use serde::{Deserialize, Serialize};

/// WebSocket Hub tunables (spec.md §4.7, §6 config knobs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
    /// Per-socket outbound queue depth before a subscriber is treated as
    /// slow and disconnected with `SLOW_CONSUMER` (spec.md §5, §6
    /// `send_buffer_high_water`). The spec expresses this as a byte
    /// bound; we approximate it with a message-count bound sized for a
    /// typical ~1KB event payload, noted in DESIGN.md.
    #[serde(default = "default_send_buffer_high_water")]
    pub send_buffer_high_water: usize,
}

fn default_ping_interval_secs() -> u64 {
    25
}

fn default_ping_timeout_secs() -> u64 {
    60
}

fn default_send_buffer_high_water() -> usize {
    256
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            send_buffer_high_water: default_send_buffer_high_water(),
        }
    }
}

impl WsConfig {
    pub fn ping_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ping_interval_secs)
    }

    pub fn ping_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ping_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = WsConfig::default();
        assert_eq!(config.ping_interval_secs, 25);
        assert_eq!(config.ping_timeout_secs, 60);
    }
}
