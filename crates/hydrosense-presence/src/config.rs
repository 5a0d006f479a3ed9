use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Poll cadence and offline threshold (spec.md §4.3, §6 config knobs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_offline_threshold_secs")]
    pub offline_threshold_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_offline_threshold_secs() -> u64 {
    90
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            offline_threshold_secs: default_offline_threshold_secs(),
        }
    }
}

impl PresenceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn offline_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.offline_threshold_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = PresenceConfig::default();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.offline_threshold_secs, 90);
    }
}
