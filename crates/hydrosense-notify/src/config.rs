use serde::{Deserialize, Serialize};

/// Notification Queue tunables (spec.md §6 config knobs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_interval_secs")]
    pub batch_interval_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    #[serde(default = "default_pool_max_connections")]
    pub pool_max_connections: u32,
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
}

fn default_queue_capacity() -> usize {
    1024
}
fn default_batch_size() -> usize {
    10
}
fn default_batch_interval_secs() -> u64 {
    1
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_secs() -> u64 {
    1
}
fn default_backoff_cap_secs() -> u64 {
    30
}
fn default_pool_max_connections() -> u32 {
    5
}
fn default_smtp_port() -> u16 {
    587
}

impl NotifyConfig {
    pub fn backoff_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let secs = self.backoff_base_secs.saturating_mul(1u64 << attempt.min(16));
        std::time::Duration::from_secs(secs.min(self.backoff_cap_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let config = NotifyConfig {
            queue_capacity: 1,
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
        };
        assert_eq!(config.backoff_for_attempt(0).as_secs(), 1);
        assert_eq!(config.backoff_for_attempt(1).as_secs(), 2);
        assert_eq!(config.backoff_for_attempt(2).as_secs(), 4);
        assert_eq!(config.backoff_for_attempt(10).as_secs(), 30);
    }
}
