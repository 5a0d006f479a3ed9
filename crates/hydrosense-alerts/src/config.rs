use serde::{Deserialize, Serialize};

/// Alert Engine tunables (spec.md §6 "alert_auto_resolve_idle=10m").
///
/// §9 Open Questions flags `T_auto_resolve` as a policy choice with no
/// direct precedent in the source; we gate it behind this config so it
/// can be tuned or disabled (a very large value effectively requires
/// operator action instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_auto_resolve_idle_secs")]
    pub auto_resolve_idle_secs: i64,
}

fn default_auto_resolve_idle_secs() -> i64 {
    600
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            auto_resolve_idle_secs: default_auto_resolve_idle_secs(),
        }
    }
}

impl AlertConfig {
    pub fn auto_resolve_idle(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.auto_resolve_idle_secs)
    }
}
