use std::{env, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_URL: &str = "ws://localhost:8000/ws";
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_ANALYSIS_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// What `send` does while the channel is not open.
///
/// The observed client drops the frame (callers check state first); `Queue`
/// buffers outbound frames until the next reconnect instead.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfflinePolicy {
    #[default]
    Drop,
    Queue,
}

/// Tunables for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EngineConfig {
    /// Analysis service websocket URL.
    pub url: String,
    /// Quiescence window before an edit is dispatched.
    pub debounce_ms: u64,
    /// How long a request may wait for its reply. The upstream history
    /// disagrees on the value (5s vs 10s revisions), so it stays a parameter.
    pub analysis_timeout_ms: u64,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay_ms: u64,
    pub offline_policy: OfflinePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            analysis_timeout_ms: DEFAULT_ANALYSIS_TIMEOUT_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            offline_policy: OfflinePolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `DRAFTLENS_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = env::var("DRAFTLENS_WS_URL") {
            cfg.url = url;
        }
        if let Some(ms) = env_ms("DRAFTLENS_DEBOUNCE_MS") {
            cfg.debounce_ms = ms;
        }
        if let Some(ms) = env_ms("DRAFTLENS_ANALYSIS_TIMEOUT_MS") {
            cfg.analysis_timeout_ms = ms;
        }
        if let Some(ms) = env_ms("DRAFTLENS_RECONNECT_DELAY_MS") {
            cfg.reconnect_delay_ms = ms;
        }
        if let Ok(policy) = env::var("DRAFTLENS_OFFLINE_POLICY") {
            if policy.eq_ignore_ascii_case("queue") {
                cfg.offline_policy = OfflinePolicy::Queue;
            }
        }
        cfg
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

fn env_ms(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
