// Client configuration file: `~/.hangwire/config.toml`.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Active duration requested from the server on each set-active call.
pub const ACTIVE_TIMEOUT_SECS: u32 = 120;
/// Minimum spacing between set-active requests while already active.
pub const SET_ACTIVE_LIMIT_SECS: u64 = 60;
/// Upper bound on a resync response.
pub const MAX_RESPONSE_SIZE_BYTES: u64 = 1_048_576;

const DEFAULT_CHANNEL_SERVICES: &[&str] = &["babel", "babel_presence_last_seen"];

/// Root directory for client state: `~/.hangwire/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".hangwire"))
}

pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Byte limit sent with "sync all new events".
    pub max_response_size_bytes: u64,
    /// Seconds the server should keep this client active.
    pub active_timeout_secs: u32,
    /// Cooldown before an already-active client asks again.
    pub set_active_limit_secs: u64,
    /// Channel services registered once a client id arrives.
    pub channel_services: Vec<String>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Capacity of the runtime's inbound channel-event queue.
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_response_size_bytes: MAX_RESPONSE_SIZE_BYTES,
            active_timeout_secs: ACTIVE_TIMEOUT_SECS,
            set_active_limit_secs: SET_ACTIVE_LIMIT_SECS,
            channel_services: DEFAULT_CHANNEL_SERVICES.iter().map(|s| s.to_string()).collect(),
            log_filter: "info".into(),
            event_channel_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Load from `~/.hangwire/config.toml`, falling back to defaults.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn set_active_limit(&self) -> TimeDelta {
        i64::try_from(self.set_active_limit_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
