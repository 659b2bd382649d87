//! `~/.wordchain/config.toml` loading.
//!
//! Every section is optional and every field has a default, so an absent or
//! empty file yields the stock configuration.
//!
//! ```toml
//! [store]
//! path = "${HOME}/.wordchain/words.db"
//! busy_timeout_ms = 5000
//!
//! [game]
//! start_word = "시작"
//! stall_alert_secs = 3600
//!
//! [bans]
//! auto_ban_threshold = 5
//! auto_ban_hours = 24
//!
//! [liveness]
//! window_size = 1000
//! max_passes = 10000
//! interval_secs = 0
//!
//! [ingest]
//! reconnect_backoff_secs = 3
//!
//! [audit]
//! queue_capacity = 1024
//!
//! [retry]
//! max_retries = 2
//! initial_delay_ms = 50
//! max_delay_ms = 500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "WORDCHAIN_CONFIG";

const DATA_DIR_NAME: &str = ".wordchain";

#[derive(Debug, Default, Deserialize)]
pub struct WordChainConfig {
    pub store: Option<StoreConfig>,
    pub game: Option<GameConfig>,
    pub bans: Option<BansConfig>,
    pub liveness: Option<LivenessConfig>,
    pub ingest: Option<IngestConfig>,
    pub audit: Option<AuditConfig>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. Supports `${VAR}` expansion and a leading `~/`.
    pub path: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Used when the dictionary has no playable word to start from.
    pub start_word: String,
    /// Alert once when the current word has not changed for this long.
    pub stall_alert_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_word: "시작".to_string(),
            stall_alert_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BansConfig {
    /// Auto-ban the game-over character when at most this many words start with it.
    pub auto_ban_threshold: u64,
    pub auto_ban_hours: u64,
}

impl Default for BansConfig {
    fn default() -> Self {
        Self {
            auto_ban_threshold: 5,
            auto_ban_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub window_size: u64,
    pub max_passes: u32,
    /// `0` disables the periodic runner.
    pub interval_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            window_size: 1000,
            max_passes: 10_000,
            interval_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub reconnect_backoff_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Backoff for transient store failures on the consume path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

impl WordChainConfig {
    /// Load from [`config_path`]. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Resolved database path.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.path.as_deref())
            .map(|raw| expand_path(&expand_env_vars(raw)))
            .unwrap_or_else(|| data_dir().join("words.db"))
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        let ms = self
            .store
            .as_ref()
            .and_then(|s| s.busy_timeout_ms)
            .unwrap_or(5_000);
        Duration::from_millis(ms)
    }

    #[must_use]
    pub fn game(&self) -> GameConfig {
        let mut game = self.game.clone().unwrap_or_default();
        game.start_word = expand_env_vars(&game.start_word).trim().to_string();
        if game.start_word.is_empty() {
            game.start_word = GameConfig::default().start_word;
        }
        game
    }

    #[must_use]
    pub fn bans(&self) -> BansConfig {
        self.bans.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn liveness(&self) -> LivenessConfig {
        let mut liveness = self.liveness.clone().unwrap_or_default();
        liveness.window_size = liveness.window_size.max(1);
        liveness.max_passes = liveness.max_passes.max(1);
        liveness
    }

    #[must_use]
    pub fn ingest(&self) -> IngestConfig {
        self.ingest.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn audit(&self) -> AuditConfig {
        let mut audit = self.audit.clone().unwrap_or_default();
        audit.queue_capacity = audit.queue_capacity.max(1);
        audit
    }

    #[must_use]
    pub fn retry(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}

/// Expand `${VAR}` references. Unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn expand_path(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

/// `~/.wordchain`, or `./.wordchain` when no home directory is known.
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME).join("config.toml"))
}
