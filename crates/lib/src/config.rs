//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.bridge/config.json`) and environment.
//! Only the Matrix account is configured here; other adapters add their own section.

use crate::adapter::ChannelInfo;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Matrix account settings.
    #[serde(default)]
    pub matrix: MatrixConfig,
}

/// Matrix account: homeserver, credentials, bridged rooms, and sync tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixConfig {
    /// Account id stamped on every inbound gateway message (default "matrix").
    #[serde(default = "default_account")]
    pub account: String,

    /// Homeserver base URL, e.g. "https://matrix.org".
    #[serde(default)]
    pub server: String,

    /// Login user (localpart or full user id).
    #[serde(default)]
    pub login: String,

    /// Password. Overridden by MATRIX_PASSWORD env.
    pub password: Option<String>,

    /// When true, "@alice:example.org" is bridged as "alice" instead of "alice:example.org".
    #[serde(default)]
    pub no_home_server_suffix: bool,

    /// Rooms to join on startup (room id or alias), each bridged under its own name.
    #[serde(default)]
    pub channels: Vec<ChannelInfo>,

    /// Server-side long-poll timeout for /sync, in seconds (default 30).
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    /// Client-side timeout per request, in seconds (default 60). /sync gets this on top of syncTimeoutSecs.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Drop the events returned by the first sync so a restart does not replay room history (default true).
    #[serde(default = "default_true")]
    pub skip_initial_backlog: bool,

    /// Directory for the Matrix client's sqlite state and crypto store (keeps encryption keys
    /// across restarts). In-memory when unset.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Retry pacing after a failed sync.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Exponential backoff with jitter for the sync loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,
    /// Fraction (0.0 to 1.0) of each delay randomized up or down.
    #[serde(default = "default_backoff_jitter")]
    pub jitter: f64,
}

fn default_account() -> String {
    "matrix".to_string()
}

fn default_sync_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_backoff_initial_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_backoff_jitter() -> f64 {
    0.2
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            account: default_account(),
            server: String::new(),
            login: String::new(),
            password: None,
            no_home_server_suffix: false,
            channels: Vec::new(),
            sync_timeout_secs: default_sync_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            skip_initial_backlog: true,
            store_path: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_backoff_initial_ms(),
            max_ms: default_backoff_max_ms(),
            multiplier: default_backoff_multiplier(),
            jitter: default_backoff_jitter(),
        }
    }
}

/// Resolve the Matrix password: env MATRIX_PASSWORD overrides config.
pub fn resolve_matrix_password(config: &Config) -> Option<String> {
    password_from(std::env::var("MATRIX_PASSWORD").ok(), config)
}

fn password_from(env: Option<String>, config: &Config) -> Option<String> {
    env.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
    .or_else(|| {
        config
            .matrix
            .password
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("BRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".bridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, the default path, or BRIDGE_CONFIG_PATH. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_defaults() {
        let m = MatrixConfig::default();
        assert_eq!(m.account, "matrix");
        assert_eq!(m.sync_timeout_secs, 30);
        assert_eq!(m.request_timeout_secs, 60);
        assert!(m.skip_initial_backlog);
        assert!(!m.no_home_server_suffix);
        assert_eq!(m.store_path, None);
        assert_eq!(m.backoff.initial_ms, 500);
    }

    #[test]
    fn parses_camel_case_matrix_section() {
        let s = r##"{
            "matrix": {
                "account": "matrix.home",
                "server": "https://matrix.example.org",
                "login": "bridgebot",
                "password": "secret",
                "noHomeServerSuffix": true,
                "channels": [{ "name": "#general:example.org" }],
                "storePath": "/var/lib/bridge/matrix",
                "backoff": { "maxMs": 1000 }
            }
        }"##;
        let config: Config = serde_json::from_str(s).unwrap();
        let m = &config.matrix;
        assert_eq!(m.account, "matrix.home");
        assert!(m.no_home_server_suffix);
        assert_eq!(m.channels, vec![ChannelInfo::new("#general:example.org")]);
        assert_eq!(m.store_path, Some(PathBuf::from("/var/lib/bridge/matrix")));
        assert_eq!(m.backoff.max_ms, 1000);
        assert_eq!(m.backoff.initial_ms, 500);
        assert_eq!(m.sync_timeout_secs, 30);
    }

    #[test]
    fn env_password_overrides_config() {
        let mut config = Config::default();
        config.matrix.password = Some(" fromfile ".to_string());
        assert_eq!(password_from(None, &config).as_deref(), Some("fromfile"));
        assert_eq!(
            password_from(Some("fromenv".to_string()), &config).as_deref(),
            Some("fromenv")
        );
        assert_eq!(
            password_from(Some("   ".to_string()), &config).as_deref(),
            Some("fromfile")
        );
    }

    #[test]
    fn load_config_missing_file_gives_defaults() {
        let path = std::env::temp_dir()
            .join(format!("bridge-config-test-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert!(config.matrix.channels.is_empty());
    }

    #[test]
    fn load_config_reads_file() {
        let dir = std::env::temp_dir().join(format!("bridge-config-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"matrix":{"server":"http://localhost:8008"}}"#).unwrap();
        let (config, _) = load_config(Some(path)).unwrap();
        assert_eq!(config.matrix.server, "http://localhost:8008");
        let _ = std::fs::remove_dir_all(dir);
    }
}
