// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration: TOML file with environment overrides.
//!
//! Resolution order: `PYLON_CONFIG` (explicit path) > `./pylon.toml` if
//! present > built-in defaults. Individual `PYLON_*` variables override
//! whatever the file said.

use crate::app::AppError;
use serde::Deserialize;
use std::path::Path;

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_user_db() -> String {
    "user.db".to_string()
}

fn default_race_db() -> String {
    "race.db".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "pylon".to_string()
}

fn default_heartbeat_secs() -> u64 {
    5
}

fn default_hash_workers() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP listener binds.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// User database file, or ":memory:".
    #[serde(default = "default_user_db")]
    pub user_db: String,
    /// Race database file, or ":memory:".
    #[serde(default = "default_race_db")]
    pub race_db: String,
    /// Username the bootstrap guarantees exists.
    #[serde(default = "default_username")]
    pub default_username: String,
    /// Initial password for the bootstrap user (reset is forced on first
    /// login).
    #[serde(default = "default_password")]
    pub default_password: String,
    /// Seconds between websocket heartbeats.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Concurrent password-hashing workers.
    #[serde(default = "default_hash_workers")]
    pub hash_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            user_db: default_user_db(),
            race_db: default_race_db(),
            default_username: default_username(),
            default_password: default_password(),
            heartbeat_secs: default_heartbeat_secs(),
            hash_workers: default_hash_workers(),
        }
    }
}

impl Config {
    /// Load from disk and the environment.
    pub fn load() -> Result<Self, AppError> {
        let mut config = match std::env::var("PYLON_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new("pylon.toml").exists() => Self::from_file(Path::new("pylon.toml"))?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| AppError::Config(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PYLON_LISTEN") {
            self.listen = v;
        }
        if let Ok(v) = std::env::var("PYLON_USER_DB") {
            self.user_db = v;
        }
        if let Ok(v) = std::env::var("PYLON_RACE_DB") {
            self.race_db = v;
        }
        if let Ok(v) = std::env::var("PYLON_DEFAULT_USERNAME") {
            self.default_username = v;
        }
        if let Ok(v) = std::env::var("PYLON_DEFAULT_PASSWORD") {
            self.default_password = v;
        }
        if let Some(v) = env_parse("PYLON_HEARTBEAT_SECS") {
            self.heartbeat_secs = v;
        }
        if let Some(v) = env_parse("PYLON_HASH_WORKERS") {
            self.hash_workers = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
