// ============================
// crates/relay-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level
    pub log_level: String,
    /// Capacity of each participant's outbound message channel
    pub outbox_capacity: usize,
    /// Maximum candidates buffered per match direction
    pub candidate_buffer_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
            log_level: "info".to_string(),
            outbox_capacity: 64,
            candidate_buffer_limit: 64,
        }
    }
}

impl Settings {
    /// Load settings from `pairlink.toml` and `PAIRLINK_`-prefixed
    /// environment variables, layered over the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from("pairlink.toml")
    }

    /// Load settings with an explicit config file path.
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PAIRLINK_"))
            .extract()?;

        Ok(settings)
    }
}
