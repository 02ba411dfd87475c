// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "MACRO_TRACKER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/tracker.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
    pub stop_timeout_ms: u64,
    /// Fixed seed for the actual-value jitter; random when absent.
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            stop_timeout_ms: 1_000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub horizons_minutes: Vec<u64>,
    pub history_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            horizons_minutes: vec![1, 5, 15, 30, 60],
            history_capacity: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarketConfig {
    pub tick_secs: u64,
    pub seed: Option<u64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub catalog_path: PathBuf,
    pub scheduler: SchedulerConfig,
    pub tracker: TrackerConfig,
    pub market: MarketConfig,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from(crate::catalog::DEFAULT_CATALOG_PATH),
            scheduler: SchedulerConfig::default(),
            tracker: TrackerConfig::default(),
            market: MarketConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing tracker config")?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading tracker config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve config using env var + fallbacks:
    /// 1) $MACRO_TRACKER_CONFIG (must exist when set)
    /// 2) config/tracker.toml
    /// 3) built-in defaults
    ///
    /// `$PORT` then overrides the port of `server.bind`.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };

        if let Some(port) = std::env::var("PORT")
            .ok()
            .and_then(|v| v.trim().parse::<u16>().ok())
        {
            cfg.server.bind = with_port(&cfg.server.bind, port);
        }
        Ok(cfg)
    }
}

fn with_port(bind: &str, port: u16) -> String {
    let host = bind.rsplit_once(':').map(|(h, _)| h).unwrap_or(bind);
    format!("{host}:{port}")
}
