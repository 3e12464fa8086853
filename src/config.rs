//! Configuration management for the ledger explorer

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::cache::BlockCache;
use crate::error::{LedgerError, Result};
use crate::indexer::DEFAULT_TRANSACTION_CAP;
use crate::ledger::RuntimeLayout;
use crate::reporter::{DEFAULT_HEADER_DEPTH, DEFAULT_RECENT_BLOCKS};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub runtime: RuntimeLayout,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            runtime: RuntimeLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_recent_blocks")]
    pub recent_blocks: u64,
    #[serde(default = "default_transaction_cap")]
    pub transaction_cap: usize,
    #[serde(default = "default_header_depth")]
    pub header_depth: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recent_blocks: default_recent_blocks(),
            transaction_cap: default_transaction_cap(),
            header_depth: default_header_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sidecar base URL; the block range route is disabled when unset.
    #[serde(default)]
    pub sidecar_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            sidecar_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Blocks kept per cache; 0 disables caching.
    #[serde(default = "default_block_capacity")]
    pub block_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_capacity: default_block_capacity(),
        }
    }
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:9944".to_string()
}

fn default_recent_blocks() -> u64 {
    DEFAULT_RECENT_BLOCKS
}

fn default_transaction_cap() -> usize {
    DEFAULT_TRANSACTION_CAP
}

fn default_header_depth() -> u64 {
    DEFAULT_HEADER_DEPTH
}

fn default_port() -> u16 {
    3000
}

fn default_block_capacity() -> usize {
    BlockCache::DEFAULT_CAPACITY
}

impl Config {
    /// Parse a TOML document; an empty document yields the defaults.
    pub fn from_toml(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Ok(Config::default());
        }
        toml::from_str(source).map_err(|e| LedgerError::ConfigError(e.to_string()))
    }

    /// Apply overrides from a variable lookup such as `std::env::var`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("SAS_SUBSTRATE_URL") {
            self.ledger.endpoint = endpoint;
        }
        if let Some(depth) = lookup("NUMBER_BLOCK_HEADER") {
            self.scan.header_depth = parse_var("NUMBER_BLOCK_HEADER", &depth)?;
        }
        if let Some(url) = lookup("API_SIDECAR_URL") {
            self.api.sidecar_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(port) = lookup("PORT") {
            self.api.port = parse_var("PORT", &port)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.endpoint.trim().is_empty() {
            return Err(LedgerError::ConfigError(
                "ledger.endpoint must be set in config.toml or SAS_SUBSTRATE_URL".to_string(),
            ));
        }
        if self.ledger.runtime.pallets.is_empty() {
            return Err(LedgerError::ConfigError(
                "ledger.runtime.pallets must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LedgerError::ConfigError(format!("{} has an invalid value: {}", name, value)))
}

/// Load `path` (defaults when absent), apply environment overrides and validate.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let mut config = Config::from_toml(&config_str)?;

    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;

    tracing::debug!(path = %path.display(), endpoint = %config.ledger.endpoint, "Configuration loaded");
    Ok(config)
}
