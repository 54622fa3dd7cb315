use anyhow::Result;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub limits: Option<LimitsConfig>,
    pub enrich: Option<EnrichConfig>,
    /// chain name -> JSON-RPC endpoint used for contract code-existence
    /// probes. A chain with no entry here is treated as reachable by the
    /// enricher (logged permissive default).
    pub chains: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub ships_per_minute: Option<u32>,
    pub registrations_per_hour: Option<u32>,
    pub acks_per_minute: Option<u32>,
}

pub const DEFAULT_ENRICH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ENRICH_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichConfig {
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: Self = toml::from_str(&raw)?;
        Ok(cfg)
    }
}
