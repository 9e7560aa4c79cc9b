//! Configuration for the chain server

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// TCP listen address
    pub listen_addr: String,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Genesis block configuration
    pub genesis: GenesisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7777".to_string(),
            service_name: "chain-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            genesis: GenesisConfig::default(),
        }
    }
}

/// Genesis block configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Payload stored in block 0
    pub payload: String,

    /// Leading hex zeros required of the genesis digest
    pub difficulty: u32,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            payload: "Genesis".to_string(),
            difficulty: 2,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(addr) = std::env::var("CHAIN_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(difficulty) = std::env::var("CHAIN_GENESIS_DIFFICULTY") {
            config.genesis.difficulty = difficulty
                .parse()
                .map_err(|_| crate::Error::Config("CHAIN_GENESIS_DIFFICULTY must be a non-negative integer".to_string()))?;
        }

        Ok(config)
    }
}
