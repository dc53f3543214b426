//! Configuration file parsing for the chainpilot engine.
//!
//! This module handles loading and parsing the `config.toml` file: HTTP server limits,
//! CORS, JSON-RPC transport tuning, per-network endpoint overrides, the contract
//! registry location, the Solidity compiler invocation and the price and history APIs.
//!
//! Configuration is optional; every section falls back to defaults that work against
//! public endpoints and a local `solc` binary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::network::Network;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cors: CorsConfig,
    pub request: RequestConfig,
    pub rpc: RpcConfig,
    /// Per-network overrides keyed by network name (e.g. `"ethereum-sepolia"`).
    pub chains: HashMap<String, ChainConfig>,
    pub registry: RegistryConfig,
    pub compiler: CompilerConfig,
    pub wallet: WalletConfig,
    pub market: MarketConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// If the file doesn't exist, returns the default configuration.
    /// If the file exists but is malformed, returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from environment variable CONFIG_FILE or default path.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::from_file(config_path)
    }

    /// Resolve the JSON-RPC endpoint for a network.
    ///
    /// A `chains.<network>.rpc_url` override wins over the built-in default.
    pub fn rpc_url_for(&self, network: Network, infura_api_key: Option<&str>) -> Option<url::Url> {
        if let Some(url) = self
            .chains
            .get(network.as_str())
            .and_then(|chain| chain.rpc_url.clone())
        {
            return Some(url);
        }
        network
            .default_rpc_url(infura_api_key)
            .and_then(|raw| raw.parse().ok())
    }

    /// Explorer base URL, honouring overrides.
    pub fn explorer_url_for(&self, network: Network) -> Option<String> {
        self.chains
            .get(network.as_str())
            .and_then(|chain| chain.explorer_url.clone())
            .or_else(|| network.explorer_url().map(str::to_string))
    }

    /// Effective per-request RPC timeout for a network.
    pub fn rpc_timeout_for(&self, network: Network) -> Duration {
        self.chains
            .get(network.as_str())
            .and_then(|chain| chain.rpc_request_timeout_seconds)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(self.rpc.default_rpc_timeout_seconds))
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// List of allowed origins. Empty list means allow all (*).
    pub allowed_origins: Vec<String>,
}

/// Request validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Maximum request body size in bytes (default 1MB).
    ///
    /// Deploy requests carry Solidity source, so this bounds the largest accepted file.
    pub max_body_size_bytes: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_body_size_bytes: 1_048_576, // 1MB
        }
    }
}

/// JSON-RPC transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Default RPC request timeout in seconds.
    /// Default: 30 seconds.
    pub default_rpc_timeout_seconds: u64,

    /// HTTP connection establishment timeout in seconds.
    /// Default: 10 seconds.
    pub connection_timeout_seconds: u64,

    /// Maximum idle connections per host in the connection pool.
    pub pool_max_idle_per_host: usize,

    /// How long to keep idle connections alive in seconds.
    pub pool_idle_timeout_seconds: u64,

    /// Interval between receipt polls while a transaction is being watched.
    /// Default: 4000ms.
    pub receipt_poll_interval_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            default_rpc_timeout_seconds: 30,
            connection_timeout_seconds: 10,
            pool_max_idle_per_host: 16,
            pool_idle_timeout_seconds: 90,
            receipt_poll_interval_ms: 4_000,
        }
    }
}

impl RpcConfig {
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms.max(1))
    }
}

/// Per-network endpoint overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Replaces the built-in JSON-RPC endpoint.
    pub rpc_url: Option<url::Url>,
    /// Replaces the built-in block explorer URL.
    pub explorer_url: Option<String>,
    /// Timeout for individual RPC requests in seconds.
    pub rpc_request_timeout_seconds: Option<u64>,
}

/// Contract registry storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".data/contracts.storage.json"),
        }
    }
}

/// Solidity compiler invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Path or name of the `solc` binary.
    pub solc_path: PathBuf,
    pub evm_version: String,
    pub optimizer_enabled: bool,
    pub optimizer_runs: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            solc_path: PathBuf::from("solc"),
            evm_version: "paris".to_string(),
            optimizer_enabled: true,
            optimizer_runs: 200,
        }
    }
}

/// Off-chain data sources for prices and transaction history.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    /// CoinGecko-compatible API root.
    pub price_api_url: String,
    /// Etherscan v2 multichain endpoint.
    pub history_api_url: String,
    pub request_timeout_seconds: u64,
    /// Entries shown by `getTransactions`.
    pub history_limit: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            price_api_url: "https://api.coingecko.com/api/v3".to_string(),
            history_api_url: "https://api.etherscan.io/v2/api".to_string(),
            request_timeout_seconds: 10,
            history_limit: 5,
        }
    }
}

impl MarketConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Wallet session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Network the local signer starts connected to.
    pub network: Network,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::EthereumSepolia,
        }
    }
}
