//! Supported networks and their static chain metadata.
//!
//! Each [`Network`] maps to an EIP-155 chain id, a native currency symbol, a default
//! JSON-RPC endpoint and (when one exists) a block explorer. RPC endpoints can be
//! overridden per network through the `chains` section of the configuration file.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Supported EVM networks.
///
/// The serialized form is the kebab-case network name used on the wire
/// (`"ethereum-sepolia"`, `"base-mainnet"`, ...).
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Network {
    /// Ethereum mainnet (chain ID 1).
    #[serde(rename = "ethereum-mainnet")]
    EthereumMainnet,
    /// Ethereum Sepolia testnet (chain ID 11155111).
    #[serde(rename = "ethereum-sepolia")]
    EthereumSepolia,
    /// Arbitrum One (chain ID 42161).
    #[serde(rename = "arbitrum-one")]
    ArbitrumOne,
    /// Arbitrum Sepolia testnet (chain ID 421614).
    #[serde(rename = "arbitrum-sepolia")]
    ArbitrumSepolia,
    /// Avalanche C-Chain (chain ID 43114).
    #[serde(rename = "avalanche-c-chain")]
    AvalancheCChain,
    /// Avalanche Fuji testnet (chain ID 43113).
    #[serde(rename = "avalanche-fuji")]
    AvalancheFuji,
    /// Base mainnet (chain ID 8453).
    #[serde(rename = "base-mainnet")]
    BaseMainnet,
    /// Base Sepolia testnet (chain ID 84532).
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
    /// Polygon PoS mainnet (chain ID 137).
    #[serde(rename = "polygon-mainnet")]
    PolygonMainnet,
    /// Polygon Amoy testnet (chain ID 80002).
    #[serde(rename = "polygon-amoy")]
    PolygonAmoy,
    /// OP mainnet (chain ID 10).
    #[serde(rename = "optimism-mainnet")]
    OptimismMainnet,
    /// OP Sepolia testnet (chain ID 11155420).
    #[serde(rename = "optimism-sepolia")]
    OptimismSepolia,
    /// BNB Smart Chain (chain ID 56).
    #[serde(rename = "bsc-mainnet")]
    BscMainnet,
    /// BNB Smart Chain testnet (chain ID 97).
    #[serde(rename = "bsc-testnet")]
    BscTestnet,
    /// Local Ganache instance (chain ID 1337).
    #[serde(rename = "ganache")]
    Ganache,
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Network {
    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[
            Network::EthereumMainnet,
            Network::EthereumSepolia,
            Network::ArbitrumOne,
            Network::ArbitrumSepolia,
            Network::AvalancheCChain,
            Network::AvalancheFuji,
            Network::BaseMainnet,
            Network::BaseSepolia,
            Network::PolygonMainnet,
            Network::PolygonAmoy,
            Network::OptimismMainnet,
            Network::OptimismSepolia,
            Network::BscMainnet,
            Network::BscTestnet,
            Network::Ganache,
        ]
    }

    /// Wire name of the network.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::EthereumMainnet => "ethereum-mainnet",
            Network::EthereumSepolia => "ethereum-sepolia",
            Network::ArbitrumOne => "arbitrum-one",
            Network::ArbitrumSepolia => "arbitrum-sepolia",
            Network::AvalancheCChain => "avalanche-c-chain",
            Network::AvalancheFuji => "avalanche-fuji",
            Network::BaseMainnet => "base-mainnet",
            Network::BaseSepolia => "base-sepolia",
            Network::PolygonMainnet => "polygon-mainnet",
            Network::PolygonAmoy => "polygon-amoy",
            Network::OptimismMainnet => "optimism-mainnet",
            Network::OptimismSepolia => "optimism-sepolia",
            Network::BscMainnet => "bsc-mainnet",
            Network::BscTestnet => "bsc-testnet",
            Network::Ganache => "ganache",
        }
    }

    /// Returns the EIP-155 chain ID for this network.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::EthereumMainnet => 1,
            Network::EthereumSepolia => 11155111,
            Network::ArbitrumOne => 42161,
            Network::ArbitrumSepolia => 421614,
            Network::AvalancheCChain => 43114,
            Network::AvalancheFuji => 43113,
            Network::BaseMainnet => 8453,
            Network::BaseSepolia => 84532,
            Network::PolygonMainnet => 137,
            Network::PolygonAmoy => 80002,
            Network::OptimismMainnet => 10,
            Network::OptimismSepolia => 11155420,
            Network::BscMainnet => 56,
            Network::BscTestnet => 97,
            Network::Ganache => 1337,
        }
    }

    /// Attempts to create a Network from an EIP-155 chain ID.
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Network::variants()
            .iter()
            .copied()
            .find(|network| network.chain_id() == chain_id)
    }

    /// Native currency symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Network::AvalancheCChain | Network::AvalancheFuji => "AVAX",
            Network::PolygonMainnet | Network::PolygonAmoy => "MATIC",
            Network::BscMainnet => "BNB",
            Network::BscTestnet => "tBNB",
            _ => "ETH",
        }
    }

    /// Returns true if this is a testnet or a local development chain.
    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Network::EthereumSepolia
                | Network::ArbitrumSepolia
                | Network::AvalancheFuji
                | Network::BaseSepolia
                | Network::PolygonAmoy
                | Network::OptimismSepolia
                | Network::BscTestnet
                | Network::Ganache
        )
    }

    /// Block explorer base URL, if the network has a public one.
    pub fn explorer_url(&self) -> Option<&'static str> {
        match self {
            Network::EthereumMainnet => Some("https://etherscan.io"),
            Network::EthereumSepolia => Some("https://sepolia.etherscan.io"),
            Network::ArbitrumOne => Some("https://arbiscan.io"),
            Network::ArbitrumSepolia => Some("https://sepolia.arbiscan.io"),
            Network::AvalancheCChain => Some("https://snowtrace.io"),
            Network::AvalancheFuji => Some("https://testnet.snowtrace.io"),
            Network::BaseMainnet => Some("https://basescan.org"),
            Network::BaseSepolia => Some("https://sepolia.basescan.org"),
            Network::PolygonMainnet => Some("https://polygonscan.com"),
            Network::PolygonAmoy => Some("https://amoy.polygonscan.com"),
            Network::OptimismMainnet => Some("https://optimistic.etherscan.io"),
            Network::OptimismSepolia => Some("https://sepolia-optimistic.etherscan.io"),
            Network::BscMainnet => Some("https://bscscan.com"),
            Network::BscTestnet => Some("https://testnet.bscscan.com"),
            Network::Ganache => None,
        }
    }

    /// Default JSON-RPC endpoint.
    ///
    /// Infura-hosted networks need an API key and return `None` without one.
    pub fn default_rpc_url(&self, infura_api_key: Option<&str>) -> Option<String> {
        let infura = |subdomain: &str| {
            infura_api_key
                .filter(|key| !key.is_empty())
                .map(|key| format!("https://{subdomain}.infura.io/v3/{key}"))
        };
        match self {
            Network::EthereumMainnet => infura("mainnet"),
            Network::EthereumSepolia => infura("sepolia"),
            Network::ArbitrumOne => infura("arbitrum-mainnet"),
            Network::ArbitrumSepolia => infura("arbitrum-sepolia"),
            Network::AvalancheCChain => Some("https://api.avax.network/ext/bc/C/rpc".into()),
            Network::AvalancheFuji => Some("https://api.avax-test.network/ext/bc/C/rpc".into()),
            Network::BaseMainnet => infura("base-mainnet"),
            Network::BaseSepolia => infura("base-sepolia"),
            Network::PolygonMainnet => infura("polygon-mainnet"),
            Network::PolygonAmoy => infura("polygon-amoy"),
            Network::OptimismMainnet => infura("optimism-mainnet"),
            Network::OptimismSepolia => infura("optimism-sepolia"),
            Network::BscMainnet => Some("https://bsc-dataseed.binance.org".into()),
            Network::BscTestnet => Some("https://data-seed-prebsc-1-s1.binance.org:8545".into()),
            Network::Ganache => Some("http://127.0.0.1:7545".into()),
        }
    }

    /// Comma separated list of every supported network name.
    pub fn supported_names() -> String {
        Network::variants()
            .iter()
            .map(Network::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Error when a network name is not recognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetworkError(pub String);

impl FromStr for Network {
    type Err = UnknownNetworkError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Network::variants()
            .iter()
            .copied()
            .find(|network| network.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownNetworkError(s.to_string()))
    }
}
