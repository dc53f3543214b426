//! Off-chain lookups: fiat prices and explorer-indexed transaction history.
//!
//! Prices come from a CoinGecko-compatible `simple/price` endpoint. History comes from the
//! Etherscan v2 multichain API, which serves every indexed network behind one URL keyed by
//! `chainid`. Both are traits so the dispatcher can run against in-memory fakes.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

use crate::config::MarketConfig;
use crate::error::EngineError;
use crate::network::Network;

/// Supported fiat currencies: code, flag, symbol.
const FIAT: [(&str, &str, &str); 9] = [
    ("usd", "🇺🇸", "$"),
    ("eur", "🇪🇺", "€"),
    ("jpy", "🇯🇵", "¥"),
    ("gbp", "🇬🇧", "£"),
    ("aud", "🇦🇺", "A$"),
    ("cad", "🇨🇦", "C$"),
    ("chf", "🇨🇭", "CHF"),
    ("cny", "🇨🇳", "¥"),
    ("inr", "🇮🇳", "₹"),
];

pub fn fiat_codes() -> impl Iterator<Item = &'static str> {
    FIAT.iter().map(|(code, _, _)| *code)
}

/// Flag and symbol for a lowercase fiat code.
pub fn fiat(code: &str) -> Option<(&'static str, &'static str)> {
    FIAT.iter()
        .find(|(known, _, _)| *known == code)
        .map(|(_, flag, symbol)| (*flag, *symbol))
}

/// Map common tickers and names to CoinGecko ids. Unknown input passes through lowercased.
pub fn coin_id(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    let id = match key.as_str() {
        "eth" | "ether" | "ethereum" => "ethereum",
        "btc" | "xbt" | "bitcoin" => "bitcoin",
        "bnb" | "binance" => "binancecoin",
        "matic" | "polygon" => "matic-network",
        "pol" => "polygon-ecosystem-token",
        "avax" | "avalanche" => "avalanche-2",
        "arb" | "arbitrum" => "arbitrum",
        "op" | "optimism" => "optimism",
        "link" | "chainlink" => "chainlink",
        "usdc" | "usd-coin" => "usd-coin",
        "usdt" | "tether" => "tether",
        _ => return key,
    };
    id.to_string()
}

/// Two decimals with thousands separators: `3245.678` becomes `3,245.68`.
pub fn format_fiat(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Prices of `coin_id` keyed by fiat code, or `None` when the feed does not list the coin.
    async fn prices(&self, coin_id: &str, currencies: &[String]) -> Result<Option<HashMap<String, f64>>, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySource {
    Normal,
    Internal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub hash: Option<B256>,
    /// Recipient, or the created contract.
    pub to: Option<Address>,
    pub value: U256,
    /// Seconds since the Unix epoch.
    pub timestamp: Option<i64>,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub source: HistorySource,
    pub entries: Vec<HistoryEntry>,
    /// What the explorer said when it returned nothing.
    pub notice: Option<String>,
}

#[async_trait]
pub trait TransactionHistory: Send + Sync {
    /// Most recent transactions of `address`, newest first.
    async fn recent(&self, network: Network, address: Address, limit: usize) -> Result<HistoryPage, EngineError>;
}

/// Off-chain collaborators handed to the query layer.
#[derive(Clone)]
pub struct MarketSources {
    pub prices: Arc<dyn PriceFeed>,
    pub history: Arc<dyn TransactionHistory>,
    pub history_limit: usize,
}

fn http_client(config: &MarketConfig) -> Result<reqwest::Client, EngineError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| EngineError::Provider(format!("failed to build HTTP client: {e}")))
}

pub struct CoinGeckoFeed {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoFeed {
    pub fn try_new(config: &MarketConfig) -> Result<Self, EngineError> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.price_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    #[instrument(skip_all, fields(coin = %coin_id))]
    async fn prices(&self, coin_id: &str, currencies: &[String]) -> Result<Option<HashMap<String, f64>>, EngineError> {
        let vs_currencies = currencies.join(",");
        let response = self
            .client
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", coin_id), ("vs_currencies", vs_currencies.as_str())])
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("price lookup failed: {e}")))?;
        if !response.status().is_success() {
            return Err(EngineError::Provider(format!(
                "Failed to fetch price: {}",
                response.status()
            )));
        }
        let mut body: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|e| EngineError::Provider(format!("unexpected price response: {e}")))?;
        Ok(body.remove(coin_id))
    }
}

/// Etherscan-style `{status, message, result}` envelope.
#[derive(Debug, Default, Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl ExplorerResponse {
    fn entries(&self) -> Vec<HistoryEntry> {
        if self.status != "1" {
            return Vec::new();
        }
        self.result
            .as_array()
            .map(|items| items.iter().map(parse_entry).collect())
            .unwrap_or_default()
    }
}

fn parse_entry(item: &Value) -> HistoryEntry {
    let text = |key: &str| item.get(key).and_then(Value::as_str).filter(|text| !text.is_empty());
    HistoryEntry {
        hash: text("hash")
            .or_else(|| text("transactionHash"))
            .and_then(|hash| B256::from_str(hash).ok()),
        to: text("to")
            .or_else(|| text("contractAddress"))
            .and_then(|address| Address::from_str(address).ok()),
        value: text("value")
            .and_then(|value| U256::from_str(value).ok())
            .unwrap_or_default(),
        timestamp: text("timeStamp").and_then(|ts| ts.parse().ok()),
        success: text("isError").is_none_or(|flag| flag == "0"),
    }
}

/// Explorer messages worth showing, plus hints for the usual API key problems.
fn explorer_notice(responses: &[&ExplorerResponse]) -> Option<String> {
    let mut texts: Vec<&str> = Vec::new();
    for response in responses {
        for text in [response.message.as_str(), response.result.as_str().unwrap_or_default()] {
            let text = text.trim();
            if !text.is_empty()
                && !matches!(text, "OK" | "NOTOK" | "No transactions found")
                && !texts.contains(&text)
            {
                texts.push(text);
            }
        }
    }
    let lower = texts.join(" ").to_lowercase();
    let mut notice = texts.join(". ");
    if lower.contains("invalid api key") {
        notice.push_str(". Invalid or missing ETHERSCAN_API_KEY.");
    }
    if lower.contains("rate limit") {
        notice.push_str(". Explorer rate limit reached. Try again later or add ETHERSCAN_API_KEY.");
    }
    Some(notice).filter(|notice| !notice.is_empty())
}

pub struct EtherscanHistory {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl EtherscanHistory {
    pub fn try_new(config: &MarketConfig, api_key: Option<String>) -> Result<Self, EngineError> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.history_api_url.clone(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    async fn fetch(
        &self,
        chain_id: u64,
        action: &str,
        address: Address,
        limit: usize,
    ) -> Result<ExplorerResponse, EngineError> {
        let chain_id = chain_id.to_string();
        let address = address.to_string();
        let offset = limit.to_string();
        let mut query = vec![
            ("chainid", chain_id.as_str()),
            ("module", "account"),
            ("action", action),
            ("address", address.as_str()),
            ("startblock", "0"),
            ("endblock", "99999999"),
            ("page", "1"),
            ("offset", offset.as_str()),
            ("sort", "desc"),
        ];
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.as_str()));
        }
        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("history lookup failed: {e}")))?;
        response
            .json()
            .await
            .map_err(|e| EngineError::Provider(format!("unexpected explorer response: {e}")))
    }
}

#[async_trait]
impl TransactionHistory for EtherscanHistory {
    #[instrument(skip_all, fields(network = %network))]
    async fn recent(&self, network: Network, address: Address, limit: usize) -> Result<HistoryPage, EngineError> {
        let chain_id = network.chain_id();
        let normal = self.fetch(chain_id, "txlist", address, limit).await?;
        let mut entries = normal.entries();
        if !entries.is_empty() {
            entries.truncate(limit);
            return Ok(HistoryPage {
                source: HistorySource::Normal,
                entries,
                notice: None,
            });
        }

        let internal = self.fetch(chain_id, "txlistinternal", address, limit).await?;
        let mut entries = internal.entries();
        if !entries.is_empty() {
            entries.truncate(limit);
            return Ok(HistoryPage {
                source: HistorySource::Internal,
                entries,
                notice: None,
            });
        }

        tracing::debug!(status = %normal.status, message = %normal.message, "Explorer returned no transactions");
        Ok(HistoryPage {
            source: HistorySource::Normal,
            entries: Vec::new(),
            notice: explorer_notice(&[&normal, &internal]),
        })
    }
}
