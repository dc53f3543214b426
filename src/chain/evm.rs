//! JSON-RPC backed chain access for every configured network.
//!
//! One [`RootProvider`] per network, each over its own `reqwest` client so that connect
//! and request timeouts and pool sizes apply per endpoint. Networks without a resolvable
//! endpoint (Infura networks with no `INFURA_API_KEY`, no override) are skipped at startup
//! and report a provider error when used.

use alloy::consensus::Transaction as ConsensusTransaction;
use alloy::network::{TransactionBuilder, TransactionResponse};
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

use crate::chain::{CallRequest, ChainReader, ReceiptSummary, RpcFailure, TransactionSummary};
use crate::config::EngineConfig;
use crate::network::Network;

/// Build an [`RpcClient`] for a network with the configured HTTP timeouts.
pub fn build_rpc_client(
    config: &EngineConfig,
    network: Network,
    url: url::Url,
) -> Result<RpcClient, RpcFailure> {
    let rpc_timeout = config.rpc_timeout_for(network);
    tracing::debug!(
        network=%network,
        rpc_timeout_secs=rpc_timeout.as_secs(),
        connection_timeout_secs=config.rpc.connection_timeout_seconds,
        pool_max_idle=config.rpc.pool_max_idle_per_host,
        "Configuring RPC client"
    );
    let http_client = alloy::transports::http::reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.rpc.connection_timeout_seconds))
        .timeout(rpc_timeout)
        .pool_idle_timeout(Duration::from_secs(config.rpc.pool_idle_timeout_seconds))
        .pool_max_idle_per_host(config.rpc.pool_max_idle_per_host)
        .build()
        .map_err(|e| RpcFailure::new(format!("failed to build HTTP client for {network}: {e}")))?;
    let transport = alloy::transports::http::Http::with_client(http_client, url);
    Ok(RpcClient::new(transport, false))
}

/// Convert a [`CallRequest`] into an alloy transaction request.
pub fn to_transaction_request(request: &CallRequest) -> TransactionRequest {
    let mut tx = TransactionRequest::default().with_input(request.data.clone());
    if let Some(from) = request.from {
        tx = tx.with_from(from);
    }
    tx = match request.to {
        Some(to) => tx.with_to(to),
        None => tx.into_create(),
    };
    if !request.value.is_zero() {
        tx = tx.with_value(request.value);
    }
    tx
}

/// Whether a failure looks like a transport problem rather than a node-side rejection.
pub fn is_connectivity_failure(failure: &RpcFailure) -> bool {
    failure.messages().any(|message| {
        message.contains("Connection refused")
            || message.contains("Connection reset")
            || message.contains("No route to host")
            || message.contains("timeout")
            || message.contains("Timeout")
            || message.contains("timed out")
            || message.contains("dns error")
            || message.contains("error sending request")
    })
}

/// [`ChainReader`] over JSON-RPC endpoints.
pub struct RpcChainReader {
    providers: HashMap<Network, RootProvider>,
}

impl RpcChainReader {
    /// Build providers for every network with a resolvable endpoint.
    pub fn try_new(config: &EngineConfig, infura_api_key: Option<&str>) -> Result<Self, RpcFailure> {
        let mut providers = HashMap::new();
        for network in Network::variants() {
            let Some(url) = config.rpc_url_for(*network, infura_api_key) else {
                tracing::warn!(network=%network, "No RPC endpoint configured, network disabled");
                continue;
            };
            let client = build_rpc_client(config, *network, url.clone())?;
            providers.insert(*network, RootProvider::new(client));
            tracing::info!(network=%network, rpc=%redact(&url), "Initialized provider");
        }
        Ok(Self { providers })
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.providers.keys()
    }

    fn provider(&self, network: Network) -> Result<&RootProvider, RpcFailure> {
        self.providers
            .get(&network)
            .ok_or_else(|| RpcFailure::new(format!("no RPC endpoint configured for {network}")))
    }
}

/// Hide API keys embedded in the path of hosted endpoints.
fn redact(url: &url::Url) -> String {
    match url.host_str() {
        Some(host) if host.ends_with("infura.io") => format!("{}://{}/v3/***", url.scheme(), host),
        _ => url.to_string(),
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    #[instrument(skip_all, fields(network = %network))]
    async fn estimate_gas(&self, network: Network, request: &CallRequest) -> Result<u64, RpcFailure> {
        let tx = to_transaction_request(request);
        Ok(self.provider(network)?.estimate_gas(tx).await?)
    }

    #[instrument(skip_all, fields(network = %network))]
    async fn gas_price(&self, network: Network) -> Result<u128, RpcFailure> {
        Ok(self.provider(network)?.get_gas_price().await?)
    }

    #[instrument(skip_all, fields(network = %network))]
    async fn call(&self, network: Network, request: &CallRequest) -> Result<Bytes, RpcFailure> {
        let tx = to_transaction_request(request);
        Ok(self.provider(network)?.call(tx).await?)
    }

    #[instrument(skip_all, fields(network = %network))]
    async fn balance(&self, network: Network, address: Address) -> Result<U256, RpcFailure> {
        Ok(self.provider(network)?.get_balance(address).await?)
    }

    async fn receipt(&self, network: Network, hash: B256) -> Result<Option<ReceiptSummary>, RpcFailure> {
        let receipt = self.provider(network)?.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|receipt| ReceiptSummary {
            transaction_hash: receipt.transaction_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            contract_address: receipt.contract_address,
        }))
    }

    #[instrument(skip_all, fields(network = %network, tx = %hash))]
    async fn transaction(&self, network: Network, hash: B256) -> Result<Option<TransactionSummary>, RpcFailure> {
        let tx = self.provider(network)?.get_transaction_by_hash(hash).await?;
        Ok(tx.map(|tx| TransactionSummary {
            hash,
            from: TransactionResponse::from(&tx),
            to: ConsensusTransaction::to(&tx),
            value: ConsensusTransaction::value(&tx),
            gas_price: tx
                .effective_gas_price
                .unwrap_or_else(|| ConsensusTransaction::max_fee_per_gas(&tx)),
            gas_limit: ConsensusTransaction::gas_limit(&tx),
            block_number: tx.block_number,
        }))
    }
}
