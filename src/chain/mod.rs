//! Read-only chain access and the JSON-RPC failure shape shared by providers and signers.

use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::network::Network;

pub mod evm;
pub mod revert;

/// A failed JSON-RPC or wallet call.
///
/// Mirrors the EIP-1193 / JSON-RPC error object: a numeric `code`, a `message`, optional
/// `data` (revert bytes as a hex string, or a nested object), and an optional wrapped
/// `cause` for wallets that nest the node's error inside their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct RpcFailure {
    pub code: Option<i64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<RpcFailure>>,
}

impl RpcFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_cause(mut self, cause: RpcFailure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Every message carried by this failure, outermost first.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(failure) = current {
            chain.push(failure.message.as_str());
            current = failure.cause.as_deref();
        }
        chain.into_iter()
    }
}

impl From<RpcError<TransportErrorKind>> for RpcFailure {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        if let Some(payload) = error.as_error_resp() {
            let data = payload
                .data
                .as_ref()
                .and_then(|raw| serde_json::from_str::<Value>(raw.get()).ok());
            return RpcFailure {
                code: Some(payload.code),
                message: payload.message.to_string(),
                data,
                cause: None,
            };
        }
        RpcFailure::new(error.to_string())
    }
}

/// Minimal call description used for estimation and static calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
}

impl CallRequest {
    pub fn transfer(from: Address, to: Address, value: U256) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            data: Bytes::new(),
            value,
        }
    }

    pub fn call(from: Option<Address>, to: Address, data: Bytes, value: U256) -> Self {
        Self {
            from,
            to: Some(to),
            data,
            value,
        }
    }

    pub fn create(from: Option<Address>, init_code: Bytes) -> Self {
        Self {
            from,
            to: None,
            data: init_code,
            value: U256::ZERO,
        }
    }
}

/// The parts of a transaction receipt the engine acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSummary {
    pub transaction_hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
}

/// The parts of a mined or pending transaction shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    /// Effective price once mined, the fee cap before.
    pub gas_price: u128,
    pub gas_limit: u64,
    /// `None` while pending.
    pub block_number: Option<u64>,
}

/// Read-only view of the supported chains.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn estimate_gas(&self, network: Network, request: &CallRequest) -> Result<u64, RpcFailure>;

    async fn gas_price(&self, network: Network) -> Result<u128, RpcFailure>;

    /// Static call (`eth_call`) against the latest block.
    async fn call(&self, network: Network, request: &CallRequest) -> Result<Bytes, RpcFailure>;

    async fn balance(&self, network: Network, address: Address) -> Result<U256, RpcFailure>;

    /// Single receipt lookup; `None` while the transaction is not yet mined.
    async fn receipt(&self, network: Network, hash: B256) -> Result<Option<ReceiptSummary>, RpcFailure>;

    /// Transaction lookup by hash; `None` when the node does not know it.
    async fn transaction(&self, network: Network, hash: B256) -> Result<Option<TransactionSummary>, RpcFailure>;
}
