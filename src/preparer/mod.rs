//! Turning validated requests into previews and pending operations.
//!
//! Preparation never touches the pending slot. Each variant either answers with a
//! [`Prepared`] result (a preview for the user, the operation to hold, and the structured
//! payload for text channels) or fails with an [`EngineError`].

mod contract;
mod deploy;
mod transfer;

use alloy::primitives::Address;
use serde_json::Value;
use std::sync::Arc;

use crate::chain::{CallRequest, ChainReader};
use crate::compiler::Compiler;
use crate::network::Network;
use crate::registry::ContractRegistry;
use crate::sentinel::StructuredPayload;
use crate::slot::PendingOperation;

pub use contract::classify_simulation_failure;

/// Output of a preparer variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub preview: String,
    /// Operation to hold for confirmation; `None` when the result is the final answer.
    pub operation: Option<PendingOperation>,
    pub payload: StructuredPayload,
}

impl Prepared {
    /// Preview followed by the sentinel-prefixed payload.
    pub fn content(&self) -> Vec<String> {
        let mut blocks = vec![self.preview.clone()];
        match self.payload.encode() {
            Ok(encoded) => blocks.push(encoded),
            Err(e) => tracing::error!(error = %e, "Failed to encode structured payload"),
        }
        blocks
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: String,
    pub network: Network,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractCallRequest {
    pub contract_address: Option<String>,
    pub contract_name: Option<String>,
    pub network: Network,
    pub function_name: String,
    pub args: Option<Value>,
    pub value_eth: Option<String>,
    pub user_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub source: String,
    pub file_name: String,
    pub constructor_args: Option<Value>,
    pub network: Network,
    pub contract_name: Option<String>,
    pub user_address: Option<Address>,
}

pub struct TransactionPreparer {
    chain: Arc<dyn ChainReader>,
    registry: Arc<dyn ContractRegistry>,
    compiler: Arc<dyn Compiler>,
}

impl TransactionPreparer {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        registry: Arc<dyn ContractRegistry>,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        Self {
            chain,
            registry,
            compiler,
        }
    }

    /// Gas estimate and gas price, each `None` when the node could not provide it.
    async fn estimate(&self, network: Network, request: &CallRequest) -> (Option<u64>, Option<u128>) {
        let gas = match self.chain.estimate_gas(network, request).await {
            Ok(gas) => Some(gas),
            Err(e) => {
                tracing::warn!(network = %network, error = %e.message, "Gas estimation failed");
                None
            }
        };
        let price = match self.chain.gas_price(network).await {
            Ok(price) => Some(price),
            Err(e) => {
                tracing::warn!(network = %network, error = %e.message, "Gas price lookup failed");
                None
            }
        };
        (gas, price)
    }
}

const NOT_AVAILABLE: &str = "n/a";

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
