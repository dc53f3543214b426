//! Sentinel-prefixed JSON payloads for text channels.
//!
//! A prepared operation is returned as a human-readable preview plus one text block of the
//! form `<PREFIX><json>`. Consumers strip the prefix and parse the rest.

use alloy::hex;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TX_DATA_PREFIX: &str = "__TXDATA__";
pub const CONTRACT_CALL_PREFIX: &str = "__CONTRACTCALL__";
pub const DEPLOY_DATA_PREFIX: &str = "__DEPLOYDATA__";

/// Native transfer details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxData {
    pub address: Address,
    pub to: Address,
    pub amount: String,
    pub network_name: String,
    pub chain_id: u64,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_estimate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_gwei: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_fee_eth: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractCallKind {
    ContractRead,
    ContractWrite,
}

/// Contract read or write details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallData {
    #[serde(rename = "type")]
    pub kind: ContractCallKind,
    pub contract_address: Address,
    pub network_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    pub function: String,
    pub args: Vec<Value>,
    pub data: Bytes,
    /// Decoded outputs of a read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_wei: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_estimate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_wei: Option<String>,
    pub read_only: bool,
}

/// Compiled contract ready for the contract-factory path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPayload {
    pub file_name: String,
    pub contract_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
    /// ABI-encoded constructor arguments, appended to `bytecode` on deployment.
    #[serde(default)]
    pub encoded_args: Bytes,
    pub constructor_args: Vec<Value>,
    pub network_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_estimate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_cost_eth: Option<String>,
}

impl DeployPayload {
    /// Creation code: bytecode followed by the encoded constructor arguments.
    pub fn init_code(&self) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + self.encoded_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(&self.encoded_args);
        code.into()
    }

    /// `0x` followed by the first 16 hex digits of the bytecode.
    pub fn bytecode_hash(&self) -> String {
        let digits = hex::encode(&self.bytecode);
        format!("0x{}...", &digits[..digits.len().min(16)])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StructuredPayload {
    Transfer(TxData),
    ContractCall(ContractCallData),
    Deploy(DeployPayload),
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("text block carries no known sentinel prefix")]
    UnknownPrefix,
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl StructuredPayload {
    pub fn prefix(&self) -> &'static str {
        match self {
            StructuredPayload::Transfer(_) => TX_DATA_PREFIX,
            StructuredPayload::ContractCall(_) => CONTRACT_CALL_PREFIX,
            StructuredPayload::Deploy(_) => DEPLOY_DATA_PREFIX,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let body = match self {
            StructuredPayload::Transfer(data) => serde_json::to_string(data)?,
            StructuredPayload::ContractCall(data) => serde_json::to_string(data)?,
            StructuredPayload::Deploy(data) => serde_json::to_string(data)?,
        };
        Ok(format!("{}{body}", self.prefix()))
    }

    pub fn decode(text: &str) -> Result<Self, PayloadError> {
        let text = text.trim();
        if let Some(body) = text.strip_prefix(TX_DATA_PREFIX) {
            return Ok(StructuredPayload::Transfer(serde_json::from_str(body)?));
        }
        if let Some(body) = text.strip_prefix(CONTRACT_CALL_PREFIX) {
            return Ok(StructuredPayload::ContractCall(serde_json::from_str(body)?));
        }
        if let Some(body) = text.strip_prefix(DEPLOY_DATA_PREFIX) {
            return Ok(StructuredPayload::Deploy(serde_json::from_str(body)?));
        }
        Err(PayloadError::UnknownPrefix)
    }
}
