//! Wire-level action requests and their typed form.
//!
//! Upstream intent extraction fills parameters it could not resolve with the literal
//! string `"error"`. Those, together with `null` values, missing addresses and missing
//! networks, are normalized here so the preparers only ever see complete requests.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::market::fiat_codes;
use crate::network::Network;
use crate::preparer::{ContractCallRequest, DeployRequest, TransferRequest};
use crate::validation::{parse_address, parse_tx_hash};

const UNRESOLVED: &str = "error";

const DEFAULT_CURRENCIES: [&str; 2] = ["usd", "eur"];

/// An action as received on the wire: `{"action": "...", ...params}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// What the session knows when an action arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    PrepareTransaction(TransferRequest),
    ConfirmTransaction,
    DenyTransaction,
    PrepareContractInteraction(ContractCallRequest),
    DeployContract(DeployRequest),
    GetBalance {
        address: Address,
        network: Network,
    },
    GetGasPrice {
        network: Network,
    },
    ListDeployedContracts {
        user_address: Option<Address>,
        network: Option<Network>,
    },
    DescribeContracts {
        contract_address: Option<String>,
        contract_name: Option<String>,
        network: Option<Network>,
        user_address: Option<Address>,
    },
    ShowAddress {
        address: Option<Address>,
    },
    GetTransactions {
        address: Address,
        network: Network,
    },
    GetPrice {
        crypto: String,
        /// Lowercase fiat codes.
        currencies: Vec<String>,
    },
    GetTransactionDetails {
        hash: B256,
        network: Network,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::PrepareTransaction(_) => "prepareTransaction",
            Action::ConfirmTransaction => "confirmTransaction",
            Action::DenyTransaction => "denyTransaction",
            Action::PrepareContractInteraction(_) => "prepareContractInteraction",
            Action::DeployContract(_) => "deploySC",
            Action::GetBalance { .. } => "getBalance",
            Action::GetGasPrice { .. } => "getGasPrice",
            Action::ListDeployedContracts { .. } => "listDeployedContracts",
            Action::DescribeContracts { .. } => "describeContracts",
            Action::ShowAddress { .. } => "showAddress",
            Action::GetTransactions { .. } => "getTransactions",
            Action::GetPrice { .. } => "getPrice",
            Action::GetTransactionDetails { .. } => "getTransactionDetails",
        }
    }

    /// Validate and normalize a wire request.
    pub fn parse(request: &ActionRequest, session: &SessionContext) -> Result<Self, EngineError> {
        let params = Params::new(&request.params);
        params.reject_unresolved()?;

        let action = match request.action.trim() {
            "prepareTransaction" => Action::PrepareTransaction(TransferRequest {
                sender: match params.text("address") {
                    Some(sender) => sender,
                    None => session
                        .account
                        .ok_or(EngineError::WalletUnavailable)?
                        .to_string(),
                },
                recipient: params.text("to").ok_or_else(|| {
                    EngineError::Validation(sentinel_message("to"))
                })?,
                amount: params.text("amount").ok_or_else(|| {
                    EngineError::Validation(sentinel_message("amount"))
                })?,
                network: params.network(session)?,
            }),
            "confirmTransaction" => Action::ConfirmTransaction,
            "denyTransaction" => Action::DenyTransaction,
            "prepareContractInteraction" => Action::PrepareContractInteraction(ContractCallRequest {
                contract_address: params.text("contractAddress"),
                contract_name: params.text("contractName"),
                network: params.network(session)?,
                function_name: params.required("functionName")?,
                args: params.value("functionArgs"),
                value_eth: params.text("valueEth"),
                user_address: params.user_address(session)?,
            }),
            "deploySC" => Action::DeployContract(DeployRequest {
                source: params.required("source")?,
                file_name: params.required("fileName")?,
                constructor_args: params.value("constructorArgs"),
                network: params.network(session)?,
                contract_name: params.text("contractName"),
                user_address: params.user_address(session)?,
            }),
            "getBalance" => Action::GetBalance {
                address: params.account(session)?,
                network: params.network(session)?,
            },
            "showAddress" => Action::ShowAddress {
                address: match params.text("address") {
                    Some(raw) => Some(parse_address("account", &raw)?),
                    None => session.account,
                },
            },
            "getTransactions" => Action::GetTransactions {
                address: params.account(session)?,
                network: params.network(session)?,
            },
            "getPrice" => Action::GetPrice {
                crypto: params
                    .text("crypto")
                    .ok_or_else(|| EngineError::Validation(sentinel_message("crypto")))?,
                currencies: params.currencies()?,
            },
            "getTransactionDetails" => Action::GetTransactionDetails {
                hash: parse_tx_hash(&params.text("hash").unwrap_or_default())?,
                network: params.network(session)?,
            },
            "getGasPrice" => Action::GetGasPrice {
                network: params.network(session)?,
            },
            "listDeployedContracts" => Action::ListDeployedContracts {
                user_address: params.user_address(session)?,
                network: params.explicit_network()?,
            },
            "describeContracts" => Action::DescribeContracts {
                contract_address: params.text("contractAddress"),
                contract_name: params.text("contractName"),
                network: params.explicit_network()?,
                user_address: params.user_address(session)?,
            },
            other => return Err(EngineError::Validation(format!("Unknown action: {other}"))),
        };
        Ok(action)
    }
}

/// User-facing text for a parameter the intent layer marked unresolved.
fn sentinel_message(key: &str) -> String {
    match key {
        "networkName" => format!(
            "Unsupported network specified. Supported networks are: {}",
            Network::supported_names()
        ),
        "crypto" => "No cryptocurrency specified for price check.".to_string(),
        "currencies" => format!(
            "Unsupported fiat currencies specified. Supported fiat currencies are: [{}]",
            fiat_codes().collect::<Vec<_>>().join(", ")
        ),
        "hash" => "No transaction hash specified for transaction details.".to_string(),
        "to" => "No recipient address specified for the transaction.".to_string(),
        "amount" => "No amount specified for the transaction.".to_string(),
        other => format!("Missing {other}"),
    }
}

struct Params<'a> {
    inner: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    fn new(inner: &'a Map<String, Value>) -> Self {
        Self { inner }
    }

    fn reject_unresolved(&self) -> Result<(), EngineError> {
        for key in ["networkName", "crypto", "currencies", "hash", "to", "amount"] {
            let unresolved = match self.inner.get(key) {
                Some(Value::String(text)) => text.trim() == UNRESOLVED,
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| item.as_str().is_some_and(|text| text.trim() == UNRESOLVED)),
                _ => false,
            };
            if unresolved {
                return Err(EngineError::Validation(sentinel_message(key)));
            }
        }
        Ok(())
    }

    /// A scalar parameter as text. `null` and blank strings count as absent.
    fn text(&self, key: &str) -> Option<String> {
        match self.inner.get(key)? {
            Value::String(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    fn required(&self, key: &str) -> Result<String, EngineError> {
        self.text(key)
            .ok_or_else(|| EngineError::Validation(format!("Missing {key}")))
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.inner.get(key).filter(|value| !value.is_null()).cloned()
    }

    fn explicit_network(&self) -> Result<Option<Network>, EngineError> {
        self.text("networkName")
            .map(|raw| {
                raw.parse::<Network>()
                    .map_err(|_| EngineError::Validation(sentinel_message("networkName")))
            })
            .transpose()
    }

    /// Named network, or the wallet's connected chain.
    fn network(&self, session: &SessionContext) -> Result<Network, EngineError> {
        if let Some(network) = self.explicit_network()? {
            return Ok(network);
        }
        let chain_id = session.chain_id.ok_or(EngineError::WalletUnavailable)?;
        Network::from_chain_id(chain_id).ok_or(EngineError::UnsupportedChain(chain_id))
    }

    /// Explicit `address`, or the session account.
    fn account(&self, session: &SessionContext) -> Result<Address, EngineError> {
        match self.text("address") {
            Some(raw) => parse_address("account", &raw),
            None => session.account.ok_or(EngineError::WalletUnavailable),
        }
    }

    /// `currencies` as a comma separated string or a list; defaults to USD and EUR.
    fn currencies(&self) -> Result<Vec<String>, EngineError> {
        let raw: Vec<String> = match self.inner.get("currencies") {
            Some(Value::String(text)) => text.split(',').map(str::to_string).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let mut currencies: Vec<String> = Vec::new();
        for code in raw.iter().map(|code| code.trim().to_lowercase()) {
            if code.is_empty() || currencies.contains(&code) {
                continue;
            }
            if !fiat_codes().any(|known| known == code) {
                return Err(EngineError::Validation(sentinel_message("currencies")));
            }
            currencies.push(code);
        }
        if currencies.is_empty() {
            currencies = DEFAULT_CURRENCIES.iter().map(|code| code.to_string()).collect();
        }
        Ok(currencies)
    }

    fn user_address(&self, session: &SessionContext) -> Result<Option<Address>, EngineError> {
        match self.text("userAddress") {
            Some(raw) => parse_address("user", &raw).map(Some),
            None => Ok(session.account),
        }
    }
}
