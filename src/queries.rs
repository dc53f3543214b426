//! Read-only answers that never touch the pending slot.

use alloy::json_abi::Function;
use alloy::primitives::{Address, B256, U256};
use chrono::DateTime;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::abi::{args_template, is_read_only, mutability_str};
use crate::chain::ChainReader;
use crate::error::EngineError;
use crate::market::{HistorySource, MarketSources, coin_id, fiat, format_fiat};
use crate::network::Network;
use crate::registry::{ContractFilter, ContractRegistry, select_records};
use crate::validation::{display_ether, display_gwei, parse_address};

/// Number of functions listed per contract description.
const DESCRIBE_LIMIT: usize = 10;

pub struct Queries {
    chain: Arc<dyn ChainReader>,
    registry: Arc<dyn ContractRegistry>,
    market: MarketSources,
    /// Explorer base URLs keyed by chain id.
    explorers: HashMap<u64, String>,
}

impl Queries {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        registry: Arc<dyn ContractRegistry>,
        market: MarketSources,
        explorers: HashMap<u64, String>,
    ) -> Self {
        Self {
            chain,
            registry,
            market,
            explorers,
        }
    }

    fn explorer(&self, network: Network) -> Option<String> {
        self.explorers
            .get(&network.chain_id())
            .cloned()
            .or_else(|| network.explorer_url().map(str::to_string))
            .map(|url| url.trim_end_matches('/').to_string())
    }

    pub fn show_address(&self, address: Option<Address>) -> String {
        match address {
            Some(address) => format!("Your wallet address is: {address}"),
            None => "Your wallet address is: Unknown".to_string(),
        }
    }

    #[instrument(skip_all, fields(network = %network, tx = %hash))]
    pub async fn transaction_details(&self, hash: B256, network: Network) -> Result<String, EngineError> {
        let tx = self
            .chain
            .transaction(network, hash)
            .await
            .map_err(|e| EngineError::Provider(e.message))?
            .ok_or_else(|| EngineError::NotFound(format!("No transaction found with hash {hash} on {network}.")))?;
        let receipt = self
            .chain
            .receipt(network, hash)
            .await
            .map_err(|e| EngineError::Provider(e.message))?;

        let status = match &receipt {
            Some(receipt) if receipt.success => "Success",
            Some(_) => "Failed",
            None => "Pending",
        };
        Ok(format!(
            "Transaction Details on {network}\nHash: {}\nFrom: {}\nTo: {}\nValue: {} {}\n\
             Gas Price: {} Gwei\nGas Limit: {}\nGas Used: {}\nBlock: {}\nStatus: {status}",
            tx.hash,
            tx.from,
            tx.to
                .map(|to| to.to_string())
                .unwrap_or_else(|| "Contract creation".to_string()),
            display_ether(tx.value),
            network.symbol(),
            display_gwei(tx.gas_price),
            tx.gas_limit,
            receipt
                .as_ref()
                .map(|receipt| receipt.gas_used.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            tx.block_number
                .map(|block| block.to_string())
                .unwrap_or_else(|| "Pending".to_string()),
        ))
    }

    #[instrument(skip_all, fields(crypto = %crypto))]
    pub async fn price(&self, crypto: &str, currencies: &[String]) -> Result<String, EngineError> {
        let id = coin_id(crypto);
        let Some(prices) = self.market.prices.prices(&id, currencies).await? else {
            return Err(EngineError::NotFound(format!(
                "Unsupported cryptocurrency: {}. Verify the token id on CoinGecko.",
                crypto.trim()
            )));
        };
        let lines: Vec<_> = currencies
            .iter()
            .filter_map(|code| {
                let price = prices.get(code)?;
                let (flag, symbol) = fiat(code)?;
                Some(format!("{flag} {}: {symbol}{}", code.to_uppercase(), format_fiat(*price)))
            })
            .collect();
        if lines.is_empty() {
            return Err(EngineError::NotFound(
                "No valid currency found for this request.".to_string(),
            ));
        }
        Ok(format!("Current {} Price:\n{}", id.to_uppercase(), lines.join("\n")))
    }

    #[instrument(skip_all, fields(network = %network))]
    pub async fn transactions(&self, address: Address, network: Network) -> Result<String, EngineError> {
        // History is indexed only where a public explorer exists.
        let Some(explorer) = network.explorer_url().and(self.explorer(network)) else {
            return Ok(format!("Transaction history not supported on {network}."));
        };
        let page = self
            .market
            .history
            .recent(network, address, self.market.history_limit)
            .await?;

        if page.entries.is_empty() {
            let mut text = format!("No transactions returned by the explorer for {address} on {network}.");
            if let Some(notice) = page.notice {
                text.push_str(&format!(" Explorer message: {notice}"));
            }
            text.push_str(&format!("\nCheck on explorer: {explorer}/address/{address}"));
            return Ok(text);
        }

        let source = match page.source {
            HistorySource::Normal => "",
            HistorySource::Internal => "internal ",
        };
        let mut text = format!(
            "Last {} {source}transactions of {address} on {network}:",
            page.entries.len()
        );
        for entry in &page.entries {
            let date = entry
                .timestamp
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "Unknown time".to_string());
            let to = entry
                .to
                .map(|to| to.to_string())
                .unwrap_or_else(|| "Contract creation".to_string());
            let status = if entry.success { "Success" } else { "Failed" };
            text.push_str(&format!(
                "\n- [{date}] {} {} → {to} | {status}",
                display_ether(entry.value),
                network.symbol()
            ));
            if let Some(hash) = entry.hash {
                text.push_str(&format!(" | {explorer}/tx/{hash}"));
            }
        }
        Ok(text)
    }

    #[instrument(skip_all, fields(network = %network))]
    pub async fn balance(&self, address: Address, network: Network) -> Result<String, EngineError> {
        let wei = self
            .chain
            .balance(network, address)
            .await
            .map_err(|e| EngineError::Provider(e.message))?;
        Ok(format!(
            "Current balance of {address} on {network} (chainId: {}): {} {}",
            network.chain_id(),
            display_ether(wei),
            network.symbol()
        ))
    }

    #[instrument(skip_all, fields(network = %network))]
    pub async fn gas_price(&self, network: Network) -> Result<String, EngineError> {
        let price = self
            .chain
            .gas_price(network)
            .await
            .map_err(|e| EngineError::Provider(e.message))?;
        Ok(format!(
            "Current gas price on {network}:\n- {} Gwei\n- {} {}",
            display_gwei(price),
            display_ether(U256::from(price)),
            network.symbol()
        ))
    }

    pub async fn list_contracts(
        &self,
        user_address: Option<Address>,
        network: Option<Network>,
    ) -> Result<String, EngineError> {
        let filter = ContractFilter {
            user_address,
            network_name: network.map(|network| network.to_string()),
        };
        let records = self.registry.list_contracts(&filter).await?;
        if records.is_empty() {
            return Ok("No deployed contracts found for the specified filters.".to_string());
        }
        let lines: Vec<_> = records
            .iter()
            .map(|record| {
                let tx = record
                    .deploy_tx_hash
                    .map(|hash| hash.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                format!("• {} (tx: {tx})", record.label())
            })
            .collect();
        Ok(format!("Deployed Contracts:\n{}", lines.join("\n")))
    }

    pub async fn describe_contracts(
        &self,
        contract_address: Option<&str>,
        contract_name: Option<&str>,
        network: Option<Network>,
        user_address: Option<Address>,
    ) -> Result<String, EngineError> {
        let address = contract_address
            .map(|raw| parse_address("contract", raw))
            .transpose()?;
        let filter = ContractFilter {
            user_address,
            network_name: network.map(|network| network.to_string()),
        };
        let records = select_records(self.registry.list_contracts(&filter).await?, address, contract_name);

        let record = match records.as_slice() {
            [] => return Ok("No contract has been found.".to_string()),
            [record] => record,
            many => {
                let labels: Vec<_> = many.iter().map(|record| format!("• {}", record.label())).collect();
                return Ok(format!(
                    "More contracts fulfil the request ({}). Specify the contract address.\n{}",
                    many.len(),
                    labels.join("\n")
                ));
            }
        };
        let Some(abi) = record.abi.as_ref().filter(|abi| !abi.functions.is_empty()) else {
            return Ok("No ABI found for this contract.".to_string());
        };

        let functions: Vec<&Function> = abi.functions().collect();
        let na = || "N/A".to_string();
        let mut text = format!(
            "{}\nAddress: {}\nNetwork: {}\nOwner/User: {}\nFunctions: {}{}\n\n\
             Arguments must be provided in strict positional order when calling functions \
             (e.g. [\"valueForParam1\", 123, \"0xabc...\"]).\n",
            record.contract_name.clone().unwrap_or_else(|| "(Unnamed Contract)".to_string()),
            record.contract_address.map(|a| a.to_string()).unwrap_or_else(na),
            record.network_name.clone().unwrap_or_else(na),
            record.user_address.map(|a| a.to_string()).unwrap_or_else(na),
            functions.len(),
            if functions.len() > DESCRIBE_LIMIT {
                format!(" (shown first {DESCRIBE_LIMIT})")
            } else {
                String::new()
            },
        );
        for function in functions.iter().take(DESCRIBE_LIMIT) {
            text.push('\n');
            text.push_str(&describe_function(function));
        }
        Ok(text)
    }
}

fn describe_function(function: &Function) -> String {
    let inputs: Vec<_> = function
        .inputs
        .iter()
        .map(|param| {
            let name = if param.name.is_empty() { "_" } else { param.name.as_str() };
            format!("{name}:{}", param.ty)
        })
        .collect();
    let outputs: Vec<_> = function.outputs.iter().map(|param| param.ty.clone()).collect();
    let order: Vec<_> = function
        .inputs
        .iter()
        .map(|param| if param.name.is_empty() { "_" } else { param.name.as_str() })
        .collect();
    let mutability = mutability_str(function.state_mutability);
    let mut notes = String::new();
    if is_read_only(function) {
        notes.push_str(" (read-only)");
    }
    if mutability == "payable" {
        notes.push_str(" (value needed)");
    }
    let or_dash = |parts: &[String]| if parts.is_empty() { "—".to_string() } else { parts.join(", ") };
    format!(
        "- {}\n  Parameters: {}\n  Returns: {}\n  Mutability: {mutability}{notes}\n  Template: {}\n  Positional order: ({})",
        function.signature(),
        or_dash(&inputs),
        or_dash(&outputs),
        args_template(&function.inputs),
        if order.is_empty() { "—".to_string() } else { order.join(", ") },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::json_abi::JsonAbi;

    #[test]
    fn test_describe_function() {
        let abi = JsonAbi::parse(["function deposit(uint256 amount, address) payable"]).unwrap();
        let text = describe_function(&abi.function("deposit").unwrap()[0]);
        assert!(text.starts_with("- deposit(uint256,address)"));
        assert!(text.contains("Parameters: amount:uint256, _:address"));
        assert!(text.contains("Returns: —"));
        assert!(text.contains("Mutability: payable (value needed)"));
        assert!(text.contains("Positional order: (amount, _)"));
    }
}
