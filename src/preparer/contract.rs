use alloy::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy::json_abi::{Function, StateMutability};
use alloy::primitives::{Bytes, U256};
use serde_json::Value;
use tracing::instrument;

use super::{ContractCallRequest, Prepared, TransactionPreparer, or_na};
use crate::abi::{
    coerce_params, format_value, is_read_only, labelled_args, mutability_str, ordered_params,
    parse_function_args, select_function, value_to_json,
};
use crate::chain::evm::is_connectivity_failure;
use crate::chain::revert::extract_revert_reason;
use crate::chain::{CallRequest, RpcFailure};
use crate::error::EngineError;
use crate::registry::{ContractFilter, select_records};
use crate::sentinel::{ContractCallData, ContractCallKind, StructuredPayload};
use crate::slot::{ContractWrite, PendingOperation};
use crate::validation::{display_ether, display_gwei, fee_wei, parse_address, parse_value_eth};

/// Map a failed simulation to the error shown to the user.
pub fn classify_simulation_failure(failure: &RpcFailure) -> EngineError {
    if let Some(reason) = extract_revert_reason(failure) {
        return EngineError::SimulatedRevert(reason);
    }
    if is_connectivity_failure(failure) {
        return EngineError::Network(failure.message.clone());
    }
    EngineError::SimulationFailed(failure.message.clone())
}

/// Calldata for `function` with already coerced arguments.
pub(crate) fn encode_call(function: &Function, values: Vec<DynSolValue>) -> Bytes {
    let mut data = function.selector().to_vec();
    data.extend(DynSolValue::Tuple(values).abi_encode_params());
    data.into()
}

fn decode_outputs(function: &Function, raw: &[u8]) -> Result<Vec<DynSolValue>, String> {
    let types = function
        .outputs
        .iter()
        .map(|param| param.resolve())
        .collect::<Result<Vec<DynSolType>, _>>()
        .map_err(|e| e.to_string())?;
    if types.is_empty() {
        return Ok(Vec::new());
    }
    match DynSolType::Tuple(types).abi_decode_sequence(raw) {
        Ok(DynSolValue::Tuple(values)) => Ok(values),
        Ok(other) => Ok(vec![other]),
        Err(e) => Err(e.to_string()),
    }
}

impl TransactionPreparer {
    #[instrument(skip_all, fields(network = %request.network, function = %request.function_name))]
    pub async fn contract_call(&self, request: &ContractCallRequest) -> Result<Prepared, EngineError> {
        let network = request.network;
        let function_name = request.function_name.trim();
        if function_name.is_empty() {
            return Err(EngineError::Validation("Missing functionName".to_string()));
        }
        let address_filter = request
            .contract_address
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| parse_address("contract", raw))
            .transpose()?;

        let filter = ContractFilter {
            user_address: request.user_address,
            network_name: Some(network.to_string()),
        };
        let records = self.registry.list_contracts(&filter).await?;
        let mut matches = select_records(records, address_filter, request.contract_name.as_deref());
        if matches.len() != 1 {
            return Err(EngineError::AmbiguousTarget(
                matches.iter().map(|record| record.label()).collect(),
            ));
        }
        let record = matches.remove(0);
        let contract_address = record.contract_address.ok_or_else(|| {
            EngineError::NotFound("Selected contract has no on-chain address saved.".to_string())
        })?;
        let abi = record
            .abi
            .as_ref()
            .filter(|abi| !abi.functions.is_empty())
            .ok_or_else(|| EngineError::NotFound("ABI not available for this contract.".to_string()))?;

        let args = parse_function_args(request.args.as_ref())?;
        let function = select_function(abi, function_name, args.len())?;

        let value_eth = request
            .value_eth
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty());
        let value_wei = match (function.state_mutability, value_eth) {
            (StateMutability::Payable, Some(raw)) => parse_value_eth(raw)?,
            (StateMutability::Payable, None) => U256::ZERO,
            (_, Some(_)) => return Err(EngineError::Payability(function_name.to_string())),
            (_, None) => U256::ZERO,
        };

        let values = coerce_params(&function.inputs, &args).map_err(EngineError::ArgumentFormat)?;
        let data = encode_call(function, values);
        let symbol = network.symbol();

        let mutability = mutability_str(function.state_mutability);
        let mut summary = format!(
            "Preparing call to {function_name} on contract {contract_address}\n\
             Network: {network} | Mutability: {mutability}\n\
             Args ({}): {}\n\
             Expected order: {}\n\
             Arguments must be provided in strict positional order.\n",
            args.len(),
            labelled_args(&function.inputs, &args),
            ordered_params(&function.inputs),
        );
        if !value_wei.is_zero() {
            summary.push_str(&format!("Value: {} {symbol}\n", display_ether(value_wei)));
        }

        if is_read_only(function) {
            let raw = self
                .chain
                .call(
                    network,
                    &CallRequest::call(request.user_address, contract_address, data.clone(), U256::ZERO),
                )
                .await
                .map_err(|failure| {
                    EngineError::SimulationFailed(
                        extract_revert_reason(&failure).unwrap_or_else(|| failure.message.clone()),
                    )
                })?;
            let decoded = decode_outputs(function, &raw).map_err(EngineError::SimulationFailed)?;
            let result_text = if decoded.is_empty() {
                "—".to_string()
            } else {
                decoded
                    .iter()
                    .enumerate()
                    .map(|(index, value)| format!("[#{index}] {}", format_value(value)))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            summary.push_str("Read-only function executed.\nResult:\n");
            summary.push_str(&result_text);

            tracing::info!(contract = %contract_address, "Read-only call answered");
            return Ok(Prepared {
                preview: summary,
                operation: None,
                payload: StructuredPayload::ContractCall(ContractCallData {
                    kind: ContractCallKind::ContractRead,
                    contract_address,
                    network_name: network.to_string(),
                    chain_id: None,
                    function: function_name.to_string(),
                    args,
                    data,
                    outputs: Some(decoded.iter().map(value_to_json).collect::<Vec<Value>>()),
                    value_wei: None,
                    gas_estimate: None,
                    gas_price_wei: None,
                    read_only: true,
                }),
            });
        }

        let simulation = CallRequest::call(request.user_address, contract_address, data.clone(), value_wei);
        if let Err(failure) = self.chain.call(network, &simulation).await {
            let error = classify_simulation_failure(&failure);
            tracing::info!(contract = %contract_address, error = %error, "Simulation rejected call");
            return Err(error);
        }

        let (gas, price) = self.estimate(network, &simulation).await;
        summary.push_str(&format!("Estimated Gas: {}\n", or_na(gas.map(|gas| gas.to_string()))));
        if let Some(price) = price {
            summary.push_str(&format!("Gas Price: {} Gwei\n", display_gwei(price)));
        }
        if let (Some(gas), Some(price)) = (gas, price) {
            summary.push_str(&format!(
                "~ Cost: {} {symbol}\n",
                display_ether(fee_wei(gas, price))
            ));
        }
        summary.push_str("Confirm to sign and send the transaction with your wallet, or cancel.");

        let chain_id = network.chain_id();
        let operation = PendingOperation::ContractWrite(ContractWrite {
            contract_address,
            chain_id,
            function_name: function_name.to_string(),
            encoded_data: data.clone(),
            value_wei,
            gas_estimate: gas,
            gas_price_wei: price,
        });
        let payload = StructuredPayload::ContractCall(ContractCallData {
            kind: ContractCallKind::ContractWrite,
            contract_address,
            network_name: network.to_string(),
            chain_id: Some(chain_id),
            function: function_name.to_string(),
            args,
            data,
            outputs: None,
            value_wei: Some(value_wei),
            gas_estimate: gas.map(|gas| gas.to_string()),
            gas_price_wei: price.map(|price| price.to_string()),
            read_only: false,
        });

        tracing::info!(contract = %contract_address, "Contract write prepared");
        Ok(Prepared {
            preview: summary,
            operation: Some(operation),
            payload,
        })
    }
}
