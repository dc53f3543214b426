use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Bytes;
use tracing::instrument;

use super::{DeployRequest, Prepared, TransactionPreparer, or_na};
use crate::abi::{coerce_params, parse_constructor_args};
use crate::chain::CallRequest;
use crate::compiler::CompiledContract;
use crate::error::EngineError;
use crate::sentinel::{DeployPayload, StructuredPayload};
use crate::validation::{display_ether, fee_wei};

/// The named contract, or the first one that has bytecode.
fn select_artifact(
    contracts: Vec<CompiledContract>,
    name: Option<&str>,
    file_name: &str,
) -> Result<CompiledContract, EngineError> {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => contracts
            .into_iter()
            .find(|contract| contract.name == name)
            .ok_or_else(|| EngineError::NotFound(format!("Contract {name} not found in {file_name}"))),
        None => {
            let fallback = contracts.first().cloned();
            contracts
                .into_iter()
                .find(|contract| !contract.bytecode.is_empty())
                .or(fallback)
                .ok_or_else(|| EngineError::NotFound(format!("No contract found in {file_name}")))
        }
    }
}

/// ABI-encode constructor arguments against the artifact's constructor.
fn encode_constructor_args(
    artifact: &CompiledContract,
    args: &[serde_json::Value],
) -> Result<Bytes, EngineError> {
    let inputs = artifact
        .abi
        .constructor()
        .map(|constructor| constructor.inputs.as_slice())
        .unwrap_or_default();
    if inputs.len() != args.len() {
        return Err(EngineError::ArgumentFormat(format!(
            "Constructor error: expected {} arguments, received {}.",
            inputs.len(),
            args.len()
        )));
    }
    if inputs.is_empty() {
        return Ok(Bytes::new());
    }
    let values = coerce_params(inputs, args)
        .map_err(|reason| EngineError::ArgumentFormat(format!("Constructor error: {reason}")))?;
    Ok(DynSolValue::Tuple(values).abi_encode_params().into())
}

impl TransactionPreparer {
    #[instrument(skip_all, fields(network = %request.network, file = %request.file_name))]
    pub async fn deploy(&self, request: &DeployRequest) -> Result<Prepared, EngineError> {
        let network = request.network;
        let contracts = self.compiler.compile(&request.file_name, &request.source).await?;
        let artifact = select_artifact(contracts, request.contract_name.as_deref(), &request.file_name)?;
        if artifact.bytecode.is_empty() {
            return Err(EngineError::Compilation(format!(
                "Contract {} has no deployable bytecode.",
                artifact.name
            )));
        }

        let constructor_args = parse_constructor_args(request.constructor_args.as_ref())?;
        let encoded_args = encode_constructor_args(&artifact, &constructor_args)?;

        let mut payload = DeployPayload {
            file_name: request.file_name.clone(),
            contract_name: artifact.name.clone(),
            abi: artifact.abi,
            bytecode: artifact.bytecode,
            encoded_args,
            constructor_args,
            network_name: network.to_string(),
            gas_estimate: None,
            gas_cost_eth: None,
        };

        let (gas, price) = self
            .estimate(network, &CallRequest::create(request.user_address, payload.init_code()))
            .await;
        payload.gas_estimate = gas.map(|gas| gas.to_string());
        payload.gas_cost_eth = match (gas, price) {
            (Some(gas), Some(price)) => Some(display_ether(fee_wei(gas, price))),
            _ => None,
        };

        let preview = format!(
            "Contract {} compiled successfully.\nNetwork: {network}\n\
             Estimated gas: {} units\n~ Cost at current gas price: {} {}\n\
             Your wallet will be asked to sign the deployment.",
            payload.contract_name,
            or_na(payload.gas_estimate.clone()),
            or_na(payload.gas_cost_eth.clone()),
            network.symbol(),
        );

        tracing::info!(contract = %payload.contract_name, "Deployment prepared");
        Ok(Prepared {
            preview,
            operation: None,
            payload: StructuredPayload::Deploy(payload),
        })
    }
}
