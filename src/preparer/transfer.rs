use tracing::instrument;

use super::{Prepared, TransactionPreparer, TransferRequest, or_na};
use crate::chain::CallRequest;
use crate::error::EngineError;
use crate::sentinel::{StructuredPayload, TxData};
use crate::slot::{NativeTransfer, PendingOperation};
use crate::validation::{display_ether, display_gwei, fee_wei, parse_address, parse_amount};

impl TransactionPreparer {
    #[instrument(skip_all, fields(network = %request.network))]
    pub async fn native_transfer(&self, request: &TransferRequest) -> Result<Prepared, EngineError> {
        let from = parse_address("sender", &request.sender)?;
        let to = parse_address("recipient", &request.recipient)?;
        let amount = request.amount.trim().to_string();
        let value = parse_amount(&amount)?;
        let network = request.network;
        let symbol = network.symbol();

        let (gas, price) = self
            .estimate(network, &CallRequest::transfer(from, to, value))
            .await;
        let gas_estimate = gas.map(|gas| gas.to_string());
        let gas_price_gwei = price.map(display_gwei);
        let fee = match (gas, price) {
            (Some(gas), Some(price)) => Some(display_ether(fee_wei(gas, price))),
            _ => None,
        };

        let preview = format!(
            "Transaction prepared:\nSend {amount} {symbol} from {from} to {to} on {network}.\n\n\
             Estimated Gas: {} units\nGas Price: {} Gwei\n≈ Fee: {} {symbol}\n\n\
             Confirm to sign it with your wallet, or cancel.",
            or_na(gas_estimate.clone()),
            or_na(gas_price_gwei.clone()),
            or_na(fee.clone()),
        );

        let operation = PendingOperation::NativeTransfer(NativeTransfer {
            from,
            to,
            amount_decimal: amount.clone(),
            chain_id: network.chain_id(),
        });
        let payload = StructuredPayload::Transfer(TxData {
            address: from,
            to,
            amount,
            network_name: network.to_string(),
            chain_id: network.chain_id(),
            symbol: symbol.to_string(),
            gas_estimate,
            gas_price_gwei,
            estimated_fee_eth: fee,
        });

        tracing::info!(%from, %to, "Native transfer prepared");
        Ok(Prepared {
            preview,
            operation: Some(operation),
            payload,
        })
    }
}
