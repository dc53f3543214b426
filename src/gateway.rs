//! Submission of finalized transactions to the wallet signer.

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, B256};
use std::sync::Arc;
use tracing::instrument;

use crate::chain::evm::is_connectivity_failure;
use crate::chain::revert::extract_revert_reason;
use crate::chain::{CallRequest, ChainReader, RpcFailure};
use crate::error::EngineError;
use crate::events::{EventBus, EventKind};
use crate::network::Network;
use crate::preparer::classify_simulation_failure;
use crate::sentinel::DeployPayload;
use crate::slot::{ContractWrite, NativeTransfer, PendingOperation};
use crate::wallet::{SignerRequest, USER_REJECTED_CODE, WalletSigner};

/// Classify a signer failure into the user-facing taxonomy.
pub fn classify_signer_failure(failure: &RpcFailure) -> EngineError {
    let rejected = failure.code == Some(USER_REJECTED_CODE)
        || failure.messages().any(|message| {
            let lower = message.to_lowercase();
            lower.contains("user rejected")
                || lower.contains("user denied")
                || message.contains("ACTION_REJECTED")
        });
    if rejected {
        return EngineError::UserRejected;
    }
    if failure
        .messages()
        .any(|message| message.to_lowercase().contains("insufficient funds"))
    {
        return EngineError::InsufficientFunds;
    }
    if let Some(reason) = extract_revert_reason(failure) {
        return EngineError::ExecutionReverted(reason);
    }
    if is_connectivity_failure(failure) || failure.messages().any(|message| message.contains("NETWORK_ERROR")) {
        return EngineError::Network(failure.message.clone());
    }
    EngineError::Signing(failure.message.clone())
}

pub struct SigningGateway {
    wallet: Arc<dyn WalletSigner>,
    chain: Arc<dyn ChainReader>,
    events: EventBus,
}

impl SigningGateway {
    pub fn new(wallet: Arc<dyn WalletSigner>, chain: Arc<dyn ChainReader>, events: EventBus) -> Self {
        Self { wallet, chain, events }
    }

    /// Send a confirmed operation from `from`, returning the transaction hash.
    #[instrument(skip_all, fields(operation = op.label(), chain_id = op.chain_id()))]
    pub async fn send(&self, op: &PendingOperation, from: Address) -> Result<B256, EngineError> {
        let request = match op {
            PendingOperation::NativeTransfer(transfer) => self.transfer_request(transfer, from)?,
            PendingOperation::ContractWrite(write) => self.write_request(write, from).await?,
        };
        self.submit(op.label(), op.chain_id(), request).await
    }

    /// Send a contract creation built from `payload`.
    #[instrument(skip_all, fields(contract = %payload.contract_name, chain_id = chain_id))]
    pub async fn deploy(&self, payload: &DeployPayload, from: Address, chain_id: u64) -> Result<B256, EngineError> {
        self.ensure_chain(chain_id).await?;
        let request = SignerRequest {
            from,
            to: None,
            data: Some(payload.init_code()),
            value: None,
            chain_id: Some(chain_id),
        };
        self.submit("deploy", chain_id, request).await
    }

    fn transfer_request(&self, transfer: &NativeTransfer, from: Address) -> Result<SignerRequest, EngineError> {
        let value = parse_ether(&transfer.amount_decimal)
            .map_err(|_| EngineError::Validation(format!("Invalid amount: {}", transfer.amount_decimal)))?;
        Ok(SignerRequest {
            from,
            to: Some(transfer.to),
            data: None,
            value: Some(value),
            chain_id: Some(transfer.chain_id),
        })
    }

    async fn write_request(&self, write: &ContractWrite, from: Address) -> Result<SignerRequest, EngineError> {
        self.ensure_chain(write.chain_id).await?;
        let network = Network::from_chain_id(write.chain_id).ok_or(EngineError::UnsupportedChain(write.chain_id))?;

        // State may have moved since preparation.
        let simulation = CallRequest::call(
            Some(from),
            write.contract_address,
            write.encoded_data.clone(),
            write.value_wei,
        );
        if let Err(failure) = self.chain.call(network, &simulation).await {
            let error = classify_simulation_failure(&failure);
            tracing::warn!(error = %error, "Re-simulation before send failed");
            return Err(error);
        }

        Ok(SignerRequest {
            from,
            to: Some(write.contract_address),
            data: Some(write.encoded_data.clone()),
            value: (!write.value_wei.is_zero()).then_some(write.value_wei),
            chain_id: None,
        })
    }

    async fn ensure_chain(&self, expected: u64) -> Result<(), EngineError> {
        let actual = self
            .wallet
            .chain_id()
            .await
            .map_err(|failure| classify_signer_failure(&failure))?;
        if actual != expected {
            return Err(EngineError::ChainMismatch { expected, actual });
        }
        Ok(())
    }

    async fn submit(&self, operation: &str, chain_id: u64, request: SignerRequest) -> Result<B256, EngineError> {
        self.events.emit(EventKind::SignerRequested {
            operation: operation.to_string(),
            chain_id,
        });
        match self.wallet.send_transaction(request).await {
            Ok(hash) => {
                tracing::info!(tx = %hash, operation, "Signer returned transaction hash");
                self.events.emit(EventKind::SignerResolved {
                    hash: Some(hash),
                    error: None,
                });
                Ok(hash)
            }
            Err(failure) => {
                let error = classify_signer_failure(&failure);
                tracing::warn!(operation, error = %error, raw = %failure.message, "Signer request failed");
                self.events.emit(EventKind::SignerResolved {
                    hash: None,
                    error: Some(error.kind().to_string()),
                });
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_rejection_forms() {
        assert!(matches!(
            classify_signer_failure(&RpcFailure::new("whatever").with_code(4001)),
            EngineError::UserRejected
        ));
        assert!(matches!(
            classify_signer_failure(&RpcFailure::new("MetaMask Tx Signature: User denied transaction signature.")),
            EngineError::UserRejected
        ));
        let wrapped = RpcFailure::new("transaction failed")
            .with_cause(RpcFailure::new("user rejected transaction (action=\"sendTransaction\", code=ACTION_REJECTED)"));
        assert!(matches!(classify_signer_failure(&wrapped), EngineError::UserRejected));
    }

    #[test]
    fn test_funds_network_and_revert() {
        assert!(matches!(
            classify_signer_failure(&RpcFailure::new("insufficient funds for gas * price + value").with_code(-32000)),
            EngineError::InsufficientFunds
        ));
        assert!(matches!(
            classify_signer_failure(&RpcFailure::new("could not detect network (event=\"noNetwork\", code=NETWORK_ERROR)")),
            EngineError::Network(_)
        ));
        let reverted = RpcFailure::new("execution reverted")
            .with_code(3)
            .with_data(json!("0x08c379a0000000000000000000000000000000000000000000000000000000000000002000000000000000000000000000000000000000000000000000000000000000044e6f706500000000000000000000000000000000000000000000000000000000"));
        assert!(matches!(
            classify_signer_failure(&reverted),
            EngineError::ExecutionReverted(reason) if reason == "Nope"
        ));
        assert!(matches!(
            classify_signer_failure(&RpcFailure::new("execution reverted: network fee timeout").with_code(3)),
            EngineError::ExecutionReverted(reason) if reason == "network fee timeout"
        ));
        assert!(matches!(
            classify_signer_failure(&RpcFailure::new("nonce too low").with_code(-32000)),
            EngineError::Signing(message) if message == "nonce too low"
        ));
    }
}
