//! Background settlement tracking.
//!
//! Every signed transaction gets its own task that polls for the receipt until one
//! appears, reports the single terminal status to the card registry and then runs the
//! settlement hooks. Nothing here blocks the dispatcher.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cards::{CardKind, CardStatus, StatusCardRegistry};
use crate::chain::{ChainReader, ReceiptSummary, RpcFailure};
use crate::error::EngineError;
use crate::events::{EventBus, EventKind};
use crate::network::Network;
use crate::registry::{ContractRegistry, NewContract};
use crate::sentinel::DeployPayload;

/// Everything a watcher needs to know about one submitted transaction.
#[derive(Debug, Clone)]
pub struct WatchTicket {
    pub hash: B256,
    pub chain_id: u64,
    pub kind: CardKind,
    pub title: String,
    pub subtitle: Option<String>,
    /// Session account at submission time.
    pub account: Option<Address>,
    /// Set for contract creations.
    pub deployment: Option<DeployPayload>,
}

/// Final outcome handed to the settlement hooks.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub ticket: WatchTicket,
    pub status: CardStatus,
    pub receipt: Option<ReceiptSummary>,
}

#[async_trait]
pub trait SettlementHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_settled(&self, settlement: &Settlement, cards: &StatusCardRegistry) -> Result<(), EngineError>;
}

pub struct ConfirmationWatcher {
    chain: Arc<dyn ChainReader>,
    cards: Arc<StatusCardRegistry>,
    hooks: Vec<Arc<dyn SettlementHook>>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl ConfirmationWatcher {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        cards: Arc<StatusCardRegistry>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            chain,
            cards,
            hooks: Vec::new(),
            poll_interval,
            shutdown,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn SettlementHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn cards(&self) -> &Arc<StatusCardRegistry> {
        &self.cards
    }

    /// Create the waiting card now and track the receipt in the background.
    pub fn watch(&self, ticket: WatchTicket) -> JoinHandle<()> {
        self.cards.create(
            ticket.hash,
            ticket.kind,
            ticket.chain_id,
            ticket.title.clone(),
            ticket.subtitle.clone(),
        );

        let chain = self.chain.clone();
        let cards = self.cards.clone();
        let hooks = self.hooks.clone();
        let poll_interval = self.poll_interval;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = await_receipt(chain.as_ref(), ticket.chain_id, ticket.hash, poll_interval) => outcome,
                _ = shutdown.cancelled() => {
                    tracing::info!(tx = %ticket.hash, "Watcher stopped before settlement");
                    cards.abandon(ticket.hash);
                    return;
                }
            };

            let (status, receipt) = match outcome {
                Ok(receipt) if receipt.success => (CardStatus::Confirmed, Some(receipt)),
                Ok(receipt) => (CardStatus::Failed, Some(receipt)),
                Err(e) => {
                    tracing::warn!(tx = %ticket.hash, error = %e.message, "Waiting for receipt failed");
                    (CardStatus::Failed, None)
                }
            };
            cards.set_status(ticket.hash, status, None);

            let settlement = Settlement {
                ticket,
                status,
                receipt,
            };
            for hook in &hooks {
                if let Err(e) = hook.on_settled(&settlement, &cards).await {
                    tracing::warn!(
                        tx = %settlement.ticket.hash,
                        hook = hook.name(),
                        error = %e,
                        "Settlement hook failed"
                    );
                }
            }
        })
    }
}

/// Poll until the node returns a receipt. The first RPC error ends the wait.
async fn await_receipt(
    chain: &dyn ChainReader,
    chain_id: u64,
    hash: B256,
    poll_interval: Duration,
) -> Result<ReceiptSummary, RpcFailure> {
    let network = Network::from_chain_id(chain_id)
        .ok_or_else(|| RpcFailure::new(format!("unsupported chain {chain_id}")))?;
    let mut polls = 0u64;
    loop {
        if let Some(receipt) = chain.receipt(network, hash).await? {
            tracing::info!(tx = %hash, network = %network, polls, success = receipt.success, "Receipt received");
            return Ok(receipt);
        }
        polls += 1;
        tokio::time::sleep(poll_interval).await;
    }
}

/// Re-reads the session account balance once a transaction settles.
pub struct BalanceRefresh {
    chain: Arc<dyn ChainReader>,
    events: EventBus,
}

impl BalanceRefresh {
    pub fn new(chain: Arc<dyn ChainReader>, events: EventBus) -> Self {
        Self { chain, events }
    }
}

#[async_trait]
impl SettlementHook for BalanceRefresh {
    fn name(&self) -> &'static str {
        "balance_refresh"
    }

    async fn on_settled(&self, settlement: &Settlement, _cards: &StatusCardRegistry) -> Result<(), EngineError> {
        let Some(address) = settlement.ticket.account else {
            return Ok(());
        };
        let chain_id = settlement.ticket.chain_id;
        let network = Network::from_chain_id(chain_id).ok_or(EngineError::UnsupportedChain(chain_id))?;
        let balance_wei = self
            .chain
            .balance(network, address)
            .await
            .map_err(|e| EngineError::Provider(e.message))?;
        tracing::debug!(%address, network = %network, %balance_wei, "Balance refreshed");
        self.events.emit(EventKind::BalanceRefreshed {
            address,
            chain_id,
            balance_wei,
        });
        Ok(())
    }
}

/// Saves confirmed deployments to the contract registry.
pub struct DeployRegistration {
    registry: Arc<dyn ContractRegistry>,
}

impl DeployRegistration {
    pub fn new(registry: Arc<dyn ContractRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl SettlementHook for DeployRegistration {
    fn name(&self) -> &'static str {
        "deploy_registration"
    }

    async fn on_settled(&self, settlement: &Settlement, cards: &StatusCardRegistry) -> Result<(), EngineError> {
        if settlement.status != CardStatus::Confirmed {
            return Ok(());
        }
        let Some(payload) = settlement.ticket.deployment.as_ref() else {
            return Ok(());
        };
        let Some(address) = settlement
            .receipt
            .as_ref()
            .and_then(|receipt| receipt.contract_address)
        else {
            return Err(EngineError::NotFound(
                "Deployment receipt carries no contract address.".to_string(),
            ));
        };

        self.registry
            .save_contract(NewContract {
                user_address: settlement.ticket.account,
                network_name: Some(payload.network_name.clone()),
                file_name: Some(payload.file_name.clone()),
                contract_name: Some(payload.contract_name.clone()),
                abi: Some(payload.abi.clone()),
                bytecode_hash: Some(payload.bytecode_hash()),
                bytecode_length: payload.bytecode.len() * 2,
                constructor_args: payload.constructor_args.clone(),
                contract_address: Some(address),
                deploy_tx_hash: Some(settlement.ticket.hash),
            })
            .await?;
        cards.set_status(
            settlement.ticket.hash,
            CardStatus::Confirmed,
            Some(format!("Contract deployed at {address}")),
        );
        Ok(())
    }
}
