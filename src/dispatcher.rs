//! Session-level routing of actions.
//!
//! One [`ActionDispatcher`] serves one wallet session. Dispatches are serialized by the
//! session lock: a preparation finishes before the slot is touched, and a confirmation's
//! signing round trip finishes before the next action is looked at. Settlement tracking
//! runs in watcher tasks outside the lock.

use alloy::primitives::{Address, B256};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::action::{Action, ActionRequest, SessionContext};
use crate::cards::{CardKind, StatusCardRegistry, shorten, truncate};
use crate::chain::ChainReader;
use crate::compiler::Compiler;
use crate::error::EngineError;
use crate::events::{EventBus, EventKind};
use crate::gateway::{SigningGateway, classify_signer_failure};
use crate::market::MarketSources;
use crate::network::Network;
use crate::preparer::{Prepared, TransactionPreparer};
use crate::queries::Queries;
use crate::registry::ContractRegistry;
use crate::sentinel::StructuredPayload;
use crate::slot::{PendingOperation, PendingSlot};
use crate::wallet::{WalletEvent, WalletSigner};
use crate::watcher::{BalanceRefresh, ConfirmationWatcher, DeployRegistration, WatchTicket};

/// Collaborators needed to assemble a dispatcher.
pub struct EngineParts {
    pub chain: Arc<dyn ChainReader>,
    pub registry: Arc<dyn ContractRegistry>,
    pub compiler: Arc<dyn Compiler>,
    pub wallet: Option<Arc<dyn WalletSigner>>,
    pub market: MarketSources,
    pub events: EventBus,
    /// Explorer base URLs keyed by chain id.
    pub explorers: HashMap<u64, String>,
    pub poll_interval: Duration,
    pub shutdown: CancellationToken,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub ok: bool,
    pub message: String,
    /// Text blocks: the message, and for preparations the sentinel payload.
    pub content: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Operation now waiting for confirmation, if any.
    pub pending: Option<PendingOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

impl Reply {
    fn text(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            ok: true,
            content: vec![message.clone()],
            message,
            error_kind: None,
            pending: None,
            tx_hash: None,
        }
    }

    fn prepared(prepared: Prepared) -> Self {
        let content = prepared.content();
        Self {
            ok: true,
            message: prepared.preview,
            content,
            error_kind: None,
            pending: prepared.operation,
            tx_hash: None,
        }
    }

    fn failure(error: &EngineError) -> Self {
        let message = error.to_string();
        Self {
            ok: false,
            content: vec![message.clone()],
            message,
            error_kind: Some(error.kind()),
            pending: None,
            tx_hash: None,
        }
    }
}

/// Read-only view of the session for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub network: Option<Network>,
    pub slot: &'static str,
    pub pending: Option<PendingOperation>,
}

struct Session {
    account: Option<Address>,
    chain_id: Option<u64>,
    slot: PendingSlot,
}

impl Session {
    fn context(&self) -> SessionContext {
        SessionContext {
            account: self.account,
            chain_id: self.chain_id,
        }
    }
}

pub struct ActionDispatcher {
    preparer: TransactionPreparer,
    gateway: Option<SigningGateway>,
    watcher: ConfirmationWatcher,
    queries: Queries,
    wallet: Option<Arc<dyn WalletSigner>>,
    session: Arc<Mutex<Session>>,
    events: EventBus,
    shutdown: CancellationToken,
}

impl ActionDispatcher {
    pub fn new(parts: EngineParts) -> Self {
        let queries = Queries::new(
            parts.chain.clone(),
            parts.registry.clone(),
            parts.market,
            parts.explorers.clone(),
        );
        let cards = Arc::new(StatusCardRegistry::new(parts.events.clone()).with_explorers(parts.explorers));
        let watcher = ConfirmationWatcher::new(
            parts.chain.clone(),
            cards,
            parts.poll_interval,
            parts.shutdown.clone(),
        )
        .with_hook(Arc::new(BalanceRefresh::new(parts.chain.clone(), parts.events.clone())))
        .with_hook(Arc::new(DeployRegistration::new(parts.registry.clone())));
        let gateway = parts
            .wallet
            .clone()
            .map(|wallet| SigningGateway::new(wallet, parts.chain.clone(), parts.events.clone()));

        Self {
            preparer: TransactionPreparer::new(parts.chain.clone(), parts.registry.clone(), parts.compiler),
            gateway,
            watcher,
            queries,
            wallet: parts.wallet,
            session: Arc::new(Mutex::new(Session {
                account: None,
                chain_id: None,
                slot: PendingSlot::new(parts.events.clone()),
            })),
            events: parts.events,
            shutdown: parts.shutdown,
        }
    }

    pub fn cards(&self) -> &Arc<StatusCardRegistry> {
        self.watcher.cards()
    }

    /// Read the wallet's account and chain, then follow its switches in the background.
    pub async fn connect(&self) -> Result<(), EngineError> {
        let Some(wallet) = self.wallet.clone() else {
            tracing::warn!("No wallet signer configured; signing actions are unavailable");
            return Ok(());
        };
        let mut receiver = wallet.subscribe();
        let accounts = wallet
            .accounts()
            .await
            .map_err(|failure| classify_signer_failure(&failure))?;
        let chain_id = wallet
            .chain_id()
            .await
            .map_err(|failure| classify_signer_failure(&failure))?;
        {
            let mut session = self.session.lock().await;
            session.account = accounts.first().copied();
            session.chain_id = Some(chain_id);
        }
        tracing::info!(account = ?accounts.first(), chain_id, "Wallet connected");

        let session = self.session.clone();
        let events = self.events.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    received = receiver.recv() => received,
                    _ = shutdown.cancelled() => break,
                };
                match event {
                    Ok(WalletEvent::AccountsChanged { accounts }) => {
                        let account = accounts.first().copied();
                        session.lock().await.account = account;
                        tracing::info!(?account, "Wallet account changed");
                        events.emit(EventKind::WalletAccountChanged { account });
                    }
                    Ok(WalletEvent::ChainChanged { chain_id }) => {
                        session.lock().await.chain_id = Some(chain_id);
                        tracing::info!(chain_id, "Wallet chain changed");
                        events.emit(EventKind::WalletChainChanged { chain_id });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Wallet event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(())
    }

    pub async fn session(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        SessionSnapshot {
            account: session.account,
            chain_id: session.chain_id,
            network: session.chain_id.and_then(Network::from_chain_id),
            slot: session.slot.state().name(),
            pending: session.slot.pending().cloned(),
        }
    }

    /// Handle one action. Errors are folded into a failed [`Reply`].
    #[instrument(skip_all, fields(action = %request.action))]
    pub async fn dispatch(&self, request: ActionRequest) -> Reply {
        self.events.emit(EventKind::ActionReceived {
            action: request.action.clone(),
        });
        let mut session = self.session.lock().await;
        // Requests that do not parse leave the session untouched.
        let result = match Action::parse(&request, &session.context()) {
            Ok(action) => {
                let slot_action = matches!(action, Action::ConfirmTransaction | Action::DenyTransaction);
                let result = self.handle(&mut session, action).await;
                let installed = result.as_ref().is_ok_and(|reply| reply.pending.is_some());
                if !slot_action && !installed {
                    session.slot.discard_stale();
                }
                result
            }
            Err(error) => Err(error),
        };
        drop(session);

        match result {
            Ok(reply) => reply,
            Err(error) => {
                if error.is_user_error() {
                    tracing::info!(error = %error, kind = error.kind(), "Action rejected");
                } else {
                    tracing::warn!(error = %error, kind = error.kind(), "Action failed");
                }
                self.events.emit(EventKind::ActionFailed {
                    action: request.action.clone(),
                    error_kind: error.kind().to_string(),
                });
                Reply::failure(&error)
            }
        }
    }

    async fn handle(&self, session: &mut Session, action: Action) -> Result<Reply, EngineError> {
        match action {
            Action::PrepareTransaction(transfer) => {
                let prepared = self.preparer.native_transfer(&transfer).await?;
                Ok(self.install(session, prepared))
            }
            Action::PrepareContractInteraction(call) => {
                let prepared = self.preparer.contract_call(&call).await?;
                Ok(self.install(session, prepared))
            }
            Action::ConfirmTransaction => self.confirm(session).await,
            Action::DenyTransaction => {
                session.slot.deny()?;
                Ok(Reply::text("Transaction cancelled."))
            }
            Action::DeployContract(deploy) => {
                let prepared = self.preparer.deploy(&deploy).await?;
                let StructuredPayload::Deploy(payload) = &prepared.payload else {
                    return Err(EngineError::Validation("Deployment produced no payload.".to_string()));
                };
                let gateway = self.gateway.as_ref().ok_or(EngineError::WalletUnavailable)?;
                let from = session.account.ok_or(EngineError::WalletUnavailable)?;
                let chain_id = deploy.network.chain_id();
                let hash = gateway.deploy(payload, from, chain_id).await?;
                self.watcher.watch(WatchTicket {
                    hash,
                    chain_id,
                    kind: CardKind::Deploy,
                    title: format!("Deploy {}", payload.contract_name),
                    subtitle: None,
                    account: Some(from),
                    deployment: Some(payload.clone()),
                });
                let mut reply = Reply::prepared(prepared);
                reply.message = format!("Deployment sent: {hash}");
                reply.content.push(reply.message.clone());
                reply.tx_hash = Some(hash);
                Ok(reply)
            }
            Action::GetBalance { address, network } => {
                Ok(Reply::text(self.queries.balance(address, network).await?))
            }
            Action::GetGasPrice { network } => Ok(Reply::text(self.queries.gas_price(network).await?)),
            Action::ListDeployedContracts { user_address, network } => {
                Ok(Reply::text(self.queries.list_contracts(user_address, network).await?))
            }
            Action::DescribeContracts {
                contract_address,
                contract_name,
                network,
                user_address,
            } => Ok(Reply::text(
                self.queries
                    .describe_contracts(
                        contract_address.as_deref(),
                        contract_name.as_deref(),
                        network,
                        user_address,
                    )
                    .await?,
            )),
            Action::ShowAddress { address } => Ok(Reply::text(self.queries.show_address(address))),
            Action::GetTransactions { address, network } => {
                Ok(Reply::text(self.queries.transactions(address, network).await?))
            }
            Action::GetPrice { crypto, currencies } => {
                Ok(Reply::text(self.queries.price(&crypto, &currencies).await?))
            }
            Action::GetTransactionDetails { hash, network } => {
                Ok(Reply::text(self.queries.transaction_details(hash, network).await?))
            }
        }
    }

    fn install(&self, session: &mut Session, prepared: Prepared) -> Reply {
        if let Some(operation) = prepared.operation.clone() {
            session.slot.prepare(operation);
        }
        Reply::prepared(prepared)
    }

    async fn confirm(&self, session: &mut Session) -> Result<Reply, EngineError> {
        let gateway = self.gateway.as_ref();
        let from = session.account;
        let (hash, operation) = session
            .slot
            .confirm(|operation| async move {
                let gateway = gateway.ok_or(EngineError::WalletUnavailable)?;
                let from = from.ok_or(EngineError::WalletUnavailable)?;
                let hash = gateway.send(&operation, from).await?;
                Ok((hash, operation))
            })
            .await?;

        let (kind, title, subtitle) = match &operation {
            PendingOperation::NativeTransfer(transfer) => {
                let symbol = Network::from_chain_id(transfer.chain_id)
                    .map(|network| network.symbol())
                    .unwrap_or("ETH");
                (
                    CardKind::Transfer,
                    "Transaction pending".to_string(),
                    Some(format!(
                        "Sending {} {symbol} to {}",
                        transfer.amount_decimal,
                        shorten(&transfer.to.to_string(), 10, 8)
                    )),
                )
            }
            PendingOperation::ContractWrite(write) => {
                let address = write.contract_address.to_string();
                (
                    CardKind::Contract,
                    format!("Invoking {}() function", write.function_name),
                    Some(format!("Waiting confirmation on {}...", truncate(&address, 10))),
                )
            }
        };
        self.watcher.watch(WatchTicket {
            hash,
            chain_id: operation.chain_id(),
            kind,
            title,
            subtitle,
            account: from,
            deployment: None,
        });

        let mut reply = Reply::text(format!("Transaction sent: {hash}"));
        reply.tx_hash = Some(hash);
        Ok(reply)
    }
}
