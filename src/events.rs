//! Engine event stream and the metrics collector that consumes it.
//!
//! Every state change the engine makes (slot transitions, signer round trips, card
//! updates, balance refreshes) is published as a timestamped [`EngineEvent`] on a
//! broadcast channel. Publishing never blocks and never fails: with no subscribers the
//! event is dropped.

use alloy::primitives::{Address, B256, U256};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::cards::{CardKind, CardStatus};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineEvent {
    /// Milliseconds since the Unix epoch.
    pub at_ms: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventKind {
    ActionReceived { action: String },
    ActionFailed { action: String, error_kind: String },
    OperationPrepared { operation: String, chain_id: u64 },
    OperationDiscarded { operation: String },
    SlotTransition { from: String, to: String },
    SignerRequested { operation: String, chain_id: u64 },
    SignerResolved { hash: Option<B256>, error: Option<String> },
    CardCreated { hash: B256, kind: CardKind },
    CardSettled { hash: B256, status: CardStatus },
    CardDismissed { hash: B256 },
    CardAbandoned { hash: B256 },
    BalanceRefreshed { address: Address, chain_id: u64, balance_wei: U256 },
    WalletAccountChanged { account: Option<Address> },
    WalletChainChanged { chain_id: u64 },
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Cloneable publisher handle.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, kind: EventKind) {
        tracing::trace!(?kind, "engine event");
        let _ = self.sender.send(EngineEvent { at_ms: now_ms(), kind });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

/// Counters exposed by [`MetricsCollector::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub actions: u64,
    pub action_failures: u64,
    pub operations_prepared: u64,
    pub operations_discarded: u64,
    pub signer_requests: u64,
    pub signer_failures: u64,
    pub confirmed: u64,
    pub failed: u64,
}

/// Consumes the event stream, keeps counters and logs latencies.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    actions: Arc<AtomicU64>,
    action_failures: Arc<AtomicU64>,
    operations_prepared: Arc<AtomicU64>,
    operations_discarded: Arc<AtomicU64>,
    signer_requests: Arc<AtomicU64>,
    signer_failures: Arc<AtomicU64>,
    confirmed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    last_action_at: Arc<AtomicU64>,
    last_signer_request_at: Arc<AtomicU64>,
    card_created_at: Arc<DashMap<B256, u64>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the consumer task. It stops when `shutdown` fires or the bus is dropped.
    pub fn spawn(&self, bus: &EventBus, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let collector = self.clone();
        let mut receiver = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = receiver.recv() => match received {
                        Ok(event) => collector.record(&event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Metrics collector lagged behind event stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.cancelled() => {
                        tracing::info!("Stopping metrics collector");
                        break;
                    }
                }
            }
        })
    }

    pub fn record(&self, event: &EngineEvent) {
        match &event.kind {
            EventKind::ActionReceived { .. } => {
                self.actions.fetch_add(1, Ordering::Relaxed);
                self.last_action_at.store(event.at_ms, Ordering::Relaxed);
            }
            EventKind::ActionFailed { action, error_kind } => {
                self.action_failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%action, %error_kind, "Action failed");
            }
            EventKind::OperationPrepared { operation, chain_id } => {
                self.operations_prepared.fetch_add(1, Ordering::Relaxed);
                let started = self.last_action_at.load(Ordering::Relaxed);
                tracing::info!(
                    %operation,
                    chain_id,
                    prepare_ms = event.at_ms.saturating_sub(started),
                    "Operation prepared"
                );
            }
            EventKind::OperationDiscarded { .. } => {
                self.operations_discarded.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::SignerRequested { .. } => {
                self.signer_requests.fetch_add(1, Ordering::Relaxed);
                self.last_signer_request_at.store(event.at_ms, Ordering::Relaxed);
            }
            EventKind::SignerResolved { hash, error } => {
                if error.is_some() {
                    self.signer_failures.fetch_add(1, Ordering::Relaxed);
                }
                let started = self.last_signer_request_at.load(Ordering::Relaxed);
                tracing::info!(
                    tx = ?hash,
                    ok = error.is_none(),
                    signer_ms = event.at_ms.saturating_sub(started),
                    "Signer resolved"
                );
            }
            EventKind::CardCreated { hash, .. } => {
                self.card_created_at.insert(*hash, event.at_ms);
            }
            EventKind::CardSettled { hash, status } => {
                match status {
                    CardStatus::Confirmed => self.confirmed.fetch_add(1, Ordering::Relaxed),
                    CardStatus::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
                    CardStatus::Waiting => 0,
                };
                if let Some((_, created)) = self.card_created_at.remove(hash) {
                    tracing::info!(
                        tx = %hash,
                        ?status,
                        settlement_ms = event.at_ms.saturating_sub(created),
                        "Transaction settled"
                    );
                }
            }
            EventKind::CardDismissed { hash } | EventKind::CardAbandoned { hash } => {
                self.card_created_at.remove(hash);
            }
            _ => {}
        }
    }

    /// Cards created but not yet settled, dismissed or abandoned.
    pub fn tracked_cards(&self) -> usize {
        self.card_created_at.len()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            actions: self.actions.load(Ordering::Relaxed),
            action_failures: self.action_failures.load(Ordering::Relaxed),
            operations_prepared: self.operations_prepared.load(Ordering::Relaxed),
            operations_discarded: self.operations_discarded.load(Ordering::Relaxed),
            signer_requests: self.signer_requests.load(Ordering::Relaxed),
            signer_failures: self.signer_failures.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
