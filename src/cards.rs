//! Status cards for submitted transactions.
//!
//! One card per transaction hash. A card starts `waiting` and moves exactly once to
//! `confirmed` or `failed`; terminal cards never change status again and are removed
//! only when the user dismisses them.

use alloy::primitives::B256;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EngineError;
use crate::events::{EventBus, EventKind, now_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Transfer,
    Contract,
    Deploy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Waiting,
    Confirmed,
    Failed,
}

impl CardStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CardStatus::Waiting)
    }
}

impl Display for CardStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CardStatus::Waiting => write!(f, "Waiting"),
            CardStatus::Confirmed => write!(f, "Confirmed"),
            CardStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCard {
    pub hash: B256,
    pub kind: CardKind,
    pub status: CardStatus,
    pub chain_id: u64,
    pub title: String,
    /// Secondary line; replaced by the settlement text once terminal.
    pub detail: String,
    pub created_at_ms: u64,
    #[serde(skip)]
    seq: u64,
}

impl StatusCard {
    pub fn dismissable(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Result of a [`StatusCardRegistry::set_status`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Status moved from waiting to a terminal state.
    Settled,
    /// Same status as before; detail refreshed.
    Refreshed,
    /// Card is terminal with a different status; nothing changed.
    Ignored,
    /// No card for this hash.
    Missing,
}

pub struct StatusCardRegistry {
    cards: DashMap<B256, StatusCard>,
    next_seq: AtomicU64,
    explorers: HashMap<u64, String>,
    events: EventBus,
}

impl StatusCardRegistry {
    pub fn new(events: EventBus) -> Self {
        Self {
            cards: DashMap::new(),
            next_seq: AtomicU64::new(0),
            explorers: HashMap::new(),
            events,
        }
    }

    /// Explorer base URLs keyed by chain id, used when rendering.
    pub fn with_explorers(mut self, explorers: HashMap<u64, String>) -> Self {
        self.explorers = explorers;
        self
    }

    /// Insert a `waiting` card. Returns `false` if a card for `hash` already exists.
    pub fn create(
        &self,
        hash: B256,
        kind: CardKind,
        chain_id: u64,
        title: impl Into<String>,
        subtitle: Option<String>,
    ) -> bool {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut inserted = false;
        self.cards.entry(hash).or_insert_with(|| {
            inserted = true;
            StatusCard {
                hash,
                kind,
                status: CardStatus::Waiting,
                chain_id,
                title: title.into(),
                detail: subtitle.unwrap_or_else(|| "Waiting for confirmation...".to_string()),
                created_at_ms: now_ms(),
                seq,
            }
        });
        if inserted {
            tracing::info!(tx=%hash, ?kind, chain_id, "Status card created");
            self.events.emit(EventKind::CardCreated { hash, kind });
        } else {
            tracing::warn!(tx=%hash, "Status card already exists");
        }
        inserted
    }

    pub fn set_status(&self, hash: B256, status: CardStatus, detail: Option<String>) -> StatusUpdate {
        let Some(mut card) = self.cards.get_mut(&hash) else {
            return StatusUpdate::Missing;
        };
        if card.status == status {
            if let Some(detail) = detail {
                card.detail = detail;
            }
            return StatusUpdate::Refreshed;
        }
        if card.status.is_terminal() {
            tracing::warn!(tx=%hash, current=?card.status, requested=?status, "Ignoring status change on settled card");
            return StatusUpdate::Ignored;
        }
        card.status = status;
        card.detail = detail.unwrap_or_else(|| default_detail(status).to_string());
        drop(card);
        if status.is_terminal() {
            tracing::info!(tx=%hash, ?status, "Status card settled");
            self.events.emit(EventKind::CardSettled { hash, status });
        }
        StatusUpdate::Settled
    }

    /// Record that nobody tracks `hash` any more. The card stays `waiting`.
    pub fn abandon(&self, hash: B256) {
        if self.cards.get(&hash).is_some_and(|card| !card.status.is_terminal()) {
            tracing::info!(tx=%hash, "Status card left waiting");
            self.events.emit(EventKind::CardAbandoned { hash });
        }
    }

    pub fn get(&self, hash: &B256) -> Option<StatusCard> {
        self.cards.get(hash).map(|card| card.clone())
    }

    /// All cards, newest first.
    pub fn list(&self) -> Vec<StatusCard> {
        let mut cards: Vec<_> = self.cards.iter().map(|card| card.clone()).collect();
        cards.sort_by(|a, b| b.seq.cmp(&a.seq));
        cards
    }

    /// Remove a terminal card.
    pub fn dismiss(&self, hash: &B256) -> Result<StatusCard, EngineError> {
        let removed = self
            .cards
            .remove_if(hash, |_, card| card.dismissable())
            .map(|(_, card)| card);
        match removed {
            Some(card) => {
                self.events.emit(EventKind::CardDismissed { hash: *hash });
                Ok(card)
            }
            None if self.cards.contains_key(hash) => Err(EngineError::Validation(
                "Transaction is still waiting for confirmation; it can be closed once it settles."
                    .to_string(),
            )),
            None => Err(EngineError::NotFound(format!("No status card for {hash}."))),
        }
    }

    pub fn explorer_tx_url(&self, chain_id: u64, hash: &B256) -> Option<String> {
        self.explorers
            .get(&chain_id)
            .map(|base| format!("{}/tx/{hash}", base.trim_end_matches('/')))
    }

    /// Plain-text rendering of one card.
    pub fn render(&self, card: &StatusCard) -> String {
        let icon = match card.kind {
            CardKind::Transfer => "🔁",
            CardKind::Contract => "⚙️",
            CardKind::Deploy => "🧱",
        };
        let badge = match card.status {
            CardStatus::Waiting => "⏳ Waiting",
            CardStatus::Confirmed => "✅ Confirmed",
            CardStatus::Failed => "❌ Failed",
        };
        let hash = card.hash.to_string();
        let link = self
            .explorer_tx_url(card.chain_id, &card.hash)
            .unwrap_or_else(|| shorten(&hash, 10, 8));
        let mut text = format!(
            "{icon} {}\nHash: {link}\n{}\n{badge}",
            card.title, card.detail
        );
        if card.dismissable() {
            text.push_str(" [close]");
        }
        text
    }
}

fn default_detail(status: CardStatus) -> &'static str {
    match status {
        CardStatus::Waiting => "Waiting for confirmation...",
        CardStatus::Confirmed => "Transaction Confirmed",
        CardStatus::Failed => "Transaction Failed",
    }
}

/// `0x12345678...abcdef12` style abbreviation.
pub fn shorten(value: &str, head: usize, tail: usize) -> String {
    if value.len() <= head + tail + 3 {
        return value.to_string();
    }
    format!("{}...{}", &value[..head], &value[value.len() - tail..])
}

/// First `len` characters of `value`.
pub fn truncate(value: &str, len: usize) -> String {
    value.chars().take(len).collect()
}
