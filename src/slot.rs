//! The single pending operation of a wallet session.
//!
//! At most one operation waits for confirmation at any time. Preparing a new one silently
//! replaces the previous one; confirming hands it to the signer and empties the slot no
//! matter how signing ends.

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::EngineError;
use crate::events::{EventBus, EventKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransfer {
    pub from: Address,
    pub to: Address,
    /// Amount as the user typed it, in whole native units (e.g. `"1.5"`).
    pub amount_decimal: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractWrite {
    pub contract_address: Address,
    pub chain_id: u64,
    pub function_name: String,
    pub encoded_data: Bytes,
    pub value_wei: U256,
    pub gas_estimate: Option<u64>,
    pub gas_price_wei: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PendingOperation {
    NativeTransfer(NativeTransfer),
    ContractWrite(ContractWrite),
}

impl PendingOperation {
    pub fn chain_id(&self) -> u64 {
        match self {
            PendingOperation::NativeTransfer(transfer) => transfer.chain_id,
            PendingOperation::ContractWrite(write) => write.chain_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PendingOperation::NativeTransfer(_) => "nativeTransfer",
            PendingOperation::ContractWrite(_) => "contractWrite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Awaiting(PendingOperation),
    Submitting(PendingOperation),
    /// Signing finished; the slot passes through here on its way back to `Empty`.
    Settled,
}

impl SlotState {
    pub fn name(&self) -> &'static str {
        match self {
            SlotState::Empty => "empty",
            SlotState::Awaiting(_) => "awaiting",
            SlotState::Submitting(_) => "submitting",
            SlotState::Settled => "settled",
        }
    }
}

#[derive(Debug)]
pub struct PendingSlot {
    state: SlotState,
    events: EventBus,
}

impl PendingSlot {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: SlotState::Empty,
            events,
        }
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        match &self.state {
            SlotState::Awaiting(op) => Some(op),
            _ => None,
        }
    }

    /// Install `op`, returning whatever unconfirmed operation it replaced.
    pub fn prepare(&mut self, op: PendingOperation) -> Option<PendingOperation> {
        self.events.emit(EventKind::OperationPrepared {
            operation: op.label().to_string(),
            chain_id: op.chain_id(),
        });
        let previous = self.transition(SlotState::Awaiting(op));
        match previous {
            SlotState::Awaiting(discarded) => {
                self.announce_discard(&discarded);
                Some(discarded)
            }
            _ => None,
        }
    }

    /// Drop an unconfirmed operation, if any, without reporting it to the user.
    pub fn discard_stale(&mut self) -> Option<PendingOperation> {
        if !matches!(self.state, SlotState::Awaiting(_)) {
            return None;
        }
        match self.transition(SlotState::Empty) {
            SlotState::Awaiting(discarded) => {
                self.announce_discard(&discarded);
                Some(discarded)
            }
            _ => None,
        }
    }

    /// Cancel the pending operation.
    pub fn deny(&mut self) -> Result<PendingOperation, EngineError> {
        if !matches!(self.state, SlotState::Awaiting(_)) {
            return Err(EngineError::NoPendingOperation("cancel"));
        }
        match self.transition(SlotState::Empty) {
            SlotState::Awaiting(op) => {
                tracing::info!(operation = op.label(), "Pending operation cancelled");
                Ok(op)
            }
            _ => Err(EngineError::NoPendingOperation("cancel")),
        }
    }

    /// Hand the pending operation to `submit` and return the slot to `Empty` once it resolves.
    ///
    /// The slot is cleared whether `submit` succeeds or fails.
    pub async fn confirm<F, Fut, T>(&mut self, submit: F) -> Result<T, EngineError>
    where
        F: FnOnce(PendingOperation) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let op = match &self.state {
            SlotState::Awaiting(op) => op.clone(),
            _ => return Err(EngineError::NoPendingOperation("confirm")),
        };
        self.transition(SlotState::Submitting(op.clone()));
        let outcome = submit(op).await;
        self.transition(SlotState::Settled);
        self.transition(SlotState::Empty);
        outcome
    }

    fn transition(&mut self, next: SlotState) -> SlotState {
        let from = self.state.name();
        let to = next.name();
        let previous = std::mem::replace(&mut self.state, next);
        tracing::debug!(from, to, "Pending slot transition");
        self.events.emit(EventKind::SlotTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
        previous
    }

    fn announce_discard(&self, discarded: &PendingOperation) {
        tracing::info!(operation = discarded.label(), "Discarded unconfirmed operation");
        self.events.emit(EventKind::OperationDiscarded {
            operation: discarded.label().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(amount: &str) -> PendingOperation {
        PendingOperation::NativeTransfer(NativeTransfer {
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            amount_decimal: amount.to_string(),
            chain_id: 11155111,
        })
    }

    #[test]
    fn test_prepare_overwrites() {
        let mut slot = PendingSlot::new(EventBus::new());
        assert_eq!(slot.prepare(transfer("1")), None);
        assert_eq!(slot.prepare(transfer("2")), Some(transfer("1")));
        assert_eq!(slot.pending(), Some(&transfer("2")));
    }

    #[test]
    fn test_deny_clears_and_empty_deny_fails() {
        let mut slot = PendingSlot::new(EventBus::new());
        assert!(matches!(slot.deny(), Err(EngineError::NoPendingOperation("cancel"))));
        slot.prepare(transfer("1"));
        assert_eq!(slot.deny().unwrap(), transfer("1"));
        assert_eq!(slot.state(), &SlotState::Empty);
    }

    #[tokio::test]
    async fn test_confirm_empty_does_not_submit() {
        let mut slot = PendingSlot::new(EventBus::new());
        let mut called = false;
        let result: Result<(), _> = slot
            .confirm(|_| {
                called = true;
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(EngineError::NoPendingOperation("confirm"))));
        assert!(!called);
    }

    #[tokio::test]
    async fn test_confirm_clears_on_failure() {
        let mut slot = PendingSlot::new(EventBus::new());
        slot.prepare(transfer("1"));
        let result: Result<(), _> = slot
            .confirm(|_| async { Err(EngineError::UserRejected) })
            .await;
        assert!(matches!(result, Err(EngineError::UserRejected)));
        assert_eq!(slot.state(), &SlotState::Empty);
    }

    #[tokio::test]
    async fn test_confirm_passes_through_settled() {
        let events = EventBus::new();
        let mut receiver = events.subscribe();
        let mut slot = PendingSlot::new(events);
        slot.prepare(transfer("1"));
        let op = slot.confirm(|op| async move { Ok(op) }).await.unwrap();
        assert_eq!(op, transfer("1"));

        let mut seen = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let EventKind::SlotTransition { to, .. } = event.kind {
                seen.push(to);
            }
        }
        assert_eq!(seen, vec!["awaiting", "submitting", "settled", "empty"]);
    }

    #[test]
    fn test_discard_stale() {
        let mut slot = PendingSlot::new(EventBus::new());
        assert_eq!(slot.discard_stale(), None);
        slot.prepare(transfer("3"));
        assert_eq!(slot.discard_stale(), Some(transfer("3")));
        assert!(slot.pending().is_none());
    }
}
