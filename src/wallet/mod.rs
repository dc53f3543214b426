//! Wallet signer seam.
//!
//! The engine never holds keys. It hands an EIP-1193 style `eth_sendTransaction` request to
//! a [`WalletSigner`] and gets back a transaction hash or an [`RpcFailure`]. Wallets also
//! publish account and chain switches as [`WalletEvent`]s.

use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::chain::RpcFailure;

pub mod local;

pub use local::LocalWalletSigner;

/// EIP-1193 code for a request the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 code for a wallet connected to a different chain than requested.
pub const CHAIN_DISCONNECTED_CODE: i64 = 4901;

/// Parameters of an `eth_sendTransaction` request.
///
/// `to` is absent for contract creation; `value` serializes as a `0x` hex quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerRequest {
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

/// Account or network switch reported by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WalletEvent {
    AccountsChanged { accounts: Vec<Address> },
    ChainChanged { chain_id: u64 },
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Connected accounts, primary first. Empty when locked.
    async fn accounts(&self) -> Result<Vec<Address>, RpcFailure>;

    async fn chain_id(&self) -> Result<u64, RpcFailure>;

    async fn send_transaction(&self, request: SignerRequest) -> Result<B256, RpcFailure>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}
