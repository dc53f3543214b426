//! Server-side wallet backed by a local private key.
//!
//! Signs with an [`EthereumWallet`] over the same JSON-RPC endpoints the chain reader
//! uses. The wallet is "connected" to one network at a time; [`LocalWalletSigner::switch_network`]
//! moves it and publishes [`WalletEvent::ChainChanged`].

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::str::FromStr;
use tokio::sync::{RwLock, broadcast};
use tracing::instrument;

use crate::chain::RpcFailure;
use crate::chain::evm::build_rpc_client;
use crate::config::EngineConfig;
use crate::network::Network;
use crate::wallet::{CHAIN_DISCONNECTED_CODE, SignerRequest, WalletEvent, WalletSigner};

const EVENT_CAPACITY: usize = 32;

pub struct LocalWalletSigner {
    address: Address,
    wallet: EthereumWallet,
    network: RwLock<Network>,
    config: EngineConfig,
    infura_api_key: Option<String>,
    events: broadcast::Sender<WalletEvent>,
}

impl LocalWalletSigner {
    pub fn new(
        signer: PrivateKeySigner,
        network: Network,
        config: EngineConfig,
        infura_api_key: Option<String>,
    ) -> Self {
        let address = signer.address();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            address,
            wallet: EthereumWallet::from(signer),
            network: RwLock::new(network),
            config,
            infura_api_key,
            events,
        }
    }

    /// Load the signer from `WALLET_PRIVATE_KEY`. Returns `Ok(None)` when it is unset.
    pub fn from_env(config: &EngineConfig) -> Result<Option<Self>, RpcFailure> {
        let Ok(raw_key) = std::env::var("WALLET_PRIVATE_KEY") else {
            return Ok(None);
        };
        let signer = PrivateKeySigner::from_str(raw_key.trim().trim_start_matches("0x"))
            .map_err(|e| RpcFailure::new(format!("failed to parse WALLET_PRIVATE_KEY: {e}")))?;
        let infura_api_key = std::env::var("INFURA_API_KEY").ok();
        Ok(Some(Self::new(
            signer,
            config.wallet.network,
            config.clone(),
            infura_api_key,
        )))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn network(&self) -> Network {
        *self.network.read().await
    }

    /// Reconnect the wallet to another network.
    pub async fn switch_network(&self, network: Network) {
        let previous = std::mem::replace(&mut *self.network.write().await, network);
        if previous != network {
            tracing::info!(from=%previous, to=%network, "Wallet switched network");
            let _ = self.events.send(WalletEvent::ChainChanged {
                chain_id: network.chain_id(),
            });
        }
    }
}

#[async_trait]
impl WalletSigner for LocalWalletSigner {
    async fn accounts(&self) -> Result<Vec<Address>, RpcFailure> {
        Ok(vec![self.address])
    }

    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(self.network().await.chain_id())
    }

    #[instrument(skip_all, fields(from = %request.from))]
    async fn send_transaction(&self, request: SignerRequest) -> Result<B256, RpcFailure> {
        let network = self.network().await;
        if let Some(requested) = request.chain_id {
            if requested != network.chain_id() {
                return Err(RpcFailure::new(format!(
                    "wallet is connected to chain {}, request targets chain {requested}",
                    network.chain_id()
                ))
                .with_code(CHAIN_DISCONNECTED_CODE));
            }
        }
        if request.from != self.address {
            return Err(RpcFailure::new(format!("unknown account {}", request.from)).with_code(4100));
        }

        let url = self
            .config
            .rpc_url_for(network, self.infura_api_key.as_deref())
            .ok_or_else(|| RpcFailure::new(format!("no RPC endpoint configured for {network}")))?;
        let client = build_rpc_client(&self.config, network, url)?;
        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .connect_client(client);

        let mut tx = TransactionRequest::default()
            .with_from(request.from)
            .with_chain_id(network.chain_id());
        tx = match request.to {
            Some(to) => tx.with_to(to),
            None => tx.into_create(),
        };
        if let Some(data) = request.data {
            tx = tx.with_input(data);
        }
        if let Some(value) = request.value {
            tx = tx.with_value(value);
        }

        let pending = provider.send_transaction(tx).await?;
        let hash = *pending.tx_hash();
        tracing::info!(network=%network, tx=%hash, "Transaction submitted");
        Ok(hash)
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn signer() -> LocalWalletSigner {
        // Well-known development key (Hardhat/Anvil account #0).
        let key = PrivateKeySigner::from_str(
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        LocalWalletSigner::new(key, Network::Ganache, EngineConfig::default(), None)
    }

    #[tokio::test]
    async fn test_accounts_and_chain() {
        let wallet = signer();
        assert_eq!(
            wallet.accounts().await.unwrap(),
            vec![address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")]
        );
        assert_eq!(wallet.chain_id().await.unwrap(), 1337);
    }

    #[tokio::test]
    async fn test_switch_network_publishes_event() {
        let wallet = signer();
        let mut events = wallet.subscribe();
        wallet.switch_network(Network::BaseSepolia).await;
        assert_eq!(
            events.recv().await.unwrap(),
            WalletEvent::ChainChanged { chain_id: 84532 }
        );
        // Same network again is not an event.
        wallet.switch_network(Network::BaseSepolia).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejects_request_for_other_chain() {
        let wallet = signer();
        let request = SignerRequest {
            from: wallet.address(),
            to: Some(Address::ZERO),
            data: None,
            value: None,
            chain_id: Some(1),
        };
        let failure = wallet.send_transaction(request).await.unwrap_err();
        assert_eq!(failure.code, Some(CHAIN_DISCONNECTED_CODE));
    }
}
