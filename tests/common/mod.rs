//! In-memory stand-ins for the chain, the wallet, the registry and the compiler.

#![allow(dead_code)]

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use chainpilot::chain::{CallRequest, ChainReader, ReceiptSummary, RpcFailure, TransactionSummary};
use chainpilot::compiler::{CompiledContract, Compiler};
use chainpilot::dispatcher::{ActionDispatcher, EngineParts};
use chainpilot::error::EngineError;
use chainpilot::events::EventBus;
use chainpilot::market::{HistoryPage, HistorySource, MarketSources, PriceFeed, TransactionHistory};
use chainpilot::network::Network;
use chainpilot::registry::{ContractFilter, ContractRecord, ContractRegistry, NewContract};
use chainpilot::wallet::{SignerRequest, WalletEvent, WalletSigner};

pub const SEPOLIA: u64 = 11155111;

pub fn account() -> Address {
    "0x1111111111111111111111111111111111111111".parse().unwrap()
}

pub fn recipient() -> Address {
    "0x2222222222222222222222222222222222222222".parse().unwrap()
}

pub fn token_address() -> Address {
    "0x3333333333333333333333333333333333333333".parse().unwrap()
}

pub fn tx_hash(byte: u8) -> B256 {
    B256::repeat_byte(byte)
}

/// ABI-encoded `uint256`.
pub fn word(value: u64) -> Bytes {
    Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec())
}

/// Scripted chain. Static calls, receipts and estimates come from queues or fixed values.
#[derive(Default)]
pub struct MockChain {
    pub gas: Mutex<Option<u64>>,
    pub gas_price: Mutex<Option<u128>>,
    pub balance: Mutex<U256>,
    pub call_results: Mutex<VecDeque<Result<Bytes, RpcFailure>>>,
    pub calls: Mutex<Vec<CallRequest>>,
    pub receipts: Mutex<HashMap<B256, ReceiptSummary>>,
    pub receipt_polls: Mutex<u32>,
    pub transactions: Mutex<HashMap<B256, TransactionSummary>>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gas: Mutex::new(Some(21_000)),
            gas_price: Mutex::new(Some(2_000_000_000)),
            balance: Mutex::new(U256::from(10u64).pow(U256::from(18u64))),
            ..Default::default()
        })
    }

    pub fn push_call(&self, result: Result<Bytes, RpcFailure>) {
        self.call_results.lock().unwrap().push_back(result);
    }

    pub fn mine(&self, hash: B256, success: bool, contract_address: Option<Address>) {
        self.receipts.lock().unwrap().insert(
            hash,
            ReceiptSummary {
                transaction_hash: hash,
                success,
                block_number: Some(1),
                gas_used: 21_000,
                contract_address,
            },
        );
    }

    /// Make `hash` known to the node as a 1.5 ETH transfer from [`account`] to [`recipient`].
    pub fn broadcast(&self, hash: B256, block_number: Option<u64>) {
        self.transactions.lock().unwrap().insert(
            hash,
            TransactionSummary {
                hash,
                from: account(),
                to: Some(recipient()),
                value: U256::from(1_500_000_000_000_000_000u64),
                gas_price: 2_000_000_000,
                gas_limit: 21_000,
                block_number,
            },
        );
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn estimate_gas(&self, _network: Network, _request: &CallRequest) -> Result<u64, RpcFailure> {
        (*self.gas.lock().unwrap()).ok_or_else(|| RpcFailure::new("estimation unavailable"))
    }

    async fn gas_price(&self, _network: Network) -> Result<u128, RpcFailure> {
        (*self.gas_price.lock().unwrap()).ok_or_else(|| RpcFailure::new("fee data unavailable"))
    }

    async fn call(&self, _network: Network, request: &CallRequest) -> Result<Bytes, RpcFailure> {
        self.calls.lock().unwrap().push(request.clone());
        self.call_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Bytes::new()))
    }

    async fn balance(&self, _network: Network, _address: Address) -> Result<U256, RpcFailure> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn receipt(&self, _network: Network, hash: B256) -> Result<Option<ReceiptSummary>, RpcFailure> {
        *self.receipt_polls.lock().unwrap() += 1;
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    async fn transaction(&self, _network: Network, hash: B256) -> Result<Option<TransactionSummary>, RpcFailure> {
        Ok(self.transactions.lock().unwrap().get(&hash).cloned())
    }
}

/// Price feed answering from a fixed table keyed by coin id.
#[derive(Default)]
pub struct FakePrices {
    pub table: Mutex<HashMap<String, HashMap<String, f64>>>,
    pub requests: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakePrices {
    pub fn new() -> Arc<Self> {
        let prices = Self::default();
        prices.table.lock().unwrap().insert(
            "ethereum".to_string(),
            HashMap::from([("usd".to_string(), 3245.678), ("eur".to_string(), 2999.0)]),
        );
        Arc::new(prices)
    }
}

#[async_trait]
impl PriceFeed for FakePrices {
    async fn prices(&self, coin_id: &str, currencies: &[String]) -> Result<Option<HashMap<String, f64>>, EngineError> {
        self.requests
            .lock()
            .unwrap()
            .push((coin_id.to_string(), currencies.to_vec()));
        Ok(self.table.lock().unwrap().get(coin_id).cloned())
    }
}

/// History source returning whatever page is set, empty by default.
#[derive(Default)]
pub struct FakeHistory {
    pub page: Mutex<Option<HistoryPage>>,
    pub requests: Mutex<Vec<(Network, Address, usize)>>,
}

impl FakeHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TransactionHistory for FakeHistory {
    async fn recent(&self, network: Network, address: Address, limit: usize) -> Result<HistoryPage, EngineError> {
        self.requests.lock().unwrap().push((network, address, limit));
        Ok(self.page.lock().unwrap().clone().unwrap_or(HistoryPage {
            source: HistorySource::Normal,
            entries: Vec::new(),
            notice: None,
        }))
    }
}

/// Wallet that records every request and answers from a script.
pub struct MockWallet {
    pub chain_id: Mutex<u64>,
    pub requests: Mutex<Vec<SignerRequest>>,
    pub failure: Mutex<Option<RpcFailure>>,
    pub next_hash: Mutex<u8>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub fn new(chain_id: u64) -> Arc<Self> {
        let (events, _) = broadcast::channel(8);
        Arc::new(Self {
            chain_id: Mutex::new(chain_id),
            requests: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            next_hash: Mutex::new(0xaa),
            events,
        })
    }

    pub fn fail_with(&self, failure: RpcFailure) {
        *self.failure.lock().unwrap() = Some(failure);
    }

    pub fn switch_chain(&self, chain_id: u64) {
        *self.chain_id.lock().unwrap() = chain_id;
        let _ = self.events.send(WalletEvent::ChainChanged { chain_id });
    }

    pub fn requests(&self) -> Vec<SignerRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    async fn accounts(&self) -> Result<Vec<Address>, RpcFailure> {
        Ok(vec![account()])
    }

    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn send_transaction(&self, request: SignerRequest) -> Result<B256, RpcFailure> {
        self.requests.lock().unwrap().push(request);
        if let Some(failure) = self.failure.lock().unwrap().take() {
            return Err(failure);
        }
        let mut next = self.next_hash.lock().unwrap();
        let hash = tx_hash(*next);
        *next = next.wrapping_add(1);
        Ok(hash)
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    pub records: Mutex<Vec<ContractRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, record: ContractRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<ContractRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContractRegistry for MemoryRegistry {
    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<ContractRecord>, EngineError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn save_contract(&self, contract: NewContract) -> Result<ContractRecord, EngineError> {
        let mut records = self.records.lock().unwrap();
        let record = ContractRecord {
            id: format!("mem_{}", records.len()),
            saved_at: Utc::now(),
            user_address: contract.user_address,
            network_name: contract.network_name.map(|name| name.to_lowercase()),
            file_name: contract.file_name,
            contract_name: contract.contract_name,
            abi: contract.abi,
            bytecode_hash: contract.bytecode_hash,
            bytecode_length: contract.bytecode_length,
            constructor_args: contract.constructor_args,
            contract_address: contract.contract_address,
            deploy_tx_hash: contract.deploy_tx_hash,
        };
        records.push(record.clone());
        Ok(record)
    }
}

/// Returns the same artifacts for every source.
#[derive(Default)]
pub struct FakeCompiler {
    pub artifacts: Vec<CompiledContract>,
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, _file_name: &str, _source: &str) -> Result<Vec<CompiledContract>, EngineError> {
        Ok(self.artifacts.clone())
    }
}

pub fn token_abi() -> JsonAbi {
    JsonAbi::parse([
        "function transfer(address to, uint256 amount) returns (bool)",
        "function balanceOf(address owner) view returns (uint256)",
        "function deposit() payable",
    ])
    .unwrap()
}

pub fn token_record() -> ContractRecord {
    ContractRecord {
        id: "1_00000001".to_string(),
        saved_at: DateTime::UNIX_EPOCH,
        user_address: Some(account()),
        network_name: Some("ethereum-sepolia".to_string()),
        file_name: Some("Token.sol".to_string()),
        contract_name: Some("Token".to_string()),
        abi: Some(token_abi()),
        bytecode_hash: None,
        bytecode_length: 0,
        constructor_args: Vec::new(),
        contract_address: Some(token_address()),
        deploy_tx_hash: None,
    }
}

pub fn counter_artifact() -> CompiledContract {
    CompiledContract {
        name: "Counter".to_string(),
        abi: JsonAbi::parse(["constructor(uint256 start)", "function count() view returns (uint256)"]).unwrap(),
        bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
    }
}

pub struct Harness {
    pub dispatcher: ActionDispatcher,
    pub chain: Arc<MockChain>,
    pub wallet: Arc<MockWallet>,
    pub registry: Arc<MemoryRegistry>,
    pub prices: Arc<FakePrices>,
    pub history: Arc<FakeHistory>,
    pub events: EventBus,
    pub shutdown: CancellationToken,
}

impl Harness {
    pub async fn connected() -> Self {
        Self::build(true).await
    }

    pub async fn build(with_wallet: bool) -> Self {
        let chain = MockChain::new();
        let wallet = MockWallet::new(SEPOLIA);
        let registry = MemoryRegistry::new();
        let prices = FakePrices::new();
        let history = FakeHistory::new();
        let events = EventBus::new();
        let shutdown = CancellationToken::new();
        let dispatcher = ActionDispatcher::new(EngineParts {
            chain: chain.clone(),
            registry: registry.clone(),
            compiler: Arc::new(FakeCompiler {
                artifacts: vec![counter_artifact()],
            }),
            wallet: with_wallet.then(|| wallet.clone() as Arc<dyn WalletSigner>),
            market: MarketSources {
                prices: prices.clone(),
                history: history.clone(),
                history_limit: 5,
            },
            events: events.clone(),
            explorers: HashMap::from([(SEPOLIA, "https://sepolia.etherscan.io".to_string())]),
            poll_interval: Duration::from_millis(10),
            shutdown: shutdown.clone(),
        });
        dispatcher.connect().await.unwrap();
        Self {
            dispatcher,
            chain,
            wallet,
            registry,
            prices,
            history,
            events,
            shutdown,
        }
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
