//! Deployed-contract registry.
//!
//! [`FileContractRegistry`] keeps every record in one JSON array on disk. Reads are served
//! from an in-memory copy that is reloaded whenever the file's modification time moves
//! forward; writes go to a temporary file that is renamed over the original.

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::Mutex;

use crate::error::{EngineError, candidate_label};
use crate::events::now_ms;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    #[serde(default)]
    pub id: String,
    /// Written as an ISO-8601 string; epoch milliseconds are accepted on read.
    #[serde(default = "Utc::now", with = "saved_at")]
    pub saved_at: DateTime<Utc>,
    pub user_address: Option<Address>,
    /// Lowercased network name.
    pub network_name: Option<String>,
    pub file_name: Option<String>,
    pub contract_name: Option<String>,
    #[serde(default)]
    pub abi: Option<JsonAbi>,
    pub bytecode_hash: Option<String>,
    /// Length of the hex-encoded bytecode.
    #[serde(default)]
    pub bytecode_length: usize,
    #[serde(default)]
    pub constructor_args: Vec<Value>,
    pub contract_address: Option<Address>,
    pub deploy_tx_hash: Option<B256>,
}

impl ContractRecord {
    pub fn label(&self) -> String {
        candidate_label(
            self.contract_name.as_deref(),
            self.contract_address,
            self.network_name.as_deref(),
        )
    }
}

/// Input for [`ContractRegistry::save_contract`].
#[derive(Debug, Clone, Default)]
pub struct NewContract {
    pub user_address: Option<Address>,
    pub network_name: Option<String>,
    pub file_name: Option<String>,
    pub contract_name: Option<String>,
    pub abi: Option<JsonAbi>,
    pub bytecode_hash: Option<String>,
    pub bytecode_length: usize,
    pub constructor_args: Vec<Value>,
    pub contract_address: Option<Address>,
    pub deploy_tx_hash: Option<B256>,
}

/// Optional narrowing applied by [`ContractRegistry::list_contracts`].
#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    pub user_address: Option<Address>,
    pub network_name: Option<String>,
}

impl ContractFilter {
    pub fn matches(&self, record: &ContractRecord) -> bool {
        if let Some(user) = self.user_address {
            if record.user_address != Some(user) {
                return false;
            }
        }
        if let Some(network) = &self.network_name {
            let wanted = network.trim();
            if !record
                .network_name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait ContractRegistry: Send + Sync {
    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<ContractRecord>, EngineError>;

    async fn save_contract(&self, contract: NewContract) -> Result<ContractRecord, EngineError>;
}

/// Narrow `records` by address and case-insensitive name.
pub fn select_records(
    records: Vec<ContractRecord>,
    address: Option<Address>,
    name: Option<&str>,
) -> Vec<ContractRecord> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());
    records
        .into_iter()
        .filter(|record| address.is_none_or(|address| record.contract_address == Some(address)))
        .filter(|record| {
            name.is_none_or(|name| {
                record
                    .contract_name
                    .as_deref()
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
            })
        })
        .collect()
}

#[derive(Default)]
struct Cache {
    records: Option<Vec<ContractRecord>>,
    modified: Option<SystemTime>,
}

pub struct FileContractRegistry {
    path: PathBuf,
    cache: Mutex<Cache>,
    next_id: AtomicU64,
}

impl FileContractRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(Cache::default()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn modified(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.path)
            .await
            .ok()
            .and_then(|meta| meta.modified().ok())
    }

    async fn read_file(&self) -> Result<Vec<ContractRecord>, EngineError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EngineError::Registry(e.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<Value> = serde_json::from_str(&raw).map_err(|e| {
            EngineError::Registry(format!("{} is not a valid registry file: {e}", self.path.display()))
        })?;
        Ok(entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), index, error = %e, "Skipping unreadable registry record");
                    None
                }
            })
            .collect())
    }

    async fn write_file(&self, records: &[ContractRecord]) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::Registry(e.to_string()))?;
        }
        let body = serde_json::to_string_pretty(records).map_err(|e| EngineError::Registry(e.to_string()))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| EngineError::Registry(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| EngineError::Registry(e.to_string()))
    }

    /// Reload the cached records if the file changed, disappeared, or was never read.
    async fn refresh<'a>(&self, cache: &'a mut Cache) -> Result<&'a mut Vec<ContractRecord>, EngineError> {
        let modified = self.modified().await;
        let stale = match (&cache.records, modified, cache.modified) {
            (None, _, _) => true,
            (Some(_), None, _) => true,
            (Some(_), Some(current), Some(seen)) => current > seen,
            (Some(_), Some(_), None) => true,
        };
        if stale {
            let records = if modified.is_some() { self.read_file().await? } else { Vec::new() };
            tracing::debug!(path = %self.path.display(), count = records.len(), "Registry reloaded");
            cache.records = Some(records);
            cache.modified = modified;
        }
        Ok(cache.records.get_or_insert_with(Vec::new))
    }

    fn next_id(&self) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_nanos())
            .unwrap_or_default();
        format!("{}_{:08x}", now_ms(), nanos.wrapping_add(seq as u32))
    }
}

#[async_trait]
impl ContractRegistry for FileContractRegistry {
    /// An unreadable file lists as empty; saving into it still fails.
    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<ContractRecord>, EngineError> {
        let mut cache = self.cache.lock().await;
        match self.refresh(&mut cache).await {
            Ok(records) => Ok(records.iter().filter(|record| filter.matches(record)).cloned().collect()),
            Err(e) => {
                tracing::warn!(error = %e, "Registry unreadable, listing no contracts");
                Ok(Vec::new())
            }
        }
    }

    async fn save_contract(&self, contract: NewContract) -> Result<ContractRecord, EngineError> {
        let record = ContractRecord {
            id: self.next_id(),
            saved_at: Utc::now(),
            user_address: contract.user_address,
            network_name: contract
                .network_name
                .map(|name| name.trim().to_lowercase()),
            file_name: contract.file_name,
            contract_name: contract.contract_name,
            abi: contract.abi,
            bytecode_hash: contract.bytecode_hash,
            bytecode_length: contract.bytecode_length,
            constructor_args: contract.constructor_args,
            contract_address: contract.contract_address,
            deploy_tx_hash: contract.deploy_tx_hash,
        };

        let mut cache = self.cache.lock().await;
        let records = self.refresh(&mut cache).await?;
        records.push(record.clone());
        let snapshot = records.clone();
        self.write_file(&snapshot).await?;
        cache.modified = self.modified().await;

        tracing::info!(
            id = %record.id,
            contract = record.contract_name.as_deref().unwrap_or("?"),
            address = ?record.contract_address,
            "Contract saved to registry"
        );
        Ok(record)
    }
}

mod saved_at {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}"))),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|at| at.with_timezone(&Utc))
                .map_err(D::Error::custom),
        }
    }
}
