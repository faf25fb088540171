//! Per-network deployment records.
//!
//! Layout of a network directory:
//!
//! ```text
//! deployments/<network>/
//!   .chainId            chain the records belong to
//!   .lock               advisory lock held while a run is in progress
//!   .lifecycle.json     contract states and registered links
//!   <Name>.json         one record per deployed contract
//! ```

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, DeployError, Result},
    lifecycle::{Journal, Lifecycle, Transition},
};

const CHAIN_ID_FILE: &str = ".chainId";
const LOCK_FILE: &str = ".lock";
const JOURNAL_FILE: &str = ".lifecycle.json";

/// Proxy metadata of a contract deployed behind a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRecord {
    /// Artifact name of the proxy contract.
    pub proxy_contract: String,
    pub admin: Address,
    pub implementation: Address,
    pub implementation_bytecode_hash: B256,
}

/// What was deployed under a logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub address: Address,
    pub abi: serde_json::Value,
    /// Constructor arguments, rendered for display and comparison.
    pub args: Vec<String>,
    /// Hash of the creation code that produced `address`.
    pub bytecode_hash: B256,
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyRecord>,
    /// Unix timestamp of the deployment.
    pub deployed_at: i64,
}

/// Records and journal of one network.
///
/// [`RecordStore::open`] holds an exclusive lock on the directory until the
/// store is dropped.
#[derive(Debug)]
pub struct RecordStore {
    network: String,
    dir: Option<PathBuf>,
    chain_id: Option<u64>,
    records: BTreeMap<String, DeploymentRecord>,
    journal: Journal,
    _lock: Option<File>,
}

impl RecordStore {
    /// Open the store of `network` below `root` for writing.
    pub fn open(root: &Path, network: &str, chain_id: u64) -> Result<Self> {
        let dir = root.join(network);
        std::fs::create_dir_all(&dir)
            .map_err(|e| DeployError::io(format!("Failed to create {}", dir.display()), e))?;

        let lock_path = dir.join(LOCK_FILE);
        let lock = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| DeployError::io(format!("Failed to open {}", lock_path.display()), e))?;
        lock.try_lock_exclusive()
            .map_err(|_| DeployError::StoreLocked(dir.clone()))?;

        let chain_id_path = dir.join(CHAIN_ID_FILE);
        match read_chain_id(&chain_id_path)? {
            Some(stored) if stored != chain_id => {
                return Err(ConfigError::StoreChainMismatch {
                    path: dir,
                    stored,
                    actual: chain_id,
                }
                .into());
            }
            Some(_) => {}
            None => write_atomic(&chain_id_path, chain_id.to_string().as_bytes())?,
        }

        let mut store = Self::load(network, dir)?;
        store.chain_id = Some(chain_id);
        store._lock = Some(lock);
        tracing::debug!(
            network,
            chain_id,
            records = store.records.len(),
            "Opened deployment store"
        );
        Ok(store)
    }

    /// Load the store for inspection without locking it.
    ///
    /// A network that was never deployed to yields an empty store.
    pub fn open_read_only(root: &Path, network: &str) -> Result<Self> {
        let dir = root.join(network);
        if !dir.is_dir() {
            return Ok(Self::in_memory(network));
        }
        let chain_id = read_chain_id(&dir.join(CHAIN_ID_FILE))?;
        let mut store = Self::load(network, dir)?;
        store.chain_id = chain_id;
        Ok(store)
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(network: &str) -> Self {
        Self {
            network: network.to_string(),
            dir: None,
            chain_id: None,
            records: BTreeMap::new(),
            journal: Journal::default(),
            _lock: None,
        }
    }

    fn load(network: &str, dir: PathBuf) -> Result<Self> {
        let mut records = BTreeMap::new();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| DeployError::io(format!("Failed to list {}", dir.display()), e))?;

        for entry in entries {
            let entry =
                entry.map_err(|e| DeployError::io(format!("Failed to list {}", dir.display()), e))?;
            let path = entry.path();
            let Some(name) = record_name(&path) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)
                .map_err(|e| DeployError::io(format!("Failed to read {}", path.display()), e))?;
            let record: DeploymentRecord = serde_json::from_str(&content)
                .map_err(|e| DeployError::json(format!("Invalid record {}", path.display()), e))?;
            records.insert(name, record);
        }

        let journal_path = dir.join(JOURNAL_FILE);
        let journal = if journal_path.is_file() {
            let content = std::fs::read_to_string(&journal_path).map_err(|e| {
                DeployError::io(format!("Failed to read {}", journal_path.display()), e)
            })?;
            serde_json::from_str(&content).map_err(|e| {
                DeployError::json(format!("Invalid journal {}", journal_path.display()), e)
            })?
        } else {
            Journal::default()
        };

        Ok(Self {
            network: network.to_string(),
            dir: Some(dir),
            chain_id: None,
            records,
            journal,
            _lock: None,
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Chain the records belong to, if known.
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    /// Directory backing this store, `None` for in-memory stores.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&DeploymentRecord> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &DeploymentRecord)> {
        self.records
            .iter()
            .map(|(name, record)| (name.as_str(), record))
    }

    /// Persist a record. Called right after the deploying transaction is confirmed.
    pub fn insert(&mut self, name: &str, record: DeploymentRecord) -> Result<()> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{name}.json"));
            let content = serde_json::to_vec_pretty(&record)
                .map_err(|e| DeployError::json(format!("Failed to serialize {name}"), e))?;
            write_atomic(&path, &content)?;
        }
        tracing::debug!(network = %self.network, name, address = %record.address, "Saved deployment record");
        self.records.insert(name.to_string(), record);
        Ok(())
    }

    /// Drop a record together with its journal state.
    pub fn remove(&mut self, name: &str) -> Result<Option<DeploymentRecord>> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{name}.json"));
            if path.exists() {
                std::fs::remove_file(&path)
                    .map_err(|e| DeployError::io(format!("Failed to remove {}", path.display()), e))?;
            }
        }
        self.journal.forget(name);
        self.save_journal()?;
        Ok(self.records.remove(name))
    }

    /// Forget every record and the journal, keeping the chain binding.
    pub fn reset(&mut self) -> Result<()> {
        let names: Vec<String> = self.records.keys().cloned().collect();
        for name in names {
            self.remove(&name)?;
        }
        self.journal = Journal::default();
        self.save_journal()?;
        tracing::info!(network = %self.network, "Deployment store reset");
        Ok(())
    }

    pub fn state(&self, contract: &str) -> Lifecycle {
        self.journal.state(contract)
    }

    /// Move `contract` to `target` and persist the journal.
    pub fn advance(&mut self, contract: &str, target: Lifecycle) -> Result<Transition> {
        let transition = self.journal.advance(contract, target)?;
        if transition == Transition::Advanced {
            self.save_journal()?;
            tracing::debug!(network = %self.network, contract, state = %target, "Lifecycle advanced");
        }
        Ok(transition)
    }

    /// The target registered under `key` on `contract`, as last recorded.
    pub fn link(&self, contract: &str, key: Address) -> Option<Address> {
        self.journal.link(contract, key)
    }

    pub fn record_link(&mut self, contract: &str, key: Address, target: Address) -> Result<()> {
        self.journal.set_link(contract, key, target);
        self.save_journal()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    fn save_journal(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let content = serde_json::to_vec_pretty(&self.journal)
            .map_err(|e| DeployError::json("Failed to serialize lifecycle journal", e))?;
        write_atomic(&dir.join(JOURNAL_FILE), &content)
    }
}

/// Logical name of a record file, `None` for anything else in the directory.
fn record_name(path: &Path) -> Option<String> {
    if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}

fn read_chain_id(path: &Path) -> Result<Option<u64>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| DeployError::io(format!("Failed to read {}", path.display()), e))?;
    content
        .trim()
        .parse()
        .map(Some)
        .map_err(|e| DeployError::Decode {
            method: path.display().to_string(),
            reason: format!("invalid chain ID: {e}"),
        })
}

/// Write through a temporary sibling so a crash never leaves a truncated file.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)
        .map_err(|e| DeployError::io(format!("Failed to write {}", tmp.display()), e))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| DeployError::io(format!("Failed to replace {}", path.display()), e))
}
