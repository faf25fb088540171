//! In-memory chain driving the pipeline in integration tests.
//!
//! Contracts are recognized by the first byte of their init code and emulate
//! just enough behaviour to exercise the deployment steps: the transparent
//! proxy rejects its admin, `initialize` runs once and `setStakingReward` is
//! owner-only.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy_core::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    sol_types::{Revert, SolCall, SolError},
};
use stakebank_deploy::{
    Artifact, ArtifactStore, ChainClient, DeployError, ProjectConfig, RecordStore, Result,
    RunEnv, RunOptions, RunReport, StandardDeployer, TxReceipt, TxRequest, abi::IBank, provision,
};

pub const BANK_CODE: u8 = 0xb1;
pub const PROXY_CODE: u8 = 0xc1;
pub const STAKING_REWARDS_CODE: u8 = 0xd1;

/// Chain ID of the Harmony testnet, whose named accounts are all declared.
pub const TESTNET_CHAIN_ID: u64 = 1666700000;

/// Cost charged for every transaction.
pub const TX_COST: u64 = 1_000_000_000_000_000;

pub const ALREADY_INITIALIZED: &str = "Initializable: contract is already initialized";
pub const NOT_OWNER: &str = "Ownable: caller is not the owner";
pub const ADMIN_FALLBACK: &str = "TransparentUpgradeableProxy: admin cannot fallback to proxy target";

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

pub fn deployer() -> Address {
    Address::repeat_byte(0xde)
}

/// The address in 32-byte word `index` of ABI-encoded data.
pub fn word_address(data: &[u8], index: usize) -> Address {
    Address::from_slice(&data[index * 32 + 12..index * 32 + 32])
}

#[derive(Debug, Clone, Default)]
pub struct BankState {
    pub initialized: bool,
    pub owner: Address,
    pub credit_token: Address,
    pub staking_rewards: HashMap<Address, Address>,
}

#[derive(Debug, Clone)]
pub enum Contract {
    Bank,
    Proxy {
        implementation: Address,
        admin: Address,
        storage: BankState,
    },
    StakingRewards {
        reward_distribution: Address,
        credit_token: Address,
        bank: Address,
    },
}

/// A transaction accepted by the chain.
#[derive(Debug, Clone)]
pub struct SentTx {
    pub label: String,
    pub from: Address,
    pub to: Option<Address>,
    pub input: Bytes,
    pub created: Option<Address>,
}

#[derive(Debug, Clone, Default)]
struct State {
    block: u64,
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    contracts: HashMap<Address, Contract>,
    sent: Vec<SentTx>,
    /// Sends left before every further send times out.
    send_budget: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MemoryChain {
    chain_id: u64,
    signers: Vec<Address>,
    state: Arc<Mutex<State>>,
}

fn revert(label: &str, reason: &str) -> DeployError {
    let data = Revert {
        reason: reason.to_string(),
    }
    .abi_encode();
    DeployError::Reverted {
        method: label.to_string(),
        reason: reason.to_string(),
        data: data.into(),
    }
}

impl MemoryChain {
    pub fn new(chain_id: u64, signers: Vec<Address>) -> Self {
        let mut state = State::default();
        for signer in &signers {
            state
                .balances
                .insert(*signer, U256::from(TX_COST) * U256::from(1_000u64));
        }
        Self {
            chain_id,
            signers,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn testnet() -> Self {
        Self::new(TESTNET_CHAIN_ID, vec![deployer()])
    }

    pub fn set_balance(&self, account: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(account, balance);
    }

    /// Let `sends` transactions through, then time out every further one.
    pub fn set_send_budget(&self, sends: Option<usize>) {
        self.state.lock().unwrap().send_budget = sends;
    }

    /// Drop every contract, as a restarted development node would.
    pub fn wipe(&self) {
        self.state.lock().unwrap().contracts.clear();
    }

    pub fn transfer_bank_ownership(&self, proxy: Address, owner: Address) {
        let mut state = self.state.lock().unwrap();
        if let Some(Contract::Proxy { storage, .. }) = state.contracts.get_mut(&proxy) {
            storage.owner = owner;
        }
    }

    pub fn contract(&self, address: Address) -> Option<Contract> {
        self.state.lock().unwrap().contracts.get(&address).cloned()
    }

    pub fn bank_state(&self, proxy: Address) -> Option<BankState> {
        match self.contract(proxy)? {
            Contract::Proxy { storage, .. } => Some(storage),
            _ => None,
        }
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_labels(&self) -> Vec<String> {
        self.sent().into_iter().map(|tx| tx.label).collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.sent().iter().filter(|tx| tx.label == label).count()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().sent.clear();
    }
}

impl State {
    /// Apply `tx`, returning the created contract if any.
    fn execute(&mut self, tx: &TxRequest) -> Result<Option<Address>> {
        let nonce = self.nonces.get(&tx.from).copied().unwrap_or_default();

        let Some(to) = tx.to else {
            let address = tx.from.create(nonce);
            let args = &tx.input[1..];
            let contract = match tx.input.first().copied() {
                Some(BANK_CODE) => Contract::Bank,
                Some(PROXY_CODE) => Contract::Proxy {
                    implementation: word_address(args, 0),
                    admin: word_address(args, 1),
                    storage: BankState::default(),
                },
                Some(STAKING_REWARDS_CODE) => Contract::StakingRewards {
                    reward_distribution: word_address(args, 0),
                    credit_token: word_address(args, 1),
                    bank: word_address(args, 2),
                },
                _ => return Err(revert(&tx.label, "unknown init code")),
            };
            self.contracts.insert(address, contract);
            *self.nonces.entry(tx.from).or_default() += 1;
            return Ok(Some(address));
        };

        let Some(Contract::Proxy {
            implementation,
            admin,
            storage,
        }) = self.contracts.get(&to).cloned()
        else {
            return Err(revert(&tx.label, "call to a contract without entry points"));
        };
        if tx.from == admin {
            return Err(revert(&tx.label, ADMIN_FALLBACK));
        }
        if !matches!(self.contracts.get(&implementation), Some(Contract::Bank)) {
            return Err(revert(&tx.label, "proxy implementation is not Bank"));
        }

        let mut storage = storage;
        let selector: [u8; 4] = tx.input[..4].try_into().unwrap();
        let params = &tx.input[4..];
        if selector == IBank::initializeCall::SELECTOR {
            if storage.initialized {
                return Err(revert(&tx.label, ALREADY_INITIALIZED));
            }
            storage.initialized = true;
            storage.owner = tx.from;
            storage.credit_token = word_address(params, 0);
        } else if selector == IBank::setStakingRewardCall::SELECTOR {
            if tx.from != storage.owner {
                return Err(revert(&tx.label, NOT_OWNER));
            }
            storage
                .staking_rewards
                .insert(word_address(params, 0), word_address(params, 1));
        } else {
            return Err(revert(&tx.label, "unknown selector"));
        }

        if let Some(Contract::Proxy { storage: slot, .. }) = self.contracts.get_mut(&to) {
            *slot = storage;
        }
        *self.nonces.entry(tx.from).or_default() += 1;
        Ok(None)
    }
}

impl ChainClient for MemoryChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn signer_addresses(&self) -> Vec<Address> {
        self.signers.clone()
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        let state = self.state.lock().unwrap();
        Ok(state.balances.get(&account).copied().unwrap_or_default())
    }

    async fn code(&self, address: Address) -> Result<Bytes> {
        let state = self.state.lock().unwrap();
        Ok(match state.contracts.get(&address) {
            Some(_) => Bytes::from_static(&[0x60, 0x80]),
            None => Bytes::new(),
        })
    }

    async fn simulate(&self, tx: &TxRequest) -> Result<Bytes> {
        let mut scratch = self.state.lock().unwrap().clone();
        scratch.execute(tx).map(|_| Bytes::new())
    }

    async fn send(&self, tx: TxRequest) -> Result<TxReceipt> {
        let mut state = self.state.lock().unwrap();

        if let Some(budget) = state.send_budget.as_mut() {
            if *budget == 0 {
                return Err(DeployError::Timeout {
                    tx_hash: B256::ZERO,
                    timeout: Duration::from_secs(1),
                });
            }
            *budget -= 1;
        }

        let required = U256::from(TX_COST);
        let available = state.balances.get(&tx.from).copied().unwrap_or_default();
        if available < required {
            return Err(DeployError::InsufficientFunds {
                account: tx.from,
                required,
                available,
            });
        }

        let created = state.execute(&tx)?;
        state.balances.insert(tx.from, available - required);
        state.block += 1;

        let transaction_hash = keccak256(
            [
                tx.from.as_slice(),
                state.block.to_be_bytes().as_slice(),
                tx.input.as_ref(),
            ]
            .concat(),
        );
        state.sent.push(SentTx {
            label: tx.label.clone(),
            from: tx.from,
            to: tx.to,
            input: tx.input.clone(),
            created,
        });

        Ok(TxReceipt {
            transaction_hash,
            block_number: state.block,
            gas_used: 50_000,
            contract_address: created,
        })
    }
}

pub fn artifact(name: &str, bytecode: &[u8]) -> Artifact {
    Artifact {
        contract_name: name.to_string(),
        abi: serde_json::json!([{ "type": "function", "name": name }]),
        bytecode: Bytes::copy_from_slice(bytecode),
        deployed_bytecode: Bytes::from_static(&[0x60, 0x80]),
    }
}

pub fn artifacts() -> ArtifactStore {
    let mut store = ArtifactStore::new("artifacts");
    store.insert("Bank", artifact("Bank", &[BANK_CODE]));
    store.insert(
        "TransparentUpgradeableProxy",
        artifact("TransparentUpgradeableProxy", &[PROXY_CODE]),
    );
    store.insert(
        "StakingRewards",
        artifact("StakingRewards", &[STAKING_REWARDS_CODE]),
    );
    store
}

/// Everything one test needs to run the pipeline.
pub struct Harness {
    pub chain: MemoryChain,
    pub config: ProjectConfig,
    pub artifacts: ArtifactStore,
    pub store: RecordStore,
    pub network: String,
    pub live: bool,
}

impl Harness {
    pub fn testnet() -> Self {
        Self {
            chain: MemoryChain::testnet(),
            config: ProjectConfig::builtin().unwrap(),
            artifacts: artifacts(),
            store: RecordStore::in_memory("testnet"),
            network: "testnet".to_string(),
            live: true,
        }
    }

    pub fn with_store(mut self, store: RecordStore) -> Self {
        self.store = store;
        self
    }

    pub async fn run(&mut self, deployer: &StandardDeployer, options: RunOptions) -> Result<RunReport> {
        let env = RunEnv {
            network: &self.network,
            live: self.live,
            named_accounts: &self.config.named_accounts,
            artifacts: &self.artifacts,
        };
        provision::run(deployer, &self.chain, env, &mut self.store, &options).await
    }

    pub async fn run_all(&mut self) -> Result<RunReport> {
        self.run(&StandardDeployer::default_stack(), RunOptions::default())
            .await
    }

    pub async fn run_tags(&mut self, tags: &[&str]) -> Result<RunReport> {
        let options = RunOptions {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            reset: false,
        };
        self.run(&StandardDeployer::default_stack(), options).await
    }

    pub fn address(&self, name: &str) -> Address {
        self.store.get(name).unwrap().address
    }
}
