//! stakebank-deploy - Deployment library for the Bank / StakingRewards system.
//!
//! This crate deploys `Bank` behind a transparent upgradeable proxy and a
//! `StakingRewards` contract linked into it, deterministically and
//! idempotently, across the networks declared in the project configuration.

pub mod abi;
pub mod accounts;
pub mod artifacts;
pub mod chain;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod node;
pub mod provision;
pub mod records;
pub mod registry;
pub mod signer;

pub use accounts::{AccountRef, NamedAccount, NamedAccounts, ResolvedAccounts, Role};
pub use artifacts::{Artifact, ArtifactStore};
pub use chain::{ChainClient, RpcChain, TxReceipt, TxRequest};
pub use config::{CONFIG_FILENAME, DEFAULT_CONFIG, NetworkConfig, ProjectConfig};
pub use error::{ConfigError, DeployError, Result};
pub use lifecycle::{Journal, Lifecycle, Transition};
pub use node::{LocalNode, LocalNodeConfig};
pub use provision::{
    BankProvisioner, DeployChain, Deployer, End, LinkPolicy, Outcome, Provisioner, RunEnv,
    RunOptions, RunReport, StakingRewardsProvisioner, StandardDeployer, StepReport,
};
pub use records::{DeploymentRecord, ProxyRecord, RecordStore};
pub use registry::{BankHandle, ContractId, ContractRegistry, StakingRewardsHandle};
pub use signer::{LocalKey, Signers};
