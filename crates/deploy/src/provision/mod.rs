//! Dependency-ordered contract provisioning.
//!
//! Steps are chained through the type system, so the linked stage can only
//! follow the proxy stage:
//!
//! ```no_run
//! use stakebank_deploy::{BankProvisioner, Deployer, StakingRewardsProvisioner};
//!
//! let deployer = Deployer::new(BankProvisioner::default())
//!     .then(StakingRewardsProvisioner::default());
//! ```

mod bank;
mod context;
mod deployer;
mod link;
mod provisioner;
mod report;
mod runner;
mod stages;
mod staking_rewards;
mod standard;

pub use bank::BankProvisioner;
pub use context::{ConstructorArgs, DeployContext};
pub use deployer::{Deployer, End};
pub use link::{LinkAction, LinkPolicy};
pub use provisioner::Provisioner;
pub use report::{Outcome, RunReport, StepReport};
pub use runner::{DeployChain, RunEnv, RunOptions, preflight, run};
pub use stages::{DeploymentStage, LinkedStage, NextStage, ProxyStage};
pub use staking_rewards::StakingRewardsProvisioner;
pub use standard::StandardDeployer;

/// Proxy placed in front of `Bank` unless configured otherwise.
pub const DEFAULT_PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";
