//! The standard deployment chain.

use super::{
    bank::BankProvisioner,
    deployer::{Deployer, End},
    staking_rewards::StakingRewardsProvisioner,
};
use crate::config::DeploySettings;

/// `Bank` behind its proxy, then `StakingRewards` linked into it.
pub type StandardDeployer = Deployer<BankProvisioner, Deployer<StakingRewardsProvisioner, End>>;

impl StandardDeployer {
    /// Build the chain from the project's deployment settings.
    pub fn from_settings(settings: &DeploySettings) -> Self {
        Deployer::new(BankProvisioner {
            proxy_contract: settings.proxy_contract.clone(),
        })
        .then(StakingRewardsProvisioner::new(settings.link_policy))
    }

    pub fn default_stack() -> Self {
        Self::from_settings(&DeploySettings::default())
    }
}
