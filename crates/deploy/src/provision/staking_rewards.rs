//! StakingRewards, registered on Bank under the game token.

use serde::{Deserialize, Serialize};

use super::{
    context::{ConstructorArgs, DeployContext},
    link::{LinkAction, LinkPolicy},
    provisioner::Provisioner,
    report::{Outcome, StepReport},
    stages::LinkedStage,
};
use crate::{
    accounts::Role,
    chain::ChainClient,
    error::Result,
    lifecycle::Lifecycle,
    registry::{BankHandle, ContractId, StakingRewardsHandle},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingRewardsProvisioner {
    #[serde(default)]
    pub link_policy: LinkPolicy,
}

impl StakingRewardsProvisioner {
    pub fn new(link_policy: LinkPolicy) -> Self {
        Self { link_policy }
    }
}

impl Provisioner for StakingRewardsProvisioner {
    type Stage = LinkedStage;

    const TAG: &'static str = "StakingRewards";

    const REQUIRED_ROLES: &'static [Role] = &[
        Role::Deployer,
        Role::RewardDistribution,
        Role::CreditToken,
        Role::GameToken,
    ];

    fn artifacts(&self) -> Vec<String> {
        vec![ContractId::StakingRewards.name().to_string()]
    }

    async fn provision<C: ChainClient>(&self, ctx: &mut DeployContext<'_, C>) -> Result<StepReport> {
        // Checked first: without a live Bank nothing may be sent.
        let bank = BankHandle::new(ctx.require(ContractId::Bank).await?);

        let mut report = StepReport::new(Self::TAG);
        let name = ContractId::StakingRewards.name();
        let deployer = ctx.account(Role::Deployer)?;
        let reward_distribution = ctx.account(Role::RewardDistribution)?;
        let credit_token = ctx.account(Role::CreditToken)?;
        let game_token = ctx.account(Role::GameToken)?;

        let artifacts = ctx.artifacts;
        let artifact = artifacts.get(name)?;
        let args = ConstructorArgs::new(
            StakingRewardsHandle::constructor_args(reward_distribution, credit_token, bank.address),
            vec![
                reward_distribution.to_string(),
                credit_token.to_string(),
                bank.address.to_string(),
            ],
        );

        let address = match ctx.existing(name).await? {
            Some(record) => {
                ctx.ensure_unchanged(name, &record, artifact.bytecode_hash(), &args)?;
                tracing::info!(network = ctx.network, address = %record.address, "Reusing StakingRewards");
                report.push(Outcome::Reused {
                    name: name.to_string(),
                    address: record.address,
                });
                record.address
            }
            None => {
                let record = ctx.deploy(name, artifact, &artifact.abi, args, None).await?;
                report.push(Outcome::Deployed {
                    name: name.to_string(),
                    address: record.address,
                    transaction_hash: record.transaction_hash,
                });
                record.address
            }
        };
        if ctx.store.state(name) == Lifecycle::Absent {
            ctx.store.advance(name, Lifecycle::Deployed)?;
        }
        ctx.registry.register(ContractId::StakingRewards, address);

        let label = "Bank.setStakingReward".to_string();
        let bank_name = ContractId::Bank.name();
        let recorded = ctx.store.link(bank_name, game_token);
        match self.link_policy.decide(game_token, recorded, address)? {
            LinkAction::Skip => {
                report.push(Outcome::Skipped {
                    label,
                    reason: format!("{game_token} already linked to {address}"),
                });
            }
            LinkAction::Send => {
                let receipt = bank
                    .set_staking_reward(ctx.client, deployer, game_token, address)
                    .await?;
                ctx.store.record_link(bank_name, game_token, address)?;
                tracing::info!(network = ctx.network, %game_token, staking_rewards = %address, "Linked StakingRewards on Bank");
                report.push(Outcome::Executed {
                    label,
                    transaction_hash: receipt.transaction_hash,
                });
            }
        }

        Ok(report)
    }
}
