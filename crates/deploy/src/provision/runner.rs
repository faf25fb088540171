//! Deployment execution engine.

use std::{collections::BTreeSet, future::Future};

use super::{
    context::DeployContext,
    deployer::{Deployer, End},
    provisioner::Provisioner,
    report::{RunReport, StepReport},
};
use crate::{
    accounts::{NamedAccounts, ResolvedAccounts, Role},
    artifacts::ArtifactStore,
    chain::ChainClient,
    error::{ConfigError, Result},
    records::RecordStore,
    registry::ContractRegistry,
};

/// Knobs of a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Steps to run, by tag. Empty runs every step.
    pub tags: Vec<String>,
    /// Forget the records of the network before running.
    pub reset: bool,
}

impl RunOptions {
    pub fn selects(&self, tag: &str) -> bool {
        self.tags.is_empty() || self.tags.iter().any(|t| t == tag)
    }
}

/// Read-only inputs of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunEnv<'a> {
    pub network: &'a str,
    /// Whether the network is a long-lived public chain.
    pub live: bool,
    pub named_accounts: &'a NamedAccounts,
    pub artifacts: &'a ArtifactStore,
}

/// A chain of steps that can be inspected and run.
pub trait DeployChain: Send + Sync {
    /// Tags of every step, in execution order.
    fn tags(&self) -> Vec<&'static str>;

    /// Add the roles needed by the selected steps.
    fn required_roles(&self, options: &RunOptions, roles: &mut BTreeSet<Role>);

    /// Add the artifacts needed by the selected steps.
    fn artifacts(&self, options: &RunOptions, names: &mut Vec<String>);

    /// Run the selected steps in order.
    fn run_steps<C: ChainClient>(
        &self,
        ctx: &mut DeployContext<'_, C>,
        options: &RunOptions,
        reports: &mut Vec<StepReport>,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl DeployChain for End {
    fn tags(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn required_roles(&self, _options: &RunOptions, _roles: &mut BTreeSet<Role>) {}

    fn artifacts(&self, _options: &RunOptions, _names: &mut Vec<String>) {}

    async fn run_steps<C: ChainClient>(
        &self,
        _ctx: &mut DeployContext<'_, C>,
        _options: &RunOptions,
        _reports: &mut Vec<StepReport>,
    ) -> Result<()> {
        Ok(())
    }
}

impl<S, Next> DeployChain for Deployer<S, Next>
where
    S: Provisioner,
    Next: DeployChain,
{
    fn tags(&self) -> Vec<&'static str> {
        let mut tags = vec![S::TAG];
        tags.extend(self.next.tags());
        tags
    }

    fn required_roles(&self, options: &RunOptions, roles: &mut BTreeSet<Role>) {
        if options.selects(S::TAG) {
            roles.extend(S::REQUIRED_ROLES.iter().copied());
        }
        self.next.required_roles(options, roles);
    }

    fn artifacts(&self, options: &RunOptions, names: &mut Vec<String>) {
        if options.selects(S::TAG) {
            for name in self.step.artifacts() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        self.next.artifacts(options, names);
    }

    async fn run_steps<C: ChainClient>(
        &self,
        ctx: &mut DeployContext<'_, C>,
        options: &RunOptions,
        reports: &mut Vec<StepReport>,
    ) -> Result<()> {
        if options.selects(S::TAG) {
            tracing::info!(network = ctx.network, step = S::TAG, "Running step");
            let report = self.step.provision(ctx).await?;
            tracing::info!(
                network = ctx.network,
                step = S::TAG,
                transactions = report.transactions(),
                "Step complete"
            );
            reports.push(report);
        } else {
            tracing::debug!(step = S::TAG, "Step not selected");
        }
        self.next.run_steps(ctx, options, reports).await
    }
}

/// Check everything that can be checked without touching the chain.
///
/// Fails on unknown tags, unresolved roles, a proxy admin that is also the
/// deployer, a deployer without a signing key and missing artifacts.
pub fn preflight<D: DeployChain>(
    chain: &D,
    env: &RunEnv<'_>,
    chain_id: u64,
    signers: &[alloy_core::primitives::Address],
    options: &RunOptions,
) -> Result<ResolvedAccounts> {
    let known = chain.tags();
    if let Some(unknown) = options
        .tags
        .iter()
        .find(|tag| !known.contains(&tag.as_str()))
    {
        return Err(ConfigError::UnknownTag(unknown.clone()).into());
    }

    let mut roles = BTreeSet::from([Role::Deployer]);
    chain.required_roles(options, &mut roles);
    let accounts = env
        .named_accounts
        .resolve_roles(roles, chain_id, env.network, signers)?;

    let deployer = accounts.get(Role::Deployer)?;
    if !signers.contains(&deployer) {
        return Err(ConfigError::UnknownSigner(deployer).into());
    }
    if let Some(admin) = accounts
        .get(Role::ProxyAdmin)
        .ok()
        .filter(|admin| *admin == deployer)
    {
        return Err(ConfigError::ProxyAdminIsDeployer(admin).into());
    }

    let mut artifacts = Vec::new();
    chain.artifacts(options, &mut artifacts);
    env.artifacts.require(artifacts.iter().map(String::as_str))?;

    for (role, address) in accounts.iter() {
        tracing::debug!(network = env.network, %role, %address, "Resolved named account");
    }
    Ok(accounts)
}

/// Run `chain` against `client`, recording progress in `store`.
pub async fn run<D, C>(
    chain: &D,
    client: &C,
    env: RunEnv<'_>,
    store: &mut RecordStore,
    options: &RunOptions,
) -> Result<RunReport>
where
    D: DeployChain,
    C: ChainClient,
{
    let chain_id = client.chain_id();
    let accounts = preflight(chain, &env, chain_id, &client.signer_addresses(), options)?;

    if options.reset {
        store.reset()?;
    }
    let mut registry = ContractRegistry::from_store(store);

    let mut ctx = DeployContext {
        client,
        network: env.network,
        live: env.live,
        accounts: &accounts,
        artifacts: env.artifacts,
        store,
        registry: &mut registry,
    };

    let mut steps = Vec::new();
    chain.run_steps(&mut ctx, options, &mut steps).await?;

    let report = RunReport {
        network: env.network.to_string(),
        chain_id,
        steps,
    };
    tracing::info!(
        network = env.network,
        chain_id,
        transactions = report.transactions(),
        "Deployment complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::StandardDeployer;

    #[test]
    fn test_chain_lists_steps_in_order() {
        let chain = StandardDeployer::default_stack();
        assert_eq!(chain.tags(), ["Bank", "StakingRewards"]);
    }

    #[test]
    fn test_selection_limits_roles_and_artifacts() {
        let chain = StandardDeployer::default_stack();
        let options = RunOptions {
            tags: vec!["StakingRewards".to_string()],
            reset: false,
        };

        let mut roles = BTreeSet::new();
        chain.required_roles(&options, &mut roles);
        assert!(!roles.contains(&Role::ProxyAdmin));
        assert!(roles.contains(&Role::GameToken));

        let mut names = Vec::new();
        chain.artifacts(&options, &mut names);
        assert_eq!(names, ["StakingRewards"]);

        let mut names = Vec::new();
        chain.artifacts(&RunOptions::default(), &mut names);
        assert_eq!(
            names,
            ["Bank", "TransparentUpgradeableProxy", "StakingRewards"]
        );
    }
}
