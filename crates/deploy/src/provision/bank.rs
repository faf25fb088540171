//! Bank behind a transparent upgradeable proxy.

use alloy_core::{
    primitives::{Address, Bytes},
    sol_types::SolConstructor,
};
use serde::{Deserialize, Serialize};

use super::{
    DEFAULT_PROXY_CONTRACT,
    context::{ConstructorArgs, DeployContext},
    provisioner::Provisioner,
    report::{Outcome, StepReport},
    stages::ProxyStage,
};
use crate::{
    abi::TransparentUpgradeableProxy,
    accounts::Role,
    artifacts::Artifact,
    chain::ChainClient,
    error::{DeployError, Result},
    lifecycle::Lifecycle,
    records::ProxyRecord,
    registry::{BankHandle, ContractId},
};

/// Deploys `Bank` behind a proxy administered by `proxy_admin` and runs
/// `initialize(creditToken)` through the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankProvisioner {
    /// Artifact name of the proxy contract.
    pub proxy_contract: String,
}

impl Default for BankProvisioner {
    fn default() -> Self {
        Self {
            proxy_contract: DEFAULT_PROXY_CONTRACT.to_string(),
        }
    }
}

fn proxy_args(implementation: Address, admin: Address) -> ConstructorArgs {
    let data = Bytes::new();
    ConstructorArgs::new(
        TransparentUpgradeableProxy::constructorCall {
            logic: implementation,
            admin,
            data: data.clone(),
        }
        .abi_encode(),
        vec![implementation.to_string(), admin.to_string(), data.to_string()],
    )
}

impl BankProvisioner {
    /// Reuse or deploy the implementation and the proxy. Returns the proxy address.
    async fn deploy_proxy<C: ChainClient>(
        &self,
        ctx: &mut DeployContext<'_, C>,
        report: &mut StepReport,
        bank: &Artifact,
        proxy: &Artifact,
    ) -> Result<Address> {
        let name = ContractId::Bank.name();
        let admin = ctx.account(Role::ProxyAdmin)?;

        if let Some(record) = ctx.existing(name).await? {
            let unchanged = record.proxy.as_ref().is_some_and(|p| {
                p.implementation_bytecode_hash == bank.bytecode_hash()
                    && p.proxy_contract == self.proxy_contract
            });
            let args = record
                .proxy
                .as_ref()
                .map(|p| proxy_args(p.implementation, admin))
                .unwrap_or_else(ConstructorArgs::none);
            if !unchanged {
                return Err(DeployError::ArtifactChanged {
                    contract: name.to_string(),
                    address: record.address,
                });
            }
            ctx.ensure_unchanged(name, &record, proxy.bytecode_hash(), &args)?;

            tracing::info!(network = ctx.network, address = %record.address, "Reusing Bank proxy");
            report.push(Outcome::Reused {
                name: name.to_string(),
                address: record.address,
            });
            return Ok(record.address);
        }

        // The implementation is recorded on its own so an interrupted run
        // resumes with the proxy instead of deploying it again.
        let implementation_name = ContractId::Bank.implementation_name();
        let implementation = match ctx.existing(&implementation_name).await? {
            Some(record) => {
                ctx.ensure_unchanged(
                    &implementation_name,
                    &record,
                    bank.bytecode_hash(),
                    &ConstructorArgs::none(),
                )?;
                report.push(Outcome::Reused {
                    name: implementation_name.clone(),
                    address: record.address,
                });
                record.address
            }
            None => {
                let record = ctx
                    .deploy(
                        &implementation_name,
                        bank,
                        &bank.abi,
                        ConstructorArgs::none(),
                        None,
                    )
                    .await?;
                report.push(Outcome::Deployed {
                    name: implementation_name.clone(),
                    address: record.address,
                    transaction_hash: record.transaction_hash,
                });
                record.address
            }
        };

        let proxy_record = ProxyRecord {
            proxy_contract: self.proxy_contract.clone(),
            admin,
            implementation,
            implementation_bytecode_hash: bank.bytecode_hash(),
        };
        let record = ctx
            .deploy(
                name,
                proxy,
                &bank.abi,
                proxy_args(implementation, admin),
                Some(proxy_record),
            )
            .await?;
        report.push(Outcome::Deployed {
            name: name.to_string(),
            address: record.address,
            transaction_hash: record.transaction_hash,
        });
        Ok(record.address)
    }

    async fn initialize<C: ChainClient>(
        &self,
        ctx: &mut DeployContext<'_, C>,
        report: &mut StepReport,
        bank: BankHandle,
    ) -> Result<()> {
        let name = ContractId::Bank.name();
        let label = "Bank.initialize".to_string();

        if ctx.store.state(name) == Lifecycle::Initialized {
            report.push(Outcome::Skipped {
                label,
                reason: "initialized by a previous run".to_string(),
            });
            return Ok(());
        }

        let deployer = ctx.account(Role::Deployer)?;
        let credit_token = ctx.account(Role::CreditToken)?;

        // The journal can lag behind the chain when a run died between the
        // confirmation and the write, so ask the contract itself.
        if bank.is_initialized(ctx.client, deployer, credit_token).await? {
            tracing::info!(network = ctx.network, address = %bank.address, "Bank already initialized on chain");
            ctx.store.advance(name, Lifecycle::Initialized)?;
            report.push(Outcome::Skipped {
                label,
                reason: "already initialized on chain".to_string(),
            });
            return Ok(());
        }

        let receipt = bank.initialize(ctx.client, deployer, credit_token).await?;
        ctx.store.advance(name, Lifecycle::Initialized)?;
        tracing::info!(network = ctx.network, %credit_token, "Bank initialized");
        report.push(Outcome::Executed {
            label,
            transaction_hash: receipt.transaction_hash,
        });
        Ok(())
    }
}

impl Provisioner for BankProvisioner {
    type Stage = ProxyStage;

    const TAG: &'static str = "Bank";

    const REQUIRED_ROLES: &'static [Role] = &[Role::Deployer, Role::ProxyAdmin, Role::CreditToken];

    fn artifacts(&self) -> Vec<String> {
        vec![ContractId::Bank.name().to_string(), self.proxy_contract.clone()]
    }

    async fn provision<C: ChainClient>(&self, ctx: &mut DeployContext<'_, C>) -> Result<StepReport> {
        let mut report = StepReport::new(Self::TAG);
        let artifacts = ctx.artifacts;
        let bank = artifacts.get(ContractId::Bank.name())?;
        let proxy = artifacts.get(&self.proxy_contract)?;

        let address = self.deploy_proxy(ctx, &mut report, bank, proxy).await?;
        if ctx.store.state(ContractId::Bank.name()) == Lifecycle::Absent {
            ctx.store.advance(ContractId::Bank.name(), Lifecycle::Deployed)?;
        }
        ctx.registry.register(ContractId::Bank, address);

        self.initialize(ctx, &mut report, BankHandle::new(address))
            .await?;
        Ok(report)
    }
}
