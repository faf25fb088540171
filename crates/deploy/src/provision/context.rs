//! State shared by the steps of a run.

use alloy_core::primitives::{Address, B256, Bytes};

use crate::{
    abi,
    accounts::{ResolvedAccounts, Role},
    artifacts::{Artifact, ArtifactStore},
    chain::{ChainClient, TxRequest},
    error::{DeployError, Result},
    records::{DeploymentRecord, ProxyRecord, RecordStore},
    registry::{ContractId, ContractRegistry},
};

/// Constructor arguments of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorArgs {
    pub encoded: Bytes,
    /// Rendered form stored in the record.
    pub display: Vec<String>,
}

impl ConstructorArgs {
    pub fn none() -> Self {
        Self {
            encoded: Bytes::new(),
            display: Vec::new(),
        }
    }

    pub fn new(encoded: impl Into<Bytes>, display: Vec<String>) -> Self {
        Self {
            encoded: encoded.into(),
            display,
        }
    }
}

/// Everything a step can see and touch.
pub struct DeployContext<'a, C> {
    pub client: &'a C,
    pub network: &'a str,
    /// Whether the network is a long-lived public chain.
    pub live: bool,
    pub accounts: &'a ResolvedAccounts,
    pub artifacts: &'a ArtifactStore,
    pub store: &'a mut RecordStore,
    pub registry: &'a mut ContractRegistry,
}

impl<C: ChainClient> DeployContext<'_, C> {
    pub fn account(&self, role: Role) -> Result<Address> {
        Ok(self.accounts.get(role)?)
    }

    /// The record of `name`, provided its address still carries code.
    ///
    /// On development networks a record without code is discarded, since the
    /// node was most likely restarted. On live networks it is an error.
    pub async fn existing(&mut self, name: &str) -> Result<Option<DeploymentRecord>> {
        let Some(record) = self.store.get(name).cloned() else {
            return Ok(None);
        };

        let code = self.client.code(record.address).await?;
        if !code.is_empty() {
            return Ok(Some(record));
        }

        if self.live {
            return Err(DeployError::StaleRecord {
                contract: name.to_string(),
                address: record.address,
            });
        }

        tracing::warn!(
            network = self.network,
            name,
            address = %record.address,
            "Recorded contract has no code, discarding record"
        );
        self.store.remove(name)?;
        Ok(None)
    }

    /// Address of the prerequisite `id`, verified to still carry code.
    ///
    /// A stale record fails the same way [`Self::existing`] does, and a
    /// missing one fails with [`DeployError::MissingPrerequisite`].
    pub async fn require(&mut self, id: ContractId) -> Result<Address> {
        match self.existing(id.name()).await? {
            Some(record) => self.registry.register(id, record.address),
            None => self.registry.forget(id),
        }
        self.registry.address(id)
    }

    /// Fail unless `record` was produced by the same creation code and arguments.
    pub fn ensure_unchanged(
        &self,
        name: &str,
        record: &DeploymentRecord,
        bytecode_hash: B256,
        args: &ConstructorArgs,
    ) -> Result<()> {
        if record.bytecode_hash != bytecode_hash || record.args != args.display {
            return Err(DeployError::ArtifactChanged {
                contract: name.to_string(),
                address: record.address,
            });
        }
        Ok(())
    }

    /// Deploy `artifact` from the deployer account and persist the record under `name`.
    ///
    /// `abi` is the interface stored in the record. For a proxy it is the
    /// implementation's ABI, since that is what callers talk to.
    pub async fn deploy(
        &mut self,
        name: &str,
        artifact: &Artifact,
        abi: &serde_json::Value,
        args: ConstructorArgs,
        proxy: Option<ProxyRecord>,
    ) -> Result<DeploymentRecord> {
        let deployer = self.account(Role::Deployer)?;
        tracing::info!(network = self.network, name, %deployer, "Deploying contract");

        let tx = TxRequest::create(
            name,
            deployer,
            abi::encode_deploy(&artifact.bytecode, &args.encoded),
        );
        let receipt = self.client.send(tx).await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::Decode {
                method: "eth_getTransactionReceipt".to_string(),
                reason: format!("no contract address in receipt of {}", receipt.transaction_hash),
            })?;

        let record = DeploymentRecord {
            address,
            abi: abi.clone(),
            args: args.display,
            bytecode_hash: artifact.bytecode_hash(),
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            proxy,
            deployed_at: chrono::Utc::now().timestamp(),
        };
        self.store.insert(name, record.clone())?;

        tracing::info!(network = self.network, name, %address, "Contract deployed");
        Ok(record)
    }
}
