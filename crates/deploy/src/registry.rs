//! Typed registry of deployed contracts.
//!
//! Steps never pass raw addresses to each other. A later step asks the
//! registry for a typed handle and gets [`DeployError::MissingPrerequisite`]
//! when the contract it depends on has not been deployed yet.

use std::collections::BTreeMap;

use alloy_core::{
    primitives::{Address, Bytes},
    sol_types::{SolCall, SolConstructor},
};

use crate::{
    abi::{self, IBank, StakingRewards},
    chain::{ChainClient, TxReceipt, TxRequest},
    error::{DeployError, Result},
    records::RecordStore,
};

/// Logical contracts managed by the pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
pub enum ContractId {
    Bank,
    StakingRewards,
}

impl ContractId {
    pub const ALL: [ContractId; 2] = [ContractId::Bank, ContractId::StakingRewards];

    /// Name of the deployment record and of the compiled artifact.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bank => "Bank",
            Self::StakingRewards => "StakingRewards",
        }
    }

    /// Record name of the implementation behind a proxied contract.
    pub fn implementation_name(self) -> String {
        format!("{}_Implementation", self.name())
    }
}

/// Handle to the `Bank` proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankHandle {
    pub address: Address,
}

impl BankHandle {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn initialize_tx(&self, from: Address, credit_token: Address) -> TxRequest {
        TxRequest::call(
            "Bank.initialize",
            from,
            self.address,
            IBank::initializeCall {
                creditToken: credit_token,
            }
            .abi_encode()
            .into(),
        )
    }

    pub fn set_staking_reward_tx(
        &self,
        from: Address,
        game_token: Address,
        staking_rewards: Address,
    ) -> TxRequest {
        TxRequest::call(
            "Bank.setStakingReward",
            from,
            self.address,
            IBank::setStakingRewardCall {
                gameToken: game_token,
                stakingRewards: staking_rewards,
            }
            .abi_encode()
            .into(),
        )
    }

    /// Probe the initializer by simulating `initialize(credit_token)`.
    ///
    /// Returns `true` when the simulation fails because the initializer
    /// already ran. Any other revert is propagated.
    pub async fn is_initialized<C: ChainClient>(
        &self,
        client: &C,
        from: Address,
        credit_token: Address,
    ) -> Result<bool> {
        match client.simulate(&self.initialize_tx(from, credit_token)).await {
            Ok(_) => Ok(false),
            Err(DeployError::Reverted { reason, data, .. })
                if abi::is_already_initialized(&reason, &data) =>
            {
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    /// Send `initialize(credit_token)`.
    ///
    /// Fails with [`DeployError::AlreadyInitialized`] when the initializer
    /// already ran; a second initialization is never reported as success.
    pub async fn initialize<C: ChainClient>(
        &self,
        client: &C,
        from: Address,
        credit_token: Address,
    ) -> Result<TxReceipt> {
        match client.send(self.initialize_tx(from, credit_token)).await {
            Err(DeployError::Reverted { reason, data, .. })
                if abi::is_already_initialized(&reason, &data) =>
            {
                Err(DeployError::AlreadyInitialized(self.address))
            }
            other => other,
        }
    }

    pub async fn set_staking_reward<C: ChainClient>(
        &self,
        client: &C,
        from: Address,
        game_token: Address,
        staking_rewards: Address,
    ) -> Result<TxReceipt> {
        client
            .send(self.set_staking_reward_tx(from, game_token, staking_rewards))
            .await
    }
}

/// Handle to `StakingRewards`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakingRewardsHandle {
    pub address: Address,
}

impl StakingRewardsHandle {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// ABI-encoded constructor arguments.
    pub fn constructor_args(
        reward_distribution: Address,
        credit_token: Address,
        bank: Address,
    ) -> Bytes {
        StakingRewards::constructorCall {
            rewardsDistribution: reward_distribution,
            rewardsToken: credit_token,
            bank,
        }
        .abi_encode()
        .into()
    }
}

/// Addresses of the contracts deployed on the current network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractRegistry {
    network: String,
    contracts: BTreeMap<ContractId, Address>,
}

impl ContractRegistry {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            contracts: BTreeMap::new(),
        }
    }

    /// Seed the registry with contracts already recorded in `store`.
    ///
    /// A proxied contract is only registered once its proxy record exists.
    pub fn from_store(store: &RecordStore) -> Self {
        let mut registry = Self::new(store.network());
        for id in ContractId::ALL {
            if let Some(record) = store.get(id.name()) {
                registry.register(id, record.address);
            }
        }
        registry
    }

    pub fn register(&mut self, id: ContractId, address: Address) {
        tracing::debug!(network = %self.network, contract = %id, %address, "Registered contract");
        self.contracts.insert(id, address);
    }

    pub fn forget(&mut self, id: ContractId) {
        self.contracts.remove(&id);
    }

    pub fn address(&self, id: ContractId) -> Result<Address> {
        self.contracts
            .get(&id)
            .copied()
            .ok_or_else(|| DeployError::MissingPrerequisite {
                contract: id,
                network: self.network.clone(),
            })
    }

    pub fn bank(&self) -> Result<BankHandle> {
        self.address(ContractId::Bank).map(BankHandle::new)
    }

    pub fn staking_rewards(&self) -> Result<StakingRewardsHandle> {
        self.address(ContractId::StakingRewards)
            .map(StakingRewardsHandle::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_contract_is_typed() {
        let registry = ContractRegistry::new("testnet");
        let err = registry.bank().unwrap_err();
        assert!(matches!(
            err,
            DeployError::MissingPrerequisite {
                contract: ContractId::Bank,
                ref network,
            } if network == "testnet"
        ));
        assert_eq!(
            err.to_string(),
            "`Bank` has not been deployed on network `testnet` yet, run its step first"
        );
    }

    #[test]
    fn test_registered_handles() {
        let mut registry = ContractRegistry::new("local");
        registry.register(ContractId::Bank, Address::repeat_byte(0xb1));
        assert_eq!(registry.bank().unwrap().address, Address::repeat_byte(0xb1));
        assert!(registry.staking_rewards().is_err());

        registry.forget(ContractId::Bank);
        assert!(registry.bank().is_err());
    }

    #[test]
    fn test_calldata() {
        let bank = BankHandle::new(Address::repeat_byte(0xb1));
        let tx = bank.set_staking_reward_tx(
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            Address::repeat_byte(0x03),
        );
        assert_eq!(tx.to, Some(bank.address));
        assert_eq!(&tx.input[..4], &IBank::setStakingRewardCall::SELECTOR);
        assert_eq!(&tx.input[16..36], Address::repeat_byte(0x02).as_slice());
        assert_eq!(&tx.input[48..68], Address::repeat_byte(0x03).as_slice());

        let tx = bank.initialize_tx(Address::repeat_byte(0x01), Address::repeat_byte(0x04));
        assert_eq!(tx.input.len(), 36);
        assert_eq!(tx.label, "Bank.initialize");
    }

    #[test]
    fn test_record_names() {
        assert_eq!(ContractId::Bank.to_string(), "Bank");
        assert_eq!(ContractId::Bank.implementation_name(), "Bank_Implementation");
        assert_eq!("StakingRewards".parse::<ContractId>().unwrap(), ContractId::StakingRewards);
    }
}
