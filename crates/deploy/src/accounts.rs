//! Named accounts: logical roles resolved to concrete addresses per chain.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A logical account role used by the deployment steps.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Signs every deployment transaction.
    Deployer,
    /// Token passed to `Bank.initialize` and the `StakingRewards` constructor.
    CreditToken,
    /// Token key under which `StakingRewards` is registered on `Bank`.
    GameToken,
    /// Admin of the transparent proxy in front of `Bank`.
    ProxyAdmin,
    /// Account allowed to fund `StakingRewards`.
    RewardDistribution,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Deployer,
        Role::CreditToken,
        Role::GameToken,
        Role::ProxyAdmin,
        Role::RewardDistribution,
    ];
}

/// What a table entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    /// Index into the signer list of the network.
    Signer(usize),
    /// A literal address.
    Address(Address),
}

/// Per-chain entries of one role, with an optional fallback.
///
/// Serialized as a flat table whose keys are chain IDs or `default`:
///
/// ```toml
/// [named_accounts.credit_token]
/// 4 = "0xDfb01A88D1e6099B42c9Bae38F8070027143b850"
///
/// [named_accounts.deployer]
/// default = 0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, AccountRef>",
    into = "BTreeMap<String, AccountRef>"
)]
pub struct NamedAccount {
    pub default: Option<AccountRef>,
    pub chains: BTreeMap<u64, AccountRef>,
}

const DEFAULT_KEY: &str = "default";

impl NamedAccount {
    /// The entry that applies to `chain_id`.
    pub fn entry_for(&self, chain_id: u64) -> Option<AccountRef> {
        self.chains.get(&chain_id).copied().or(self.default)
    }
}

impl TryFrom<BTreeMap<String, AccountRef>> for NamedAccount {
    type Error = String;

    fn try_from(raw: BTreeMap<String, AccountRef>) -> Result<Self, Self::Error> {
        let mut account = NamedAccount::default();
        for (key, entry) in raw {
            if key == DEFAULT_KEY {
                account.default = Some(entry);
                continue;
            }
            let chain_id = key
                .parse::<u64>()
                .map_err(|_| format!("expected a chain ID or `default`, got `{key}`"))?;
            account.chains.insert(chain_id, entry);
        }
        Ok(account)
    }
}

impl From<NamedAccount> for BTreeMap<String, AccountRef> {
    fn from(account: NamedAccount) -> Self {
        let mut raw: BTreeMap<String, AccountRef> = account
            .chains
            .into_iter()
            .map(|(chain_id, entry)| (chain_id.to_string(), entry))
            .collect();
        if let Some(default) = account.default {
            raw.insert(DEFAULT_KEY.to_string(), default);
        }
        raw
    }
}

/// The named-account table, keyed by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedAccounts(BTreeMap<String, NamedAccount>);

impl NamedAccounts {
    pub fn entry(&self, role: Role) -> Option<&NamedAccount> {
        self.0.get(role.as_ref())
    }

    pub fn insert(&mut self, role: Role, account: NamedAccount) {
        self.0.insert(role.to_string(), account);
    }

    /// Resolve a single role for `chain_id`.
    ///
    /// Signer indices are looked up in `signers`, the addresses of the
    /// network's signing keys. A zero address counts as unresolved so that
    /// nothing is ever deployed pointing at it.
    pub fn resolve(
        &self,
        role: Role,
        chain_id: u64,
        network: &str,
        signers: &[Address],
    ) -> Result<Address, ConfigError> {
        let unresolved = || ConfigError::UnresolvedAccount { role, chain_id };

        let entry = self
            .entry(role)
            .and_then(|account| account.entry_for(chain_id))
            .ok_or_else(unresolved)?;

        let address = match entry {
            AccountRef::Address(address) => address,
            AccountRef::Signer(index) => {
                *signers
                    .get(index)
                    .ok_or_else(|| ConfigError::SignerIndexOutOfRange {
                        role,
                        index,
                        network: network.to_string(),
                        available: signers.len(),
                    })?
            }
        };

        if address.is_zero() {
            return Err(unresolved());
        }

        Ok(address)
    }

    /// Resolve every role in `roles`, failing on the first unresolved one.
    pub fn resolve_roles(
        &self,
        roles: impl IntoIterator<Item = Role>,
        chain_id: u64,
        network: &str,
        signers: &[Address],
    ) -> Result<ResolvedAccounts, ConfigError> {
        let mut entries = BTreeMap::new();
        for role in roles {
            entries.insert(role, self.resolve(role, chain_id, network, signers)?);
        }
        Ok(ResolvedAccounts { chain_id, entries })
    }
}

/// Roles resolved for one chain, produced before any transaction is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccounts {
    chain_id: u64,
    entries: BTreeMap<Role, Address>,
}

impl ResolvedAccounts {
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn get(&self, role: Role) -> Result<Address, ConfigError> {
        self.entries
            .get(&role)
            .copied()
            .ok_or(ConfigError::UnresolvedAccount {
                role,
                chain_id: self.chain_id,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, Address)> + '_ {
        self.entries.iter().map(|(role, address)| (*role, *address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn builtin() -> NamedAccounts {
        ProjectConfig::builtin().unwrap().named_accounts
    }

    #[test]
    fn test_credit_token_per_chain() {
        let accounts = builtin();

        assert_eq!(
            accounts
                .resolve(Role::CreditToken, 1666700000, "testnet", &[])
                .unwrap(),
            addr("0x561277A9c06C3B20ECfD2892CbDdC2Cd6EE7E9de")
        );
        assert_eq!(
            accounts.resolve(Role::CreditToken, 4, "rinkeby", &[]).unwrap(),
            addr("0xDfb01A88D1e6099B42c9Bae38F8070027143b850")
        );
    }

    #[test]
    fn test_every_declared_literal_resolves() {
        let accounts = builtin();
        let expected = [
            (Role::CreditToken, 1666700000, addr("0x561277A9c06C3B20ECfD2892CbDdC2Cd6EE7E9de")),
            (Role::CreditToken, 1666600000, addr("0xDfb01A88D1e6099B42c9Bae38F8070027143b850")),
            (Role::CreditToken, 4, addr("0xDfb01A88D1e6099B42c9Bae38F8070027143b850")),
            (Role::GameToken, 1666700000, addr("0xdC97423e9c6129640Fe72ca6909E8D032029C1e0")),
            (Role::GameToken, 1666600000, addr("0x491614c6d1A7cc8b0A3Ed0bBdecd35a0110c11e6")),
            (Role::GameToken, 4, addr("0xDfb01A88D1e6099B42c9Bae38F8070027143b850")),
            (Role::ProxyAdmin, 1666700000, addr("0xc105124ff3c4208a03696d779019eF3171633186")),
            (Role::ProxyAdmin, 1666600000, addr("0xEf9e24bA2C2a02b2E6DcB0D797beefa90eF49790")),
            (Role::ProxyAdmin, 4, addr("0xFC0Fb7c5ecDC08FAE522372c385577c09ca64C3c")),
            (Role::RewardDistribution, 1666700000, addr("0xc105124ff3c4208a03696d779019eF3171633186")),
            (Role::RewardDistribution, 1666600000, addr("0xEf9e24bA2C2a02b2E6DcB0D797beefa90eF49790")),
            (Role::RewardDistribution, 4, addr("0xFC0Fb7c5ecDC08FAE522372c385577c09ca64C3c")),
        ];

        for (role, chain_id, literal) in expected {
            assert_eq!(
                accounts.resolve(role, chain_id, "any", &[]).unwrap(),
                literal,
                "{role} on chain {chain_id}"
            );
        }
    }

    #[test]
    fn test_undeclared_chain_fails() {
        let accounts = builtin();
        for role in [
            Role::CreditToken,
            Role::GameToken,
            Role::ProxyAdmin,
            Role::RewardDistribution,
        ] {
            let err = accounts.resolve(role, 31337, "local", &[]).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::UnresolvedAccount { role: r, chain_id: 31337 } if r == role
            ));
        }
    }

    #[test]
    fn test_deployer_defaults_to_first_signer() {
        let accounts = builtin();
        let signers = [Address::repeat_byte(0x11), Address::repeat_byte(0x22)];

        for chain_id in [1, 4, 31337, 1666600000] {
            assert_eq!(
                accounts
                    .resolve(Role::Deployer, chain_id, "any", &signers)
                    .unwrap(),
                signers[0]
            );
        }

        let err = accounts
            .resolve(Role::Deployer, 4, "rinkeby", &[])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::SignerIndexOutOfRange { index: 0, available: 0, .. }
        ));
    }

    #[test]
    fn test_zero_address_is_unresolved() {
        let mut accounts = NamedAccounts::default();
        accounts.insert(
            Role::CreditToken,
            NamedAccount {
                default: Some(AccountRef::Address(Address::ZERO)),
                chains: BTreeMap::new(),
            },
        );

        assert!(matches!(
            accounts.resolve(Role::CreditToken, 1, "any", &[]),
            Err(ConfigError::UnresolvedAccount { .. })
        ));
    }

    #[test]
    fn test_chain_entry_overrides_default() {
        let raw = r#"
            default = "0x1111111111111111111111111111111111111111"
            5 = 1
        "#;
        let account: NamedAccount = toml::from_str(raw).unwrap();
        let signers = [Address::repeat_byte(0xaa), Address::repeat_byte(0xbb)];

        let mut accounts = NamedAccounts::default();
        accounts.insert(Role::GameToken, account);

        assert_eq!(
            accounts.resolve(Role::GameToken, 5, "any", &signers).unwrap(),
            signers[1]
        );
        assert_eq!(
            accounts.resolve(Role::GameToken, 6, "any", &signers).unwrap(),
            Address::repeat_byte(0x11)
        );
    }

    #[test]
    fn test_invalid_chain_key_is_rejected() {
        let raw = r#"mainnet = "0x1111111111111111111111111111111111111111""#;
        assert!(toml::from_str::<NamedAccount>(raw).is_err());
    }

    #[test]
    fn test_resolve_roles_stops_at_first_missing() {
        let accounts = builtin();
        let signers = [Address::repeat_byte(0x11)];

        let resolved = accounts
            .resolve_roles([Role::Deployer, Role::CreditToken], 4, "rinkeby", &signers)
            .unwrap();
        assert_eq!(resolved.get(Role::Deployer).unwrap(), signers[0]);
        assert!(resolved.get(Role::GameToken).is_err());

        let err = accounts
            .resolve_roles(Role::ALL, 31337, "local", &signers)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnresolvedAccount { role: Role::CreditToken, .. }
        ));
    }
}
