//! Local signing keys of a network.

use alloy_core::primitives::{Address, B256, U256, keccak256};
use alloy_signer_local::{MnemonicBuilder, coins_bip39::English};
use derive_more::Deref;
use k256::ecdsa::{RecoveryId, SigningKey};

use crate::{
    config::{AccountsConfig, NetworkConfig},
    error::{ConfigError, DeployError},
};

/// A secp256k1 key and the address it controls.
#[derive(Clone)]
pub struct LocalKey {
    address: Address,
    key: SigningKey,
}

/// The `(r, s, y_parity)` triple of a recoverable signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: U256,
    pub s: U256,
    pub y_parity: bool,
}

impl LocalKey {
    /// Build a key from 32 raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let key = SigningKey::from_slice(bytes).map_err(|e| e.to_string())?;
        Ok(Self::from_signing_key(key))
    }

    /// Build a key from a hex string, with or without `0x`.
    pub fn from_hex(hex_key: &str) -> Result<Self, String> {
        let bytes = hex::decode(hex_key.trim().trim_start_matches("0x")).map_err(|e| e.to_string())?;
        Self::from_slice(&bytes)
    }

    fn from_signing_key(key: SigningKey) -> Self {
        // Uncompressed SEC1 point: 0x04 marker followed by the 64-byte X || Y.
        let point = key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let address = Address::from_slice(&hash[12..]);
        Self { address, key }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte prehash, normalizing `s` to the lower half of the curve order.
    pub fn sign_prehash(&self, hash: &B256) -> Result<RecoverableSignature, DeployError> {
        let (mut signature, mut recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| DeployError::Signing(e.to_string()))?;

        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        let bytes = signature.to_bytes();
        Ok(RecoverableSignature {
            r: U256::from_be_slice(&bytes[..32]),
            s: U256::from_be_slice(&bytes[32..]),
            y_parity: recovery_id.is_y_odd(),
        })
    }
}

impl std::fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Ordered signer list of a network. Index 0 is the default deployer.
#[derive(Debug, Clone, Default, Deref)]
pub struct Signers(Vec<LocalKey>);

impl Signers {
    pub fn new(keys: Vec<LocalKey>) -> Self {
        Self(keys)
    }

    /// Load the signers a network configuration points at.
    ///
    /// Environment keys must all be present; a missing variable is a
    /// configuration error rather than an empty signer list.
    pub fn from_network(network: &str, config: &NetworkConfig) -> Result<Self, ConfigError> {
        match &config.accounts {
            AccountsConfig::Mnemonic(accounts) => {
                let mut keys = Vec::with_capacity(accounts.count);
                for index in 0..accounts.count {
                    keys.push(derive_mnemonic_key(network, &accounts.mnemonic, index)?);
                }
                tracing::debug!(network, count = keys.len(), "Derived signers from mnemonic");
                Ok(Self(keys))
            }
            AccountsConfig::Env(accounts) => {
                let mut keys = Vec::with_capacity(accounts.env.len());
                for var in &accounts.env {
                    let value = std::env::var(var)
                        .ok()
                        .filter(|value| !value.trim().is_empty())
                        .ok_or_else(|| ConfigError::MissingPrivateKey {
                            network: network.to_string(),
                            var: var.clone(),
                        })?;
                    let key = LocalKey::from_hex(&value).map_err(|reason| {
                        ConfigError::InvalidPrivateKey {
                            source_name: var.clone(),
                            reason,
                        }
                    })?;
                    keys.push(key);
                }
                Ok(Self(keys))
            }
        }
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.0.iter().map(LocalKey::address).collect()
    }

    pub fn get(&self, address: Address) -> Option<&LocalKey> {
        self.0.iter().find(|key| key.address == address)
    }
}

fn derive_mnemonic_key(network: &str, phrase: &str, index: usize) -> Result<LocalKey, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidMnemonic {
        network: network.to_string(),
        reason,
    };

    let index = u32::try_from(index).map_err(|e| invalid(e.to_string()))?;
    let signer = MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .index(index)
        .map_err(|e| invalid(e.to_string()))?
        .build()
        .map_err(|e| invalid(e.to_string()))?;

    LocalKey::from_slice(signer.to_bytes().as_slice()).map_err(invalid)
}
