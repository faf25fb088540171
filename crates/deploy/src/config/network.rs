//! Per-network endpoint and signing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default time to wait for a transaction receipt.
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

const fn default_live() -> bool {
    true
}

/// A single network entry of the project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    pub url: Url,
    /// Expected chain ID. When unset, the chain ID reported by the endpoint is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Where the signing keys for this network come from.
    pub accounts: AccountsConfig,
    /// Fixed gas limit for every transaction. Estimated when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    /// Fixed gas price in wei. Queried from the node when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    /// Maximum time to wait for a transaction to be confirmed.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Whether the network is a long-lived public chain.
    ///
    /// Records pointing at addresses without code are an error on live
    /// networks and are discarded on development networks.
    #[serde(default = "default_live")]
    pub live: bool,
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Signing key source of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountsConfig {
    /// Keys derived from a BIP-39 mnemonic (development networks).
    Mnemonic(MnemonicAccounts),
    /// Hex private keys read from environment variables.
    Env(EnvAccounts),
}

/// Accounts derived from a mnemonic along `m/44'/60'/0'/0/{index}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MnemonicAccounts {
    pub mnemonic: String,
    /// Number of accounts to derive.
    #[serde(default = "default_account_count")]
    pub count: usize,
    /// Initial balance (decimal wei) granted to each account by a local node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
}

const fn default_account_count() -> usize {
    20
}

/// Private keys taken from the environment, one variable per signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvAccounts {
    pub env: Vec<String>,
}
