//! Error taxonomy for the deployment pipeline.
//!
//! [`ConfigError`] covers everything that can be detected before the first
//! transaction is submitted. [`DeployError`] wraps it and adds dependency,
//! on-chain, transport and store failures.

use std::{path::PathBuf, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use thiserror::Error;

use crate::{accounts::Role, lifecycle::Lifecycle, registry::ContractId};

/// Result alias used across the crate.
pub type Result<T, E = DeployError> = std::result::Result<T, E>;

/// Misconfiguration detected before any transaction is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),

    #[error("named account `{role}` is not configured for chain {chain_id}")]
    UnresolvedAccount { role: Role, chain_id: u64 },

    #[error(
        "named account `{role}` refers to signer #{index} but network `{network}` only has {available} signer(s)"
    )]
    SignerIndexOutOfRange {
        role: Role,
        index: usize,
        network: String,
        available: usize,
    },

    #[error("private key for network `{network}` is missing, set the `{var}` environment variable")]
    MissingPrivateKey { network: String, var: String },

    #[error("invalid private key in `{source_name}`: {reason}")]
    InvalidPrivateKey { source_name: String, reason: String },

    #[error("invalid mnemonic for network `{network}`: {reason}")]
    InvalidMnemonic { network: String, reason: String },

    #[error("no signer is available for account {0}")]
    UnknownSigner(Address),

    #[error("proxy admin {0} is also the deployer, calls through the proxy would hit the admin interface")]
    ProxyAdminIsDeployer(Address),

    #[error("network `{network}` is configured for chain {expected} but its endpoint reports chain {actual}")]
    ChainIdMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },

    #[error("deployment store {path} belongs to chain {stored}, the endpoint reports chain {actual}")]
    StoreChainMismatch {
        path: PathBuf,
        stored: u64,
        actual: u64,
    },

    #[error("no deployment step is tagged `{0}`")]
    UnknownTag(String),

    #[error("artifact `{name}` not found under {}", .root.display())]
    MissingArtifact { name: String, root: PathBuf },

    #[error("invalid artifact {}: {reason}", .path.display())]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("invalid local node setting: {0}")]
    InvalidNodeSetting(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Any failure raised while provisioning contracts.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("`{contract}` has not been deployed on network `{network}` yet, run its step first")]
    MissingPrerequisite {
        contract: ContractId,
        network: String,
    },

    #[error("{method} reverted: {reason}")]
    Reverted {
        method: String,
        reason: String,
        data: Bytes,
    },

    #[error("contract at {0} is already initialized")]
    AlreadyInitialized(Address),

    #[error("account {account} cannot pay for the transaction: requires {required} wei, holds {available} wei")]
    InsufficientFunds {
        account: Address,
        required: U256,
        available: U256,
    },

    #[error("{method} failed with RPC error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
        data: Option<Bytes>,
    },

    #[error("{method} request failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response to {method}: {reason}")]
    Decode { method: String, reason: String },

    #[error(
        "transaction {tx_hash} was not confirmed within {timeout:?}, inspect the chain before running again"
    )]
    Timeout { tx_hash: B256, timeout: Duration },

    #[error(
        "artifact or constructor arguments of `{contract}` changed since it was deployed at {address}; upgrades are not supported, use --reset to start over"
    )]
    ArtifactChanged { contract: String, address: Address },

    #[error("recorded `{contract}` at {address} has no code on chain")]
    StaleRecord { contract: String, address: Address },

    #[error("{key} is already linked to {existing}, refusing to replace it with {requested}")]
    LinkConflict {
        key: Address,
        existing: Address,
        requested: Address,
    },

    #[error("`{contract}` cannot move from {from} to {to}")]
    InvalidTransition {
        contract: String,
        from: Lifecycle,
        to: Lifecycle,
    },

    #[error("local node at {url} did not become ready within {timeout:?}")]
    NodeNotReady { url: String, timeout: Duration },

    #[error("deployment store {} is locked by another process", .0.display())]
    StoreLocked(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to sign transaction: {0}")]
    Signing(String),
}

impl DeployError {
    /// Whether retrying the same request may succeed.
    ///
    /// Only transport-level failures qualify. Reverts, funding and
    /// configuration problems are deterministic and must not be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source.status().is_some_and(|status| {
                        status.is_server_error()
                            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    })
            }
            // -32005: request limit exceeded (rate limiting on public endpoints).
            Self::Rpc { code, .. } => *code == -32005,
            _ => false,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logic_errors_are_not_transient() {
        let reverted = DeployError::Reverted {
            method: "Bank.initialize".to_string(),
            reason: "Initializable: contract is already initialized".to_string(),
            data: Bytes::new(),
        };
        assert!(!reverted.is_transient());

        let funds = DeployError::InsufficientFunds {
            account: Address::ZERO,
            required: U256::from(1),
            available: U256::ZERO,
        };
        assert!(!funds.is_transient());
    }

    #[test]
    fn test_rate_limit_is_transient() {
        let err = DeployError::Rpc {
            method: "eth_call".to_string(),
            code: -32005,
            message: "limit exceeded".to_string(),
            data: None,
        };
        assert!(err.is_transient());

        let err = DeployError::Rpc {
            method: "eth_call".to_string(),
            code: -32000,
            message: "nonce too low".to_string(),
            data: None,
        };
        assert!(!err.is_transient());
    }
}
