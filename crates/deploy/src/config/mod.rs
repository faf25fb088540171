//! Project configuration.
//!
//! The configuration is plain data: networks, the named-account table,
//! deployment settings and the compiler settings the artifacts were built
//! with. It is parsed once at startup and handed to the pipeline by
//! reference; nothing reads it through globals.

mod network;

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

pub use network::{AccountsConfig, DEFAULT_TIMEOUT_MS, EnvAccounts, MnemonicAccounts, NetworkConfig};

use crate::{
    accounts::NamedAccounts,
    error::ConfigError,
    provision::LinkPolicy,
};

/// Built-in configuration, mirroring the networks and address tables the
/// contracts were originally deployed with.
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// The default name of the user configuration file.
pub const CONFIG_FILENAME: &str = "Stakebank.toml";

/// Complete project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub deploy: DeploySettings,
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default)]
    pub named_accounts: NamedAccounts,
    #[serde(default)]
    pub solidity: CompilerSettings,
}

impl ProjectConfig {
    /// Parse the built-in configuration.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Look up a network by name.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
        self.networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
    }
}

/// Filesystem locations used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the deployment record store (one sub-directory per network).
    pub deployments: PathBuf,
    /// Root of the compiled contract artifacts.
    pub artifacts: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            deployments: PathBuf::from("deployments"),
            artifacts: PathBuf::from("artifacts"),
        }
    }
}

/// Knobs of the deployment steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Artifact name of the proxy placed in front of `Bank`.
    pub proxy_contract: String,
    /// How `setStakingReward` behaves when the step runs again.
    #[serde(default)]
    pub link_policy: LinkPolicy,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            proxy_contract: crate::provision::DEFAULT_PROXY_CONTRACT.to_string(),
            link_policy: LinkPolicy::default(),
        }
    }
}

/// Solidity compiler settings the artifacts are expected to be built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    pub version: String,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    /// Extra sources compiled alongside the project.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            version: "0.8.9".to_string(),
            optimizer: OptimizerSettings::default(),
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            runs: 200,
        }
    }
}
