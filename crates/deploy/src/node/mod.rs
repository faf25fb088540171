//! Local development node matching the `local` network.

mod cmd;

use std::{
    process::ExitStatus,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use url::Url;

pub use cmd::AnvilCmdBuilder;

use crate::{
    config::{AccountsConfig, NetworkConfig},
    error::{ConfigError, DeployError, Result},
};

/// Chain ID Anvil uses by default.
pub const DEFAULT_CHAIN_ID: u64 = 31337;

/// Maximum time to wait for the node to answer RPC calls.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between readiness polls.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Settings of a local node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNodeConfig {
    /// Path or name of the `anvil` binary.
    pub binary: String,
    pub host: String,
    pub port: u16,
    pub chain_id: u64,
    pub mnemonic: String,
    pub accounts: usize,
    /// Balance of each account, in ether.
    pub balance_eth: Option<u128>,
    pub gas_limit: Option<u64>,
}

impl LocalNodeConfig {
    /// Derive node settings from a network served by a local node.
    ///
    /// The network must use mnemonic accounts so that the node funds exactly
    /// the keys the pipeline signs with.
    pub fn from_network(network: &NetworkConfig) -> Result<Self, ConfigError> {
        let AccountsConfig::Mnemonic(accounts) = &network.accounts else {
            return Err(ConfigError::InvalidNodeSetting(
                "a local node needs mnemonic accounts".to_string(),
            ));
        };

        let host = network
            .url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidNodeSetting(format!("no host in {}", network.url)))?
            .to_string();
        let port = network
            .url
            .port_or_known_default()
            .ok_or_else(|| ConfigError::InvalidNodeSetting(format!("no port in {}", network.url)))?;

        let balance_eth = accounts
            .balance
            .as_deref()
            .map(wei_to_ether)
            .transpose()?;

        Ok(Self {
            binary: "anvil".to_string(),
            host,
            port,
            chain_id: network.chain_id.unwrap_or(DEFAULT_CHAIN_ID),
            mnemonic: accounts.mnemonic.clone(),
            accounts: accounts.count,
            balance_eth,
            gas_limit: network.gas,
        })
    }

    pub fn args(&self) -> Vec<String> {
        let mut builder = AnvilCmdBuilder::new(self.chain_id)
            .host(self.host.clone())
            .port(self.port)
            .accounts(self.accounts)
            .mnemonic(self.mnemonic.clone())
            .gas_limit(self.gas_limit);
        if let Some(balance) = self.balance_eth {
            builder = builder.balance_eth(balance);
        }
        builder.build()
    }

    pub fn url(&self) -> Result<Url, ConfigError> {
        Url::parse(&format!("http://{}:{}/", self.host, self.port))
            .map_err(|e| ConfigError::InvalidNodeSetting(e.to_string()))
    }

    /// Spawn the node and wait until it serves RPC requests.
    pub async fn spawn(&self) -> Result<LocalNode> {
        let url = self.url()?;
        tracing::info!(binary = %self.binary, %url, chain_id = self.chain_id, "Starting local node");

        let child = Command::new(&self.binary)
            .args(self.args())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::io(format!("Failed to start `{}`", self.binary), e))?;

        let node = LocalNode {
            child,
            url,
            chain_id: self.chain_id,
        };
        node.wait_until_ready(READY_TIMEOUT).await?;
        Ok(node)
    }
}

/// A running local node. The process is killed on drop.
#[derive(Debug)]
pub struct LocalNode {
    child: Child,
    pub url: Url,
    pub chain_id: u64,
}

impl LocalNode {
    async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let start = Instant::now();

        loop {
            match probe_chain_id(&client, &self.url).await {
                Ok(chain_id) => {
                    tracing::info!(url = %self.url, chain_id, "Local node ready");
                    return Ok(());
                }
                Err(e) => {
                    tracing::trace!(error = %e, url = %self.url, "Readiness check failed, retrying...");
                }
            }

            if start.elapsed() > timeout {
                return Err(DeployError::NodeNotReady {
                    url: self.url.to_string(),
                    timeout,
                });
            }

            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.child
            .wait()
            .await
            .map_err(|e| DeployError::io("Failed to wait for local node", e))
    }

    /// Stop the process.
    pub async fn stop(&mut self) -> Result<()> {
        tracing::info!(url = %self.url, "Stopping local node");
        self.child
            .kill()
            .await
            .map_err(|e| DeployError::io("Failed to stop local node", e))
    }
}

async fn probe_chain_id(client: &reqwest::Client, url: &Url) -> Result<u64, String> {
    let response: serde_json::Value = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_chainId",
            "params": [],
            "id": 1
        }))
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json()
        .await
        .map_err(|e| e.to_string())?;

    let hex = response
        .get("result")
        .and_then(|r| r.as_str())
        .ok_or_else(|| "no result in response".to_string())?;
    u64::from_str_radix(hex.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

/// Convert a decimal wei amount to whole ether, as expected by `anvil --balance`.
fn wei_to_ether(wei: &str) -> Result<u128, ConfigError> {
    let wei: u128 = wei
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidNodeSetting(format!("invalid balance `{wei}`: {e}")))?;
    if wei % WEI_PER_ETHER != 0 {
        return Err(ConfigError::InvalidNodeSetting(format!(
            "balance {wei} wei is not a whole number of ether"
        )));
    }
    Ok(wei / WEI_PER_ETHER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    #[test]
    fn test_local_network_node_settings() {
        let config = ProjectConfig::builtin().unwrap();
        let node = LocalNodeConfig::from_network(config.network("local").unwrap()).unwrap();

        assert_eq!(node.host, "127.0.0.1");
        assert_eq!(node.port, 8545);
        assert_eq!(node.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(node.accounts, 200);
        assert_eq!(node.balance_eth, Some(100_000_000));
        assert_eq!(node.gas_limit, Some(10_000_000));
        assert_eq!(node.url().unwrap().as_str(), "http://127.0.0.1:8545/");
    }

    #[test]
    fn test_env_key_network_cannot_be_served_locally() {
        let config = ProjectConfig::builtin().unwrap();
        assert!(matches!(
            LocalNodeConfig::from_network(config.network("mainnet").unwrap()),
            Err(ConfigError::InvalidNodeSetting(_))
        ));
    }

    #[test]
    fn test_wei_to_ether() {
        assert_eq!(wei_to_ether("100000000000000000000000000").unwrap(), 100_000_000);
        assert!(wei_to_ether("1").is_err());
        assert!(wei_to_ether("lots").is_err());
    }
}
