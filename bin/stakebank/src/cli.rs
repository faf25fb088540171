use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use stakebank_deploy::{CONFIG_FILENAME, LinkPolicy};
use tracing::level_filters::LevelFilter;

/// The network used when none is given.
pub const DEFAULT_NETWORK: &str = "local";

#[derive(Parser)]
#[command(name = "stakebank")]
#[command(
    author,
    version,
    about = "Deploy the Bank and StakingRewards contracts, idempotently, on any configured network"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "STAKEBANK_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the project configuration file.
    ///
    /// Layered on top of the built-in configuration. A missing file is not an error.
    #[arg(short, long, global = true, env = "STAKEBANK_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// Overrides the deployment records directory.
    #[arg(long, global = true, env = "STAKEBANK_DEPLOYMENTS")]
    pub deployments: Option<PathBuf>,

    /// Overrides the compiled artifacts directory.
    #[arg(long, global = true, env = "STAKEBANK_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy or reuse every selected contract on a network.
    Deploy {
        /// The network to deploy to.
        #[arg(short, long, env = "STAKEBANK_NETWORK", default_value = DEFAULT_NETWORK)]
        network: String,

        /// Only run the steps with these tags (`Bank`, `StakingRewards`).
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Forget the recorded deployments of the network and start over.
        #[arg(long, default_value_t = false)]
        reset: bool,

        /// How `setStakingReward` behaves when the step runs again.
        #[arg(long, env = "STAKEBANK_LINK_POLICY")]
        link_policy: Option<LinkPolicy>,
    },

    /// Show the named accounts resolved for a network.
    Accounts {
        #[arg(short, long, env = "STAKEBANK_NETWORK", default_value = DEFAULT_NETWORK)]
        network: String,
    },

    /// Show the recorded deployments of a network.
    Deployments {
        #[arg(short, long, env = "STAKEBANK_NETWORK", default_value = DEFAULT_NETWORK)]
        network: String,
    },

    /// Run a local node matching the `local` network until interrupted.
    Node {
        /// Path or name of the `anvil` binary.
        #[arg(long, env = "STAKEBANK_ANVIL", default_value = "anvil")]
        anvil: String,
    },

    /// Print the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
