//! stakebank deploys the Bank / StakingRewards system on any configured network.

mod cli;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use comfy_table::{ContentArrangement, Table};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use stakebank_deploy::{
    ArtifactStore, ChainClient, DEFAULT_CONFIG, DeployChain, LinkPolicy, LocalNodeConfig, Outcome,
    ProjectConfig, RecordStore, Role, RpcChain, RunEnv, RunOptions, Signers, StandardDeployer,
    provision,
};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Command::Deploy {
            network,
            tags,
            reset,
            link_policy,
        } => deploy(&config, &network, tags, reset, link_policy).await,
        Command::Accounts { network } => accounts(&config, &network).await,
        Command::Deployments { network } => deployments(&config, &network),
        Command::Node { anvil } => node(&config, anvil).await,
        Command::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
        Command::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "stakebank",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

/// `STAKEBANK_*` variables read by the command line itself rather than the configuration.
const CLI_ENV_KEYS: &[&str] = &[
    "verbosity",
    "config",
    "deployments",
    "artifacts",
    "network",
    "link_policy",
    "anvil",
];

/// Built-in defaults, then the project file, then `STAKEBANK_*` variables.
fn load_config(cli: &Cli) -> Result<ProjectConfig> {
    let mut figment = Figment::from(Toml::string(DEFAULT_CONFIG));
    if cli.config.is_file() {
        tracing::debug!(path = %cli.config.display(), "Loading project configuration");
        figment = figment.merge(Toml::file(&cli.config));
    }
    let mut config: ProjectConfig = figment
        .merge(
            Env::prefixed("STAKEBANK_")
                .ignore(CLI_ENV_KEYS)
                .split("__"),
        )
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if let Some(deployments) = &cli.deployments {
        config.paths.deployments = deployments.clone();
    }
    if let Some(artifacts) = &cli.artifacts {
        config.paths.artifacts = artifacts.clone();
    }
    Ok(config)
}

async fn connect(config: &ProjectConfig, network: &str) -> Result<RpcChain> {
    let network_config = config.network(network)?;
    let signers = Signers::from_network(network, network_config)?;
    RpcChain::connect(network, network_config, signers)
        .await
        .with_context(|| format!("Failed to connect to network `{network}`"))
}

async fn deploy(
    config: &ProjectConfig,
    network: &str,
    tags: Vec<String>,
    reset: bool,
    link_policy: Option<LinkPolicy>,
) -> Result<()> {
    let network_config = config.network(network)?;

    let mut settings = config.deploy.clone();
    if let Some(link_policy) = link_policy {
        settings.link_policy = link_policy;
    }
    let chain = StandardDeployer::from_settings(&settings);
    let options = RunOptions { tags, reset };

    let mut names = Vec::new();
    chain.artifacts(&options, &mut names);
    let artifacts = ArtifactStore::load(&config.paths.artifacts, names.iter().map(String::as_str))
        .context("Failed to load contract artifacts")?;

    let client = connect(config, network).await?;
    let mut store = RecordStore::open(&config.paths.deployments, network, client.chain_id())
        .context("Failed to open deployment store")?;
    if let Some(dir) = store.dir() {
        tracing::debug!(dir = %dir.display(), "Using deployment store");
    }

    tracing::info!(
        network = client.network(),
        chain_id = client.chain_id(),
        link_policy = %settings.link_policy,
        "Deploying..."
    );

    let env = RunEnv {
        network,
        live: network_config.live,
        named_accounts: &config.named_accounts,
        artifacts: &artifacts,
    };
    let report = provision::run(&chain, &client, env, &mut store, &options)
        .await
        .with_context(|| format!("Deployment to `{network}` failed"))?;

    let mut table = new_table(["Step", "Action", "Target", "Transaction"]);
    for step in &report.steps {
        for outcome in &step.outcomes {
            let row = match outcome {
                Outcome::Deployed {
                    name,
                    address,
                    transaction_hash,
                } => [
                    step.tag.to_string(),
                    format!("deployed {name}"),
                    address.to_string(),
                    transaction_hash.to_string(),
                ],
                Outcome::Reused { name, address } => [
                    step.tag.to_string(),
                    format!("reused {name}"),
                    address.to_string(),
                    String::new(),
                ],
                Outcome::Executed {
                    label,
                    transaction_hash,
                } => [
                    step.tag.to_string(),
                    label.clone(),
                    "sent".to_string(),
                    transaction_hash.to_string(),
                ],
                Outcome::Skipped { label, reason } => [
                    step.tag.to_string(),
                    label.clone(),
                    format!("skipped: {reason}"),
                    String::new(),
                ],
            };
            table.add_row(row);
        }
    }
    println!("{table}");
    println!(
        "{} transaction(s) sent on {} (chain {})",
        report.transactions(),
        report.network,
        report.chain_id
    );
    Ok(())
}

async fn accounts(config: &ProjectConfig, network: &str) -> Result<()> {
    let network_config = config.network(network)?;
    let signers = Signers::from_network(network, network_config)?;

    let chain_id = match network_config.chain_id {
        Some(chain_id) => chain_id,
        None => connect(config, network).await?.chain_id(),
    };

    let mut table = new_table(["Role", "Address"]);
    for role in Role::ALL {
        let resolved = config
            .named_accounts
            .resolve(role, chain_id, network, &signers.addresses());
        let cell = match resolved {
            Ok(address) => address.to_string(),
            Err(e) => format!("unresolved: {e}"),
        };
        table.add_row([role.to_string(), cell]);
    }
    println!("Named accounts of `{network}` (chain {chain_id})");
    println!("{table}");
    Ok(())
}

fn deployments(config: &ProjectConfig, network: &str) -> Result<()> {
    let store = RecordStore::open_read_only(&config.paths.deployments, network)
        .context("Failed to read deployment store")?;

    let mut table = new_table(["Contract", "Address", "State", "Block", "Transaction"]);
    for (name, record) in store.records() {
        table.add_row([
            name.to_string(),
            record.address.to_string(),
            store.state(name).to_string(),
            record.block_number.to_string(),
            record.transaction_hash.to_string(),
        ]);
    }

    match store.chain_id() {
        Some(chain_id) => println!("Deployments on `{network}` (chain {chain_id})"),
        None => println!("No deployments recorded on `{network}`"),
    }
    println!("{table}");

    for link in store.journal().links() {
        println!("{}: {} -> {}", link.contract, link.key, link.target);
    }
    Ok(())
}

async fn node(config: &ProjectConfig, anvil: String) -> Result<()> {
    let mut node_config = LocalNodeConfig::from_network(config.network(cli::DEFAULT_NETWORK)?)?;
    node_config.binary = anvil;

    let mut node = node_config
        .spawn()
        .await
        .context("Failed to start local node")?;
    tracing::info!(url = %node.url, chain_id = node.chain_id, "Press Ctrl+C to stop");

    let exited = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        status = node.wait() => Some(status?),
    };

    match exited {
        None => node.stop().await?,
        Some(status) => anyhow::bail!("Local node exited unexpectedly: {status}"),
    }
    Ok(())
}

fn new_table<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}
