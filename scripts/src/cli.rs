//! Definitions of CLI arguments and commands for deploy scripts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use contracts_common::{
    constants::{DEFAULT_INITIALIZER, DEFAULT_LOGIC_CONTRACT, PRICE_DECIMALS},
    types::{ProxyKind, SnapshotId},
};

use crate::{
    commands::{
        convert_units_cmd, convert_usd_cmd, deploy_proxy, implementation, revert, snapshot,
        upgrade,
    },
    constants::{
        ACCOUNT_KEY_ENV_VAR, ARTIFACTS_PATH_ENV_VAR, BTTC_CHAIN_ID, BTTC_RPC_URL,
        DEFAULT_ARTIFACTS_PATH, DEFAULT_DEPLOYMENTS_PATH, DEFAULT_INIT_ARGS, DEFAULT_TIMEOUT_SECS,
        LOCALHOST_CHAIN_ID, LOCALHOST_RPC_URL, OFFCHAIN_SIGNER_ENV_VAR, RPC_URL_ENV_VAR,
    },
    errors::ScriptError,
};

/// Deploy, upgrade, and inspect upgradeable proxies
#[derive(Parser)]
pub struct Cli {
    /// The network to connect to
    #[arg(short, long, value_enum, default_value_t = Network::Localhost)]
    pub network: Network,

    /// Network RPC URL, overriding the network's default
    #[arg(short, long, env = RPC_URL_ENV_VAR)]
    pub rpc_url: Option<String>,

    /// Private key of the deployer
    #[arg(long = "pkey", env = ACCOUNT_KEY_ENV_VAR, hide_env_values = true)]
    pub priv_key: Option<String>,

    /// Directory containing the compilation artifacts
    #[arg(short, long, env = ARTIFACTS_PATH_ENV_VAR, default_value = DEFAULT_ARTIFACTS_PATH)]
    pub artifacts: PathBuf,

    /// Path to the file in which deployed addresses are recorded
    #[arg(short, long, default_value = DEFAULT_DEPLOYMENTS_PATH)]
    pub deployments_path: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The networks the scripts know how to reach
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Network {
    /// A local development node
    Localhost,
    /// The BTTC testnet
    Bttc,
}

impl Network {
    /// The default RPC URL of the network
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Network::Localhost => LOCALHOST_RPC_URL,
            Network::Bttc => BTTC_RPC_URL,
        }
    }

    /// The chain id the network's node must report
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Localhost => LOCALHOST_CHAIN_ID,
            Network::Bttc => BTTC_CHAIN_ID,
        }
    }
}

/// The connection settings shared by every command
pub struct ScriptContext {
    /// The RPC URL to connect to
    pub rpc_url: String,
    /// The chain id the node must report
    pub chain_id: u64,
    /// Private key of the deployer, if given
    pub priv_key: Option<String>,
    /// Directory containing the compilation artifacts
    pub artifacts: PathBuf,
    /// Path to the deployments file
    pub deployments_path: PathBuf,
}

impl Cli {
    /// Split the CLI into the command to run and the context to run it in
    pub fn into_parts(self) -> (Command, ScriptContext) {
        let context = ScriptContext {
            rpc_url: self
                .rpc_url
                .unwrap_or_else(|| self.network.rpc_url().to_string()),
            chain_id: self.network.chain_id(),
            priv_key: self.priv_key,
            artifacts: self.artifacts,
            deployments_path: self.deployments_path,
        };

        (self.command, context)
    }
}

/// The commands supported by the scripts
#[derive(Subcommand)]
pub enum Command {
    /// Deploy a logic contract behind an upgradeable proxy
    DeployProxy(DeployProxyArgs),
    /// Upgrade a proxy to a new logic contract
    Upgrade(UpgradeArgs),
    /// Print the implementation currently behind a proxy
    Implementation(ImplementationArgs),
    /// Capture the state of a development node
    Snapshot,
    /// Roll a development node back to a snapshot
    Revert(RevertArgs),
    /// Value a decimal amount in USD
    ConvertUsd(ConvertUsdArgs),
    /// Render a raw on-chain quantity in its display unit
    ConvertUnits(ConvertUnitsArgs),
}

impl Command {
    /// Run the command
    pub async fn run(self, context: &ScriptContext) -> Result<(), ScriptError> {
        match self {
            Command::DeployProxy(args) => deploy_proxy(args, context).await,
            Command::Upgrade(args) => upgrade(args, context).await,
            Command::Implementation(args) => implementation(args, context).await,
            Command::Snapshot => snapshot(context).await,
            Command::Revert(args) => revert(args, context).await,
            Command::ConvertUsd(args) => convert_usd_cmd(args),
            Command::ConvertUnits(args) => convert_units_cmd(args),
        }
    }
}

/// Deploy a logic contract behind an upgradeable proxy.
///
/// The proxy is initialized in its constructor, with the owner and init args
/// followed by the offchain signer.
#[derive(Args)]
pub struct DeployProxyArgs {
    /// Name of the logic contract artifact
    #[arg(short, long, default_value = DEFAULT_LOGIC_CONTRACT)]
    pub contract: String,

    /// The kind of proxy to deploy: uups, transparent, or beacon
    #[arg(short, long, default_value = "uups")]
    pub kind: ProxyKind,

    /// The initializer, by name or full signature
    #[arg(short, long, default_value = DEFAULT_INITIALIZER)]
    pub initializer: String,

    /// Address of the owner of the logic contract, defaults to the deployer
    #[arg(short, long)]
    pub owner: Option<String>,

    /// Initializer arguments following the owner, comma-separated
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_INIT_ARGS)]
    pub init_args: Vec<String>,

    /// Address of the trusted offchain signer
    #[arg(long, env = OFFCHAIN_SIGNER_ENV_VAR)]
    pub offchain_signer: String,

    /// Seconds to wait on each transaction
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
}

/// Upgrade a proxy to a new logic contract
#[derive(Args)]
pub struct UpgradeArgs {
    /// Address of the proxy, read from the deployments file if omitted
    #[arg(short, long)]
    pub proxy: Option<String>,

    /// Name under which the proxy is recorded in the deployments file
    #[arg(long, default_value = DEFAULT_LOGIC_CONTRACT)]
    pub deployed_as: String,

    /// Name of the new logic contract artifact
    #[arg(short, long)]
    pub contract: String,

    /// Seconds to wait on each transaction
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
}

/// Print the implementation currently behind a proxy
#[derive(Args)]
pub struct ImplementationArgs {
    /// Address of the proxy, read from the deployments file if omitted
    #[arg(short, long)]
    pub proxy: Option<String>,

    /// Name under which the proxy is recorded in the deployments file
    #[arg(long, default_value = DEFAULT_LOGIC_CONTRACT)]
    pub deployed_as: String,
}

/// Roll a development node back to a snapshot
#[derive(Args)]
pub struct RevertArgs {
    /// The snapshot id, in hex or decimal
    pub id: SnapshotId,
}

/// Value an amount in USD
#[derive(Args)]
pub struct ConvertUsdArgs {
    /// The amount, in whole units with an optional fraction, e.g. `1.5`
    #[arg(value_name = "DECIMAL_AMOUNT")]
    pub amount: String,

    /// The USD rate of a whole unit, in the quote's smallest units
    #[arg(value_name = "RAW_RATE")]
    pub rate: String,

    /// The number of decimals of the rate
    #[arg(short, long, default_value_t = PRICE_DECIMALS)]
    pub decimals: u8,
}

/// Render a raw on-chain quantity in its display unit
#[derive(Args)]
pub struct ConvertUnitsArgs {
    /// The quantity, in its 18-decimal smallest units, e.g. `1500000000000000000`
    #[arg(value_name = "RAW_QUANTITY")]
    pub raw_quantity: String,
}
