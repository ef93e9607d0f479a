//! Constants used in the deploy scripts

use std::time::Duration;

/// The delay between receipt queries while waiting on a transaction
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The default number of seconds to wait on a transaction before giving up
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// The extension of a compilation artifact
pub const ARTIFACT_EXTENSION: &str = ".json";

/// The suffix of the debug files Hardhat writes next to each artifact
pub const DEBUG_ARTIFACT_SUFFIX: &str = ".dbg.json";

/// The directory in which Hardhat & Foundry store full compiler build info
pub const BUILD_INFO_DIR: &str = "build-info";

/// The default directory containing the compilation artifacts
pub const DEFAULT_ARTIFACTS_PATH: &str = "artifacts";

/// The default path of the deployments file
pub const DEFAULT_DEPLOYMENTS_PATH: &str = "deployments.json";

/// The top-level key of the deployments file
pub const DEPLOYMENTS_KEY: &str = "deployments";

/// The suffix of a proxy's key in the deployments file
pub const PROXY_KEY_SUFFIX: &str = "Proxy";

/// The suffix of an implementation's key in the deployments file
pub const IMPLEMENTATION_KEY_SUFFIX: &str = "Implementation";

/// The default textual initializer arguments, following the owner
pub const DEFAULT_INIT_ARGS: &str = "0";

/// The RPC URL of a local development node
pub const LOCALHOST_RPC_URL: &str = "http://127.0.0.1:8545";

/// The chain id of a local development node
pub const LOCALHOST_CHAIN_ID: u64 = 31337;

/// The RPC URL of the BTTC testnet
pub const BTTC_RPC_URL: &str = "https://pre-rpc.bt.io/";

/// The chain id of the BTTC testnet
pub const BTTC_CHAIN_ID: u64 = 1029;

/// The environment variable overriding the network's RPC URL
pub const RPC_URL_ENV_VAR: &str = "RPC_URL";

/// The environment variable holding the deployer's private key
pub const ACCOUNT_KEY_ENV_VAR: &str = "ACCOUNT_KEY";

/// The environment variable pointing to the compilation artifacts
pub const ARTIFACTS_PATH_ENV_VAR: &str = "ARTIFACTS_PATH";

/// The environment variable holding the offchain signer address
pub const OFFCHAIN_SIGNER_ENV_VAR: &str = "OFFCHAIN_SIGNER";

/// The log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";
