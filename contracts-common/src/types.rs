//! Domain types describing proxy deployments and chain snapshots

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use alloy_primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::constants::{
    BEACON_PROXY_CONTRACT, DEFAULT_INITIALIZER, ERC1967_PROXY_CONTRACT,
    TRANSPARENT_PROXY_CONTRACT,
};

/// The flavor of upgradeable proxy placed in front of a logic contract
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// An `ERC1967Proxy` whose upgrade entry point lives in the logic contract
    Uups,
    /// A `TransparentUpgradeableProxy`, upgraded through its `ProxyAdmin`
    Transparent,
    /// A `BeaconProxy` reading its implementation from an `UpgradeableBeacon`
    Beacon,
}

impl ProxyKind {
    /// The artifact name of the proxy contract deployed for this kind
    pub fn proxy_contract(&self) -> &'static str {
        match self {
            ProxyKind::Uups => ERC1967_PROXY_CONTRACT,
            ProxyKind::Transparent => TRANSPARENT_PROXY_CONTRACT,
            ProxyKind::Beacon => BEACON_PROXY_CONTRACT,
        }
    }
}

impl Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Uups => write!(f, "uups"),
            ProxyKind::Transparent => write!(f, "transparent"),
            ProxyKind::Beacon => write!(f, "beacon"),
        }
    }
}

impl FromStr for ProxyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uups" => Ok(ProxyKind::Uups),
            "transparent" => Ok(ProxyKind::Transparent),
            "beacon" => Ok(ProxyKind::Beacon),
            other => Err(format!("unknown proxy kind: {other}")),
        }
    }
}

/// Everything needed to deploy a logic contract behind a proxy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    /// The artifact name of the logic contract
    pub contract_name: String,
    /// The initializer arguments, in order, rendered as text.
    ///
    /// They are coerced to the initializer's ABI types at encoding time; the
    /// trusted offchain signer is appended after them.
    pub init_args: Vec<String>,
    /// The kind of proxy to deploy
    pub kind: ProxyKind,
    /// The initializer, either as a bare name or as a full signature
    pub initializer: String,
}

impl DeploymentDescriptor {
    /// Describe a deployment using the default `initialize` initializer
    pub fn new(contract_name: impl Into<String>, init_args: Vec<String>, kind: ProxyKind) -> Self {
        Self {
            contract_name: contract_name.into(),
            init_args,
            kind,
            initializer: DEFAULT_INITIALIZER.to_string(),
        }
    }

    /// Use the given initializer instead of the default one
    pub fn with_initializer(mut self, initializer: impl Into<String>) -> Self {
        self.initializer = initializer.into();
        self
    }
}

/// A logic contract live behind a proxy
///
/// The proxy address is the durable identity of the deployment, the
/// implementation address changes with every upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedInstance {
    /// The proxy contract address
    pub proxy: Address,
    /// The implementation currently stored behind the proxy
    pub implementation: Address,
    /// The hash of the transaction that produced this state
    pub deployment_tx: TxHash,
    /// The account allowed to upgrade the proxy
    pub owner: Address,
    /// The kind of proxy
    pub kind: ProxyKind,
    /// The `ProxyAdmin` of a transparent proxy, or the beacon of a beacon proxy
    pub admin: Option<Address>,
}

/// An opaque handle to a captured chain state
///
/// Handles are single-use: restoring a snapshot consumes it.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SnapshotId(pub U256);

impl Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(s, 10),
        };
        id.map(SnapshotId).map_err(|e| e.to_string())
    }
}
