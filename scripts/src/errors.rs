//! Definitions of errors that can occur during the execution of the deployment scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::Duration,
};

use alloy::{
    primitives::{Address, Bytes, TxHash},
    sol_types::{Revert, SolError, SolInterface},
};
use contracts_common::{solidity::IUpgradeErrors::IUpgradeErrorsErrors, types::SnapshotId};

/// Errors that can occur during the execution of the deployment scripts
#[derive(Debug)]
pub enum ScriptError {
    /// A contract name is unknown to the build artifacts
    ContractNotFound(String),
    /// A transaction was not confirmed within the allotted time
    DeploymentTimeout {
        /// The hash of the unconfirmed transaction
        tx_hash: TxHash,
        /// The timeout that elapsed
        timeout: Duration,
    },
    /// A deployment, initialization, or upgrade transaction reverted
    DeploymentFailed(RevertReason),
    /// The signer is not the recognized upgrade authority of the proxy
    UnauthorizedUpgrade {
        /// The signer that attempted the upgrade
        signer: Address,
        /// The account allowed to upgrade the proxy
        owner: Address,
    },
    /// A snapshot handle was never taken or has already been consumed
    InvalidSnapshot(SnapshotId),
    /// A quantity cannot be converted
    InvalidQuantity(String),
    /// Waiting on a transaction was cancelled by the caller
    Cancelled(TxHash),
    /// Error reading the deployments file
    ReadDeployments(String),
    /// Error writing the deployments file
    WriteDeployments(String),
    /// Error parsing a Solidity compilation artifact
    ArtifactParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// Error calling a contract method or reading chain state
    ContractInteraction(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::ContractNotFound(name) => write!(f, "contract not found: {}", name),
            ScriptError::DeploymentTimeout { tx_hash, timeout } => write!(
                f,
                "transaction {:#x} not confirmed after {:?}",
                tx_hash, timeout
            ),
            ScriptError::DeploymentFailed(reason) => write!(f, "deployment failed: {}", reason),
            ScriptError::UnauthorizedUpgrade { signer, owner } => write!(
                f,
                "unauthorized upgrade: signer {:#x} is not the proxy owner {:#x}",
                signer, owner
            ),
            ScriptError::InvalidSnapshot(id) => write!(f, "invalid snapshot: {}", id),
            ScriptError::InvalidQuantity(s) => write!(f, "invalid quantity: {}", s),
            ScriptError::Cancelled(tx_hash) => {
                write!(f, "cancelled while waiting on transaction {:#x}", tx_hash)
            }
            ScriptError::ReadDeployments(s) => write!(f, "error reading deployments: {}", s),
            ScriptError::WriteDeployments(s) => write!(f, "error writing deployments: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
        }
    }
}

impl Error for ScriptError {}

/// The decoded reason of an on-chain revert
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevertReason {
    /// The initializer was invoked on an already-initialized contract
    AlreadyInitialized,
    /// The caller is not the owner of the contract
    Unauthorized(Address),
    /// The new implementation is not a valid upgrade target
    InvalidImplementation(Address),
    /// The proxy rejected the call
    ProxyRejected(String),
    /// A revert carrying an `Error(string)` message
    Message(String),
    /// A revert whose data could not be decoded
    Unknown(Bytes),
    /// A transaction was mined but its execution failed
    TransactionFailed(TxHash),
}

impl RevertReason {
    /// Decode the revert data returned by the chain
    pub fn from_revert_data(data: &[u8]) -> Self {
        if let Ok(err) = IUpgradeErrorsErrors::abi_decode(data) {
            return match err {
                IUpgradeErrorsErrors::InvalidInitialization(_) => RevertReason::AlreadyInitialized,
                IUpgradeErrorsErrors::OwnableUnauthorizedAccount(e) => {
                    RevertReason::Unauthorized(e.account)
                }
                IUpgradeErrorsErrors::ERC1967InvalidImplementation(e) => {
                    RevertReason::InvalidImplementation(e.implementation)
                }
                IUpgradeErrorsErrors::BeaconInvalidImplementation(e) => {
                    RevertReason::InvalidImplementation(e.implementation)
                }
                other => RevertReason::ProxyRejected(format!("{other:?}")),
            };
        }

        match Revert::abi_decode(data) {
            Ok(revert) => RevertReason::Message(revert.reason),
            Err(_) => RevertReason::Unknown(Bytes::copy_from_slice(data)),
        }
    }
}

impl Display for RevertReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RevertReason::AlreadyInitialized => write!(f, "contract is already initialized"),
            RevertReason::Unauthorized(account) => {
                write!(f, "account {:#x} is not the owner", account)
            }
            RevertReason::InvalidImplementation(implementation) => {
                write!(f, "invalid implementation {:#x}", implementation)
            }
            RevertReason::ProxyRejected(s) => write!(f, "proxy rejected call: {}", s),
            RevertReason::Message(s) => write!(f, "reverted: {}", s),
            RevertReason::Unknown(data) => write!(f, "reverted with data {}", data),
            RevertReason::TransactionFailed(tx_hash) => {
                write!(f, "transaction {:#x} failed", tx_hash)
            }
        }
    }
}
