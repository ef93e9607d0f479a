//! The interface through which the scripts talk to a chain, real or simulated

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::Duration,
};

use alloy::{
    primitives::{Address, Bytes, TxHash, B256, U256},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    constants::DEFAULT_POLL_INTERVAL,
    errors::{RevertReason, ScriptError},
};

pub mod rpc;

/// Errors surfaced by a chain client
#[derive(Debug, Clone)]
pub enum ChainError {
    /// The transport failed or the node returned an error
    Transport(String),
    /// Execution reverted with the given data
    Reverted(Bytes),
    /// The transaction could not be built or signed
    Signing(String),
}

impl Display for ChainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Transport(s) => write!(f, "transport error: {}", s),
            ChainError::Reverted(data) => write!(f, "execution reverted: {}", data),
            ChainError::Signing(s) => write!(f, "signing error: {}", s),
        }
    }
}

impl Error for ChainError {}

impl From<ChainError> for ScriptError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Reverted(data) => {
                ScriptError::DeploymentFailed(RevertReason::from_revert_data(&data))
            }
            ChainError::Transport(s) | ChainError::Signing(s) => {
                ScriptError::ContractInteraction(s)
            }
        }
    }
}

/// A mined transaction, independent of the node serving it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    /// The transaction hash
    pub transaction_hash: TxHash,
    /// The block the transaction was included in
    pub block_number: u64,
    /// The sender
    pub from: Address,
    /// The callee, `None` for contract creations
    pub to: Option<Address>,
    /// The created contract, if any
    pub contract_address: Option<Address>,
    /// Whether execution succeeded
    pub status: bool,
    /// The gas consumed by the transaction
    pub gas_used: u64,
}

/// The provider collaborator: submits transactions and reads chain state
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The id of the connected chain
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Sign the transaction with the given signer and broadcast it.
    ///
    /// The signer is only borrowed for the duration of the call.
    async fn submit(
        &self,
        signer: &PrivateKeySigner,
        tx: TransactionRequest,
    ) -> Result<TxHash, ChainError>;

    /// The receipt of a transaction, `None` while it is pending
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, ChainError>;

    /// Execute a read-only call against the latest state
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, ChainError>;

    /// Execute a read-only call against the state at the end of the given
    /// block. Clients without historical state run it against the latest one.
    async fn call_at(
        &self,
        tx: TransactionRequest,
        _block_number: u64,
    ) -> Result<Bytes, ChainError> {
        self.call(tx).await
    }

    /// Read a raw storage slot
    async fn storage_at(&self, address: Address, slot: B256) -> Result<U256, ChainError>;
}

/// A chain that can capture and roll back its full state
#[async_trait]
pub trait SnapshotChain: Send + Sync {
    /// Record the current state, returning the snapshot id
    async fn snapshot(&self) -> Result<U256, ChainError>;

    /// Roll back to the given snapshot.
    ///
    /// Returns `false` if the snapshot is unknown or was already consumed.
    async fn revert(&self, id: U256) -> Result<bool, ChainError>;
}

/// How long, and how often, to wait on a transaction receipt
#[derive(Clone, Copy, Debug)]
pub struct WaitOptions {
    /// The maximum time to wait, `None` to wait indefinitely
    pub timeout: Option<Duration>,
    /// The delay between receipt queries
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitOptions {
    /// Wait at most `timeout` on each transaction
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Block until the transaction is mined, returning its receipt.
///
/// Fails with `DeploymentTimeout` once `options.timeout` elapses and with
/// `Cancelled` as soon as `cancel` fires. The transaction itself stays in
/// flight in both cases.
pub async fn wait_for_receipt<C: ChainClient + ?Sized>(
    client: &C,
    tx_hash: TxHash,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<TxReceipt, ScriptError> {
    let bounded = async {
        match options.timeout {
            Some(timeout) => {
                tokio::time::timeout(timeout, poll_receipt(client, tx_hash, options.poll_interval))
                    .await
                    .unwrap_or(Err(ScriptError::DeploymentTimeout { tx_hash, timeout }))
            }
            None => poll_receipt(client, tx_hash, options.poll_interval).await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScriptError::Cancelled(tx_hash)),
        receipt = bounded => receipt,
    }
}

/// Query the receipt until it is available
async fn poll_receipt<C: ChainClient + ?Sized>(
    client: &C,
    tx_hash: TxHash,
    poll_interval: Duration,
) -> Result<TxReceipt, ScriptError> {
    loop {
        if let Some(receipt) = client.receipt(tx_hash).await? {
            return Ok(receipt);
        }

        debug!("Transaction {tx_hash:#x} pending, retrying in {poll_interval:?}");
        tokio::time::sleep(poll_interval).await;
    }
}

/// Interpret a storage word as an address, as stored by the EIP-1967 slots
pub fn address_from_word(word: U256) -> Address {
    Address::from_word(B256::from(word.to_be_bytes::<32>()))
}
