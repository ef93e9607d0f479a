//! An in-process chain understanding the OpenZeppelin proxy family, standing
//! in for a development node in tests

use std::{collections::BTreeMap, sync::Arc};

use alloy::{
    primitives::{keccak256, Address, Bytes, TxHash, TxKind, B256, U256},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use scripts::{
    artifacts::Artifacts,
    chain::{ChainClient, ChainError, SnapshotChain, TxReceipt},
};
use tracing::debug;

use self::{
    exec::Executor,
    state::{ChainState, PendingTx, Program},
};

pub mod exec;
pub mod state;

/// The chain id reported by the simulated chain, matching a local node
pub const SIMULATED_CHAIN_ID: u64 = 31337;

/// The gas charged for every transaction
const BASE_GAS: u64 = 21_000;

/// The gas charged per byte of calldata
const GAS_PER_INPUT_BYTE: u64 = 16;

/// The simulated chain.
///
/// Clones share the same underlying chain.
#[derive(Clone, Default)]
pub struct SimulatedChain {
    /// The chain, shared between clones
    inner: Arc<Mutex<Simulator>>,
}

/// The chain behind a [`SimulatedChain`]
#[derive(Default)]
struct Simulator {
    /// The live state
    state: ChainState,
    /// Captured states, keyed by snapshot id
    snapshots: BTreeMap<u64, ChainState>,
    /// The id of the previous snapshot
    last_snapshot: u64,
    /// Whether transactions are left pending until [`SimulatedChain::mine`]
    manual_mining: bool,
    /// The creation code of every deployable contract
    registry: Vec<(Bytes, Program)>,
}

impl SimulatedChain {
    /// An empty chain, mining a block per transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty chain that can deploy every contract in `artifacts`
    pub fn with_artifacts(artifacts: &Artifacts) -> Self {
        let chain = Self::new();
        chain.register_artifacts(artifacts);
        chain
    }

    /// Make the contracts in `artifacts` deployable
    pub fn register_artifacts(&self, artifacts: &Artifacts) {
        let mut sim = self.inner.lock();
        for name in artifacts.names() {
            if let Ok(artifact) = artifacts.resolve(name) {
                if artifact.is_deployable() {
                    let program = Program::for_contract(name, &artifact.abi);
                    sim.registry.push((artifact.bytecode.clone(), program));
                }
            }
        }
    }

    /// Leave transactions pending until [`SimulatedChain::mine`] is called,
    /// or mine each on submission
    pub fn set_automine(&self, automine: bool) {
        self.inner.lock().manual_mining = !automine;
    }

    /// Mine every pending transaction into a new block
    pub fn mine(&self) {
        let mut sim = self.inner.lock();
        let pending = std::mem::take(&mut sim.state.pending);
        if pending.is_empty() {
            return;
        }

        sim.state.block_number += 1;
        for tx in pending {
            let (state, registry) = sim.parts();
            let mut attempt = state.clone();
            let outcome = execute(&mut attempt, registry, &tx);

            match outcome {
                Ok(contract_address) => {
                    *state = attempt;
                    sim.record_receipt(&tx, true, contract_address);
                }
                Err(revert_data) => {
                    // A failed transaction still consumes its nonce
                    state.account_mut(tx.from).nonce += 1;
                    sim.state.failures.insert(tx.hash, revert_data);
                    sim.record_receipt(&tx, false, None);
                }
            }
        }
    }

    /// The number of the latest block
    pub fn block_number(&self) -> u64 {
        self.inner.lock().state.block_number
    }

    /// The name of the contract deployed at `address`, if any
    pub fn contract_at(&self, address: Address) -> Option<String> {
        self.inner
            .lock()
            .state
            .program(address)
            .map(|program| program.name().to_string())
    }

    /// The revert data of a mined transaction that failed
    pub fn revert_data(&self, tx_hash: TxHash) -> Option<Bytes> {
        self.inner.lock().state.failures.get(&tx_hash).cloned()
    }

    /// A copy of the full chain state, for comparing states
    pub fn dump(&self) -> ChainState {
        self.inner.lock().state.clone()
    }
}

impl Simulator {
    /// Borrow the live state and the registry at the same time
    fn parts(&mut self) -> (&mut ChainState, &[(Bytes, Program)]) {
        (&mut self.state, &self.registry)
    }

    /// Store the receipt of a transaction mined in the latest block
    fn record_receipt(&mut self, tx: &PendingTx, status: bool, contract_address: Option<Address>) {
        let receipt = TxReceipt {
            transaction_hash: tx.hash,
            block_number: self.state.block_number,
            from: tx.from,
            to: tx.to,
            contract_address,
            status,
            gas_used: BASE_GAS + GAS_PER_INPUT_BYTE * tx.input.len() as u64,
        };

        debug!("Mined {:#x} in block {}", tx.hash, receipt.block_number);
        self.state.receipts.insert(tx.hash, receipt);
    }
}

/// Run a transaction against `state`, bumping the sender's nonce and
/// returning the created contract, if any
fn execute(
    state: &mut ChainState,
    registry: &[(Bytes, Program)],
    tx: &PendingTx,
) -> Result<Option<Address>, Bytes> {
    let mut executor = Executor::new(state, registry);
    match tx.to {
        None => executor.create(tx.from, &tx.input).map(Some),
        Some(to) => {
            executor.call(to, tx.from, &tx.input)?;
            state.account_mut(tx.from).nonce += 1;
            Ok(None)
        }
    }
}

/// The hash identifying a transaction
fn tx_hash(from: Address, nonce: u64, to: Option<Address>, input: &[u8]) -> TxHash {
    let to = to.unwrap_or_default();
    keccak256([from.as_slice(), nonce.to_be_bytes().as_slice(), to.as_slice(), input].concat())
}

/// The calldata of a transaction request
fn input_of(tx: &TransactionRequest) -> Bytes {
    tx.input.input().cloned().unwrap_or_default()
}

#[async_trait]
impl ChainClient for SimulatedChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(SIMULATED_CHAIN_ID)
    }

    async fn submit(
        &self,
        signer: &PrivateKeySigner,
        tx: TransactionRequest,
    ) -> Result<TxHash, ChainError> {
        let mut sim = self.inner.lock();

        let from = signer.address();
        let to = match tx.to {
            Some(TxKind::Call(to)) => Some(to),
            Some(TxKind::Create) | None => None,
        };
        let input = input_of(&tx);

        let queued = sim.state.pending.iter().filter(|p| p.from == from).count() as u64;
        let nonce = sim.state.nonce(from) + queued;
        let pending = PendingTx {
            hash: tx_hash(from, nonce, to, &input),
            from,
            to,
            input,
        };
        let hash = pending.hash;

        if sim.manual_mining {
            debug!("Queued {hash:#x} from {from:#x}");
            sim.state.pending.push(pending);
            return Ok(hash);
        }

        // Like a node estimating gas, reject reverting transactions outright
        let (state, registry) = sim.parts();
        let mut attempt = state.clone();
        let contract_address =
            execute(&mut attempt, registry, &pending).map_err(ChainError::Reverted)?;
        *state = attempt;

        sim.state.block_number += 1;
        sim.record_receipt(&pending, true, contract_address);
        Ok(hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, ChainError> {
        Ok(self.inner.lock().state.receipts.get(&tx_hash).cloned())
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, ChainError> {
        let mut sim = self.inner.lock();
        let to = match tx.to {
            Some(TxKind::Call(to)) => to,
            _ => return Err(ChainError::Transport("calls need a target".to_string())),
        };
        let caller = tx.from.unwrap_or_default();
        let input = input_of(&tx);

        // Calls never persist their effects
        let (state, registry) = sim.parts();
        let mut scratch = state.clone();
        Executor::new(&mut scratch, registry)
            .call(to, caller, &input)
            .map_err(ChainError::Reverted)
    }

    async fn storage_at(&self, address: Address, slot: B256) -> Result<U256, ChainError> {
        Ok(self.inner.lock().state.load(address, slot))
    }
}

#[async_trait]
impl SnapshotChain for SimulatedChain {
    async fn snapshot(&self) -> Result<U256, ChainError> {
        let mut sim = self.inner.lock();
        sim.last_snapshot += 1;

        let id = sim.last_snapshot;
        let state = sim.state.clone();
        sim.snapshots.insert(id, state);

        Ok(U256::from(id))
    }

    async fn revert(&self, id: U256) -> Result<bool, ChainError> {
        let mut sim = self.inner.lock();
        let Ok(id) = u64::try_from(id) else {
            return Ok(false);
        };
        let Some(state) = sim.snapshots.remove(&id) else {
            return Ok(false);
        };

        // Reverting drops the snapshot and every later one
        sim.snapshots.retain(|&other, _| other < id);
        sim.state = state;
        Ok(true)
    }
}
