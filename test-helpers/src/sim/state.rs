//! The world state of the simulated chain

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, Bytes, TxHash, B256, U256},
};
use scripts::chain::{address_from_word, TxReceipt};

/// The behavior installed at a contract address
#[derive(Clone, Debug, PartialEq)]
pub enum Program {
    /// An `ERC1967Proxy`
    Erc1967Proxy,
    /// A `TransparentUpgradeableProxy`
    TransparentProxy,
    /// The `ProxyAdmin` of a transparent proxy
    ProxyAdmin,
    /// An `UpgradeableBeacon`
    UpgradeableBeacon,
    /// A `BeaconProxy`
    BeaconProxy,
    /// An upgradeable logic contract
    Logic(Arc<LogicProgram>),
}

impl Program {
    /// The program installed by the artifact of the given name
    pub fn for_contract(name: &str, abi: &JsonAbi) -> Self {
        match name {
            "ERC1967Proxy" => Program::Erc1967Proxy,
            "TransparentUpgradeableProxy" => Program::TransparentProxy,
            "ProxyAdmin" => Program::ProxyAdmin,
            "UpgradeableBeacon" => Program::UpgradeableBeacon,
            "BeaconProxy" => Program::BeaconProxy,
            _ => Program::Logic(Arc::new(LogicProgram {
                name: name.to_string(),
                abi: abi.clone(),
            })),
        }
    }

    /// A short name for the program, for logging
    pub fn name(&self) -> &str {
        match self {
            Program::Erc1967Proxy => "ERC1967Proxy",
            Program::TransparentProxy => "TransparentUpgradeableProxy",
            Program::ProxyAdmin => "ProxyAdmin",
            Program::UpgradeableBeacon => "UpgradeableBeacon",
            Program::BeaconProxy => "BeaconProxy",
            Program::Logic(logic) => &logic.name,
        }
    }
}

/// An `Initializable`, `Ownable`, UUPS logic contract.
///
/// Calls are dispatched on the selectors of its ABI; functions outside of
/// initialization, ownership & upgrades succeed without effect.
#[derive(Debug, PartialEq)]
pub struct LogicProgram {
    /// The contract name
    pub name: String,
    /// The contract ABI
    pub abi: JsonAbi,
}

/// A single account
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Account {
    /// The account nonce
    pub nonce: u64,
    /// The installed program, `None` for externally owned accounts
    pub program: Option<Program>,
    /// The account storage, zero slots omitted
    pub storage: BTreeMap<U256, U256>,
}

/// A transaction submitted while automining is disabled
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTx {
    /// The transaction hash
    pub hash: TxHash,
    /// The sender
    pub from: Address,
    /// The callee, `None` for contract creations
    pub to: Option<Address>,
    /// The calldata or creation code
    pub input: Bytes,
}

/// Everything a snapshot captures
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChainState {
    /// Every account touched so far
    pub accounts: BTreeMap<Address, Account>,
    /// The receipts of mined transactions
    pub receipts: HashMap<TxHash, TxReceipt>,
    /// The revert data of mined transactions that failed
    pub failures: HashMap<TxHash, Bytes>,
    /// Transactions awaiting the next block
    pub pending: Vec<PendingTx>,
    /// The number of the latest block
    pub block_number: u64,
}

impl ChainState {
    /// The account at the given address, created empty if absent
    pub fn account_mut(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }

    /// The program at the given address
    pub fn program(&self, address: Address) -> Option<&Program> {
        self.accounts.get(&address).and_then(|account| account.program.as_ref())
    }

    /// The nonce of the given address
    pub fn nonce(&self, address: Address) -> u64 {
        self.accounts.get(&address).map(|account| account.nonce).unwrap_or_default()
    }

    /// Read a storage slot
    pub fn load(&self, address: Address, slot: B256) -> U256 {
        self.accounts
            .get(&address)
            .and_then(|account| account.storage.get(&slot_key(slot)))
            .copied()
            .unwrap_or_default()
    }

    /// Read a storage slot holding an address
    pub fn load_address(&self, address: Address, slot: B256) -> Address {
        address_from_word(self.load(address, slot))
    }

    /// Write a storage slot
    pub fn store(&mut self, address: Address, slot: B256, value: U256) {
        let storage = &mut self.account_mut(address).storage;
        if value.is_zero() {
            storage.remove(&slot_key(slot));
        } else {
            storage.insert(slot_key(slot), value);
        }
    }

    /// Write a storage slot holding an address
    pub fn store_address(&mut self, address: Address, slot: B256, value: Address) {
        self.store(address, slot, U256::from_be_bytes(value.into_word().0));
    }
}

/// The storage key of a slot
fn slot_key(slot: B256) -> U256 {
    U256::from_be_bytes(slot.0)
}
