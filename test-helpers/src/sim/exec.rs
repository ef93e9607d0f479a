//! Execution of calls & contract creations against the simulated state.
//!
//! Proxies, admins and beacons follow OpenZeppelin v5 semantics, including
//! their custom errors. Reverts carry the ABI-encoded error as returned by a
//! node.

use alloy::{
    dyn_abi::JsonAbiExt,
    json_abi::Function,
    primitives::{Address, Bytes, B256, U256},
    sol_types::{SolCall, SolError, SolValue},
};
use contracts_common::{
    constants::{
        BEACON_STORAGE_SLOT, IMPLEMENTATION_STORAGE_SLOT, INITIALIZABLE_STORAGE_SLOT,
        OWNABLE_STORAGE_SLOT, PROXY_ADMIN_STORAGE_SLOT,
    },
    solidity::{IOwnable, IProxyAdmin, IUUPSUpgradeable, IUpgradeErrors, IUpgradeableBeacon},
};

use super::state::{Account, ChainState, LogicProgram, Program};

/// The revert data of a failed execution
pub type Revert = Bytes;

/// The slot holding the owner of a `ProxyAdmin` or `UpgradeableBeacon`
const ADMIN_OWNER_SLOT: B256 = B256::ZERO;

/// The slot holding the implementation of an `UpgradeableBeacon`
const BEACON_IMPLEMENTATION_SLOT: B256 = B256::with_last_byte(1);

/// The slot in which a logic contract keeps its trusted offchain signer
pub const TRUSTED_SIGNER_SLOT: B256 = B256::ZERO;

/// The value `_disableInitializers` writes to the `Initializable` slot
const INITIALIZERS_DISABLED: u64 = u64::MAX;

/// Encode a custom error as revert data
fn revert_with(error: impl SolError) -> Revert {
    error.abi_encode().into()
}

/// A revert without data
fn bare_revert() -> Revert {
    Bytes::new()
}

/// The first four bytes of the calldata
fn selector(input: &[u8]) -> Result<[u8; 4], Revert> {
    input
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(bare_revert)
}

/// Runs transactions against a chain state
pub struct Executor<'a> {
    /// The state being mutated
    state: &'a mut ChainState,
    /// The creation code of every known contract
    registry: &'a [(Bytes, Program)],
}

impl<'a> Executor<'a> {
    /// An executor mutating `state`
    pub fn new(state: &'a mut ChainState, registry: &'a [(Bytes, Program)]) -> Self {
        Self { state, registry }
    }

    // ------------
    // | CREATION |
    // ------------

    /// Deploy the contract whose creation code prefixes `input`, the rest of
    /// `input` being its constructor arguments
    pub fn create(&mut self, creator: Address, input: &[u8]) -> Result<Address, Revert> {
        let (code_len, program) = self
            .registry
            .iter()
            .filter(|(code, _)| input.starts_with(code))
            .max_by_key(|(code, _)| code.len())
            .map(|(code, program)| (code.len(), program.clone()))
            .ok_or_else(bare_revert)?;

        self.instantiate(creator, program, &input[code_len..])
    }

    /// Install `program` at the next address of `creator` and run its
    /// constructor
    fn instantiate(
        &mut self,
        creator: Address,
        program: Program,
        args: &[u8],
    ) -> Result<Address, Revert> {
        let creator_account = self.state.account_mut(creator);
        let address = creator.create(creator_account.nonce);
        creator_account.nonce += 1;

        self.state.accounts.insert(
            address,
            Account {
                nonce: 1,
                program: Some(program.clone()),
                ..Default::default()
            },
        );

        self.construct(address, creator, &program, args)?;
        Ok(address)
    }

    /// Run the constructor of the program at `address`
    fn construct(
        &mut self,
        address: Address,
        deployer: Address,
        program: &Program,
        args: &[u8],
    ) -> Result<(), Revert> {
        match program {
            Program::Erc1967Proxy => {
                let (implementation, data) =
                    <(Address, Bytes)>::abi_decode_params(args).map_err(|_| bare_revert())?;
                self.upgrade_to_and_call(address, deployer, implementation, &data)
            }
            Program::TransparentProxy => {
                let (logic, initial_owner, data) =
                    <(Address, Address, Bytes)>::abi_decode_params(args)
                        .map_err(|_| bare_revert())?;

                let admin_args = (initial_owner,).abi_encode_params();
                let admin = self.instantiate(address, Program::ProxyAdmin, &admin_args)?;
                self.state.store_address(address, PROXY_ADMIN_STORAGE_SLOT, admin);

                self.upgrade_to_and_call(address, deployer, logic, &data)
            }
            Program::ProxyAdmin => {
                let (initial_owner,) =
                    <(Address,)>::abi_decode_params(args).map_err(|_| bare_revert())?;
                self.transfer_ownership(address, ADMIN_OWNER_SLOT, initial_owner)
            }
            Program::UpgradeableBeacon => {
                let (implementation, initial_owner) =
                    <(Address, Address)>::abi_decode_params(args).map_err(|_| bare_revert())?;
                self.transfer_ownership(address, ADMIN_OWNER_SLOT, initial_owner)?;
                self.set_beacon_implementation(address, implementation)
            }
            Program::BeaconProxy => {
                let (beacon, data) =
                    <(Address, Bytes)>::abi_decode_params(args).map_err(|_| bare_revert())?;
                if self.state.program(beacon) != Some(&Program::UpgradeableBeacon) {
                    return Err(revert_with(IUpgradeErrors::ERC1967InvalidBeacon { beacon }));
                }

                let implementation =
                    self.state.load_address(beacon, BEACON_IMPLEMENTATION_SLOT);
                if self.state.program(implementation).is_none() {
                    return Err(revert_with(IUpgradeErrors::ERC1967InvalidImplementation {
                        implementation,
                    }));
                }

                self.state.store_address(address, BEACON_STORAGE_SLOT, beacon);
                if !data.is_empty() {
                    self.delegate(address, implementation, deployer, &data)?;
                }
                Ok(())
            }
            Program::Logic(_) => {
                self.state.store(
                    address,
                    INITIALIZABLE_STORAGE_SLOT,
                    U256::from(INITIALIZERS_DISABLED),
                );
                Ok(())
            }
        }
    }

    // -----------
    // | CALLING |
    // -----------

    /// Call the contract at `to`
    pub fn call(&mut self, to: Address, caller: Address, input: &[u8]) -> Result<Bytes, Revert> {
        let Some(program) = self.state.program(to).cloned() else {
            // Calls to externally owned accounts always succeed
            return Ok(Bytes::new());
        };

        match program {
            Program::Erc1967Proxy => {
                let implementation = self.state.load_address(to, IMPLEMENTATION_STORAGE_SLOT);
                self.delegate(to, implementation, caller, input)
            }
            Program::TransparentProxy => {
                let admin = self.state.load_address(to, PROXY_ADMIN_STORAGE_SLOT);
                if caller != admin {
                    let implementation =
                        self.state.load_address(to, IMPLEMENTATION_STORAGE_SLOT);
                    return self.delegate(to, implementation, caller, input);
                }

                if selector(input)? != IUUPSUpgradeable::upgradeToAndCallCall::SELECTOR {
                    return Err(revert_with(IUpgradeErrors::ProxyDeniedAdminAccess {}));
                }
                let call = IUUPSUpgradeable::upgradeToAndCallCall::abi_decode(input)
                    .map_err(|_| bare_revert())?;
                self.upgrade_to_and_call(to, caller, call.newImplementation, &call.data)?;
                Ok(Bytes::new())
            }
            Program::BeaconProxy => {
                let beacon = self.state.load_address(to, BEACON_STORAGE_SLOT);
                let implementation = self.state.load_address(beacon, BEACON_IMPLEMENTATION_SLOT);
                self.delegate(to, implementation, caller, input)
            }
            Program::ProxyAdmin => self.call_proxy_admin(to, caller, input),
            Program::UpgradeableBeacon => self.call_beacon(to, caller, input),
            Program::Logic(logic) => self.call_logic(&logic, to, to, caller, input),
        }
    }

    /// Run the code at `code` against the storage of `storage`, as a
    /// `delegatecall` does
    fn delegate(
        &mut self,
        storage: Address,
        code: Address,
        caller: Address,
        input: &[u8],
    ) -> Result<Bytes, Revert> {
        match self.state.program(code).cloned() {
            Some(Program::Logic(logic)) => self.call_logic(&logic, storage, code, caller, input),
            // Only logic contracts are ever installed behind a proxy
            _ => Ok(Bytes::new()),
        }
    }

    /// Dispatch a call to a `ProxyAdmin`
    fn call_proxy_admin(
        &mut self,
        admin: Address,
        caller: Address,
        input: &[u8],
    ) -> Result<Bytes, Revert> {
        let selector = selector(input)?;
        if selector == IOwnable::ownerCall::SELECTOR {
            return Ok(self.state.load_address(admin, ADMIN_OWNER_SLOT).abi_encode().into());
        }
        if selector != IProxyAdmin::upgradeAndCallCall::SELECTOR {
            return Err(bare_revert());
        }

        self.only_owner(admin, ADMIN_OWNER_SLOT, caller)?;
        let call = IProxyAdmin::upgradeAndCallCall::abi_decode(input).map_err(|_| bare_revert())?;
        let upgrade = IUUPSUpgradeable::upgradeToAndCallCall {
            newImplementation: call.implementation,
            data: call.data,
        }
        .abi_encode();

        self.call(call.proxy, admin, &upgrade)?;
        Ok(Bytes::new())
    }

    /// Dispatch a call to an `UpgradeableBeacon`
    fn call_beacon(
        &mut self,
        beacon: Address,
        caller: Address,
        input: &[u8],
    ) -> Result<Bytes, Revert> {
        let selector = selector(input)?;
        if selector == IOwnable::ownerCall::SELECTOR {
            return Ok(self.state.load_address(beacon, ADMIN_OWNER_SLOT).abi_encode().into());
        }
        if selector == IUpgradeableBeacon::implementationCall::SELECTOR {
            let implementation = self.state.load_address(beacon, BEACON_IMPLEMENTATION_SLOT);
            return Ok(implementation.abi_encode().into());
        }
        if selector != IUpgradeableBeacon::upgradeToCall::SELECTOR {
            return Err(bare_revert());
        }

        self.only_owner(beacon, ADMIN_OWNER_SLOT, caller)?;
        let call =
            IUpgradeableBeacon::upgradeToCall::abi_decode(input).map_err(|_| bare_revert())?;
        self.set_beacon_implementation(beacon, call.newImplementation)?;
        Ok(Bytes::new())
    }

    /// Dispatch a call to a logic contract running against the storage of
    /// `storage`, which differs from `code` when called through a proxy
    fn call_logic(
        &mut self,
        logic: &LogicProgram,
        storage: Address,
        code: Address,
        caller: Address,
        input: &[u8],
    ) -> Result<Bytes, Revert> {
        let selector = selector(input)?;
        let function = logic
            .abi
            .functions()
            .find(|f| f.selector().0 == selector)
            .ok_or_else(bare_revert)?;

        match function.name.as_str() {
            "owner" => {
                Ok(self.state.load_address(storage, OWNABLE_STORAGE_SLOT).abi_encode().into())
            }
            "offchainSigner" => {
                Ok(self.state.load_address(storage, TRUSTED_SIGNER_SLOT).abi_encode().into())
            }
            "proxiableUUID" => {
                if storage == code {
                    return Err(revert_with(IUpgradeErrors::UUPSUnauthorizedCallContext {}));
                }
                Ok(IMPLEMENTATION_STORAGE_SLOT.abi_encode().into())
            }
            "upgradeToAndCall" => {
                if storage == code {
                    return Err(revert_with(IUpgradeErrors::UUPSUnauthorizedCallContext {}));
                }
                self.only_owner(storage, OWNABLE_STORAGE_SLOT, caller)?;

                let call = IUUPSUpgradeable::upgradeToAndCallCall::abi_decode(input)
                    .map_err(|_| bare_revert())?;
                // The new implementation must itself be UUPS-compliant
                if !matches!(
                    self.state.program(call.newImplementation),
                    Some(Program::Logic(_))
                ) {
                    return Err(revert_with(IUpgradeErrors::ERC1967InvalidImplementation {
                        implementation: call.newImplementation,
                    }));
                }

                self.upgrade_to_and_call(storage, caller, call.newImplementation, &call.data)?;
                Ok(Bytes::new())
            }
            name if name.starts_with("initialize") => {
                self.initialize(function, storage, caller, input)?;
                Ok(Bytes::new())
            }
            _ => Ok(Bytes::new()),
        }
    }

    /// Run an `initializer`: records the owner, the first address argument,
    /// and the trusted signer, the last address argument
    fn initialize(
        &mut self,
        function: &Function,
        storage: Address,
        caller: Address,
        input: &[u8],
    ) -> Result<(), Revert> {
        if !self.state.load(storage, INITIALIZABLE_STORAGE_SLOT).is_zero() {
            return Err(revert_with(IUpgradeErrors::InvalidInitialization {}));
        }

        let args = function.abi_decode_input(&input[4..]).map_err(|_| bare_revert())?;
        let addresses: Vec<Address> = args.iter().filter_map(|arg| arg.as_address()).collect();

        let owner = addresses.first().copied().unwrap_or(caller);
        self.transfer_ownership(storage, OWNABLE_STORAGE_SLOT, owner)?;
        if let Some(signer) = addresses.last() {
            self.state.store_address(storage, TRUSTED_SIGNER_SLOT, *signer);
        }

        self.state.store(storage, INITIALIZABLE_STORAGE_SLOT, U256::from(1));
        Ok(())
    }

    // -----------
    // | HELPERS |
    // -----------

    /// Point a proxy at a new implementation, then call it with `data` if
    /// non-empty
    fn upgrade_to_and_call(
        &mut self,
        proxy: Address,
        caller: Address,
        implementation: Address,
        data: &[u8],
    ) -> Result<(), Revert> {
        if self.state.program(implementation).is_none() {
            return Err(revert_with(IUpgradeErrors::ERC1967InvalidImplementation {
                implementation,
            }));
        }

        self.state.store_address(proxy, IMPLEMENTATION_STORAGE_SLOT, implementation);
        if !data.is_empty() {
            self.delegate(proxy, implementation, caller, data)?;
        }
        Ok(())
    }

    /// Point a beacon at a new implementation
    fn set_beacon_implementation(
        &mut self,
        beacon: Address,
        implementation: Address,
    ) -> Result<(), Revert> {
        if self.state.program(implementation).is_none() {
            return Err(revert_with(IUpgradeErrors::BeaconInvalidImplementation {
                implementation,
            }));
        }

        self.state.store_address(beacon, BEACON_IMPLEMENTATION_SLOT, implementation);
        Ok(())
    }

    /// Set the owner kept in `slot`, rejecting the zero address
    fn transfer_ownership(
        &mut self,
        address: Address,
        slot: B256,
        owner: Address,
    ) -> Result<(), Revert> {
        if owner.is_zero() {
            return Err(revert_with(IUpgradeErrors::OwnableInvalidOwner { owner }));
        }

        self.state.store_address(address, slot, owner);
        Ok(())
    }

    /// Reject callers other than the owner kept in `slot`
    fn only_owner(&self, address: Address, slot: B256, caller: Address) -> Result<(), Revert> {
        if self.state.load_address(address, slot) != caller {
            return Err(revert_with(IUpgradeErrors::OwnableUnauthorizedAccount {
                account: caller,
            }));
        }
        Ok(())
    }
}
