//! Constants describing proxy storage layouts, contract names, and unit
//! conventions shared across the project

use alloy_primitives::{b256, B256};

// ------------------
// | Storage Layout |
// ------------------

/// The storage slot containing the implementation address of an upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const IMPLEMENTATION_STORAGE_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: B256 =
    b256!("b53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103");

/// The storage slot containing the beacon address of a beacon proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#beacon-contract-address
pub const BEACON_STORAGE_SLOT: B256 =
    b256!("a3f0ad74e5423aebfd80d3ef4346578335a9a72aeaee59ff6cb3582b35133d50");

/// The ERC-7201 namespaced slot of OpenZeppelin's `Initializable` storage (v5)
pub const INITIALIZABLE_STORAGE_SLOT: B256 =
    b256!("f0c57e16840df040f15088dc2f81fe391c3923bec73e23a9662efc9c229c6a00");

/// The ERC-7201 namespaced slot of OpenZeppelin's `OwnableUpgradeable` storage (v5)
pub const OWNABLE_STORAGE_SLOT: B256 =
    b256!("9016d09d72d40fdae2fd8ceac6b6234c7706214fd39c1cd1e609a0528c199300");

// ------------------
// | Contract Names |
// ------------------

/// The artifact name of the logic contract deployed by default
pub const DEFAULT_LOGIC_CONTRACT: &str = "TherasShop";

/// The name of the initializer invoked through the proxy by default
pub const DEFAULT_INITIALIZER: &str = "initialize";

/// The artifact name of the ERC1967 proxy used for UUPS deployments
pub const ERC1967_PROXY_CONTRACT: &str = "ERC1967Proxy";

/// The artifact name of the transparent upgradeable proxy
///
/// Compiled from https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/transparent/TransparentUpgradeableProxy.sol
pub const TRANSPARENT_PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";

/// The artifact name of the `ProxyAdmin` contract spawned by a transparent proxy
pub const PROXY_ADMIN_CONTRACT: &str = "ProxyAdmin";

/// The artifact name of the upgradeable beacon
pub const UPGRADEABLE_BEACON_CONTRACT: &str = "UpgradeableBeacon";

/// The artifact name of the beacon proxy
pub const BEACON_PROXY_CONTRACT: &str = "BeaconProxy";

// ---------
// | Units |
// ---------

/// The number of decimals of an on-chain fixed-point quantity
pub const QUANTITY_DECIMALS: u8 = 18;

/// The unit label appended to rendered quantities
pub const UNIT_LABEL: &str = "L-USD";

/// The number of decimals of the price feed quotes
pub const PRICE_DECIMALS: u8 = 8;

/// The reference WETH price, in price feed units (2219 USD)
pub const WETH_VALUE: u128 = 221_911_200_000;

/// The reference BTC price, in price feed units (43601 USD)
pub const BTC_VALUE: u128 = 4_360_160_000_000;
