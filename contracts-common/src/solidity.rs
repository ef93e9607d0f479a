//! Solidity interfaces of the OpenZeppelin (v5) proxy family and of the
//! upgradeable logic contracts deployed behind them

#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    /// Access control of `Ownable` / `OwnableUpgradeable` contracts, including
    /// `ProxyAdmin` and `UpgradeableBeacon`
    interface IOwnable {
        function owner() external view returns (address);
    }

    /// The UUPS upgrade entry point, exposed by the logic contract and reached
    /// through the proxy
    interface IUUPSUpgradeable {
        function upgradeToAndCall(address newImplementation, bytes memory data) external payable;
        function proxiableUUID() external view returns (bytes32);
    }

    /// The admin contract spawned by a `TransparentUpgradeableProxy`
    interface IProxyAdmin {
        function upgradeAndCall(address proxy, address implementation, bytes memory data) external payable;
    }

    /// The beacon shared by a set of `BeaconProxy` instances
    interface IUpgradeableBeacon {
        function implementation() external view returns (address);
        function upgradeTo(address newImplementation) external;
    }

    /// Custom errors raised by the proxy family and the upgradeable base contracts
    #[sol(all_derives)]
    interface IUpgradeErrors {
        error InvalidInitialization();
        error NotInitializing();
        error OwnableUnauthorizedAccount(address account);
        error OwnableInvalidOwner(address owner);
        error ERC1967InvalidImplementation(address implementation);
        error ERC1967InvalidAdmin(address admin);
        error ERC1967InvalidBeacon(address beacon);
        error BeaconInvalidImplementation(address implementation);
        error ProxyDeniedAdminAccess();
        error UUPSUnauthorizedCallContext();
        error UUPSUnsupportedProxiableUUID(bytes32 slot);
    }
}
