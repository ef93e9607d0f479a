//! Compilation artifacts of the contracts deployed in tests.
//!
//! Creation code is a stand-in that only the simulated chain understands, the
//! ABIs are those of the real contracts.

use std::{fs, io, path::Path};

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use contracts_common::constants::{
    BEACON_PROXY_CONTRACT, DEFAULT_LOGIC_CONTRACT, ERC1967_PROXY_CONTRACT, PROXY_ADMIN_CONTRACT,
    TRANSPARENT_PROXY_CONTRACT, UPGRADEABLE_BEACON_CONTRACT,
};
use scripts::artifacts::{Artifacts, ContractArtifact};
use serde_json::json;

/// The name of the second version of the shop contract
pub const SHOP_V2_CONTRACT: &str = "TherasShopV2";

/// The name of an interface, which has no creation code
pub const SHOP_INTERFACE: &str = "ITherasShop";

/// The functions & errors shared by both versions of the shop
const SHOP_ABI: &[&str] = &[
    "function initialize(address initialOwner, uint256 startingTokenId, address offchainSigner)",
    "function owner() view returns (address)",
    "function offchainSigner() view returns (address)",
    "function proxiableUUID() view returns (bytes32)",
    "function upgradeToAndCall(address newImplementation, bytes data) payable",
    "function mint(address to, uint256 amount, bytes signature)",
    "error InvalidInitialization()",
    "error OwnableUnauthorizedAccount(address account)",
    "error UUPSUnauthorizedCallContext()",
];

/// Build an artifact from human-readable ABI items
fn artifact(name: &str, abi: &[&str], code_tag: u8) -> ContractArtifact {
    let bytecode = if code_tag == 0 {
        Bytes::new()
    } else {
        Bytes::from(vec![0x60, 0x80, 0x60, 0x40, 0x52, code_tag])
    };

    ContractArtifact {
        name: name.to_string(),
        abi: JsonAbi::parse(abi.iter().copied()).unwrap(),
        bytecode,
    }
}

/// The artifacts of the shop, both its versions, and the proxy family
pub fn test_artifacts() -> Artifacts {
    let mut artifacts = Artifacts::new();

    artifacts.insert(artifact(DEFAULT_LOGIC_CONTRACT, SHOP_ABI, 1));
    let v2_abi = [SHOP_ABI, &["function version() pure returns (uint256)"]].concat();
    artifacts.insert(artifact(SHOP_V2_CONTRACT, &v2_abi, 2));
    artifacts.insert(artifact(SHOP_INTERFACE, &SHOP_ABI[..3], 0));

    artifacts.insert(artifact(
        ERC1967_PROXY_CONTRACT,
        &[
            "constructor(address implementation, bytes _data)",
            "error ERC1967InvalidImplementation(address implementation)",
        ],
        3,
    ));
    artifacts.insert(artifact(
        TRANSPARENT_PROXY_CONTRACT,
        &[
            "constructor(address _logic, address initialOwner, bytes _data)",
            "error ProxyDeniedAdminAccess()",
        ],
        4,
    ));
    artifacts.insert(artifact(
        PROXY_ADMIN_CONTRACT,
        &[
            "constructor(address initialOwner)",
            "function owner() view returns (address)",
            "function upgradeAndCall(address proxy, address implementation, bytes data) payable",
        ],
        5,
    ));
    artifacts.insert(artifact(
        UPGRADEABLE_BEACON_CONTRACT,
        &[
            "constructor(address implementation_, address initialOwner)",
            "function owner() view returns (address)",
            "function implementation() view returns (address)",
            "function upgradeTo(address newImplementation)",
        ],
        6,
    ));
    artifacts.insert(artifact(
        BEACON_PROXY_CONTRACT,
        &["constructor(address beacon, bytes data)"],
        7,
    ));

    artifacts
}

/// Write `artifacts` to `dir` in Hardhat's layout, one
/// `contracts/<Name>.sol/<Name>.json` file per contract
pub fn write_hardhat_artifacts(artifacts: &Artifacts, dir: &Path) -> io::Result<()> {
    for name in artifacts.names() {
        let Ok(artifact) = artifacts.resolve(name) else {
            continue;
        };

        let contract_dir = dir.join("contracts").join(format!("{name}.sol"));
        fs::create_dir_all(&contract_dir)?;

        let json = json!({
            "_format": "hh-sol-artifact-1",
            "contractName": name,
            "sourceName": format!("contracts/{name}.sol"),
            "abi": artifact.abi,
            "bytecode": artifact.bytecode,
            "deployedBytecode": "0x",
        });
        fs::write(contract_dir.join(format!("{name}.json")), json.to_string())?;
    }

    Ok(())
}
