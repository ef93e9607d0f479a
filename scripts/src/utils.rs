//! Utilities for the deploy scripts.

use std::{fs, path::Path, str::FromStr};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    chain::{rpc::RpcClient, ChainClient},
    constants::{DEPLOYMENTS_KEY, IMPLEMENTATION_KEY_SUFFIX, PROXY_KEY_SUFFIX},
    errors::ScriptError,
};

/// Connects to the node at `rpc_url`, checking that it serves the expected
/// chain, if any
pub async fn setup_client(
    rpc_url: &str,
    expected_chain_id: Option<u64>,
) -> Result<RpcClient, ScriptError> {
    let client = RpcClient::connect(rpc_url)?;

    let chain_id = client
        .chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    if let Some(expected) = expected_chain_id {
        if chain_id != expected {
            return Err(ScriptError::ClientInitialization(format!(
                "expected chain {expected}, {rpc_url} serves chain {chain_id}"
            )));
        }
    }

    info!("Connected to chain {chain_id}");
    Ok(client)
}

/// Parse the deployer's private key
pub fn parse_signer(priv_key: &str) -> Result<PrivateKeySigner, ScriptError> {
    PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(format!("invalid private key: {e}")))
}

/// Parse a hex address given on the command line
pub fn parse_address(address: &str) -> Result<Address, ScriptError> {
    Address::from_str(address).map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
}

/// The key of a contract's proxy in the deployments file
pub fn proxy_key(contract_name: &str) -> String {
    format!("{contract_name}{PROXY_KEY_SUFFIX}")
}

/// The key of a contract's implementation in the deployments file
pub fn implementation_key(contract_name: &str) -> String {
    format!("{contract_name}{IMPLEMENTATION_KEY_SUFFIX}")
}

/// Read the deployments file, treating a missing file as empty
fn read_deployments(file_path: &Path) -> Result<Value, ScriptError> {
    if !file_path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents =
        fs::read_to_string(file_path).map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;
    serde_json::from_str(&contents).map_err(|e| ScriptError::ReadDeployments(e.to_string()))
}

/// Read a deployed address from the deployments file
pub fn read_deployment(file_path: &Path, contract_key: &str) -> Result<Address, ScriptError> {
    let deployments = read_deployments(file_path)?;

    let address = deployments[DEPLOYMENTS_KEY][contract_key]
        .as_str()
        .ok_or_else(|| {
            ScriptError::ReadDeployments(format!(
                "no {contract_key} in {}",
                file_path.display()
            ))
        })?;

    Address::from_str(address).map_err(|e| ScriptError::ReadDeployments(e.to_string()))
}

/// Record a deployed address in the deployments file, creating the file if
/// it does not exist
pub fn write_deployment(
    file_path: &Path,
    contract_key: &str,
    address: Address,
) -> Result<(), ScriptError> {
    let mut deployments = read_deployments(file_path)?;

    let entries = deployments
        .as_object_mut()
        .ok_or_else(|| ScriptError::WriteDeployments("deployments file is not an object".into()))?
        .entry(DEPLOYMENTS_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    let entries = entries.as_object_mut().ok_or_else(|| {
        ScriptError::WriteDeployments(format!("`{DEPLOYMENTS_KEY}` is not an object"))
    })?;
    entries.insert(contract_key.to_string(), Value::String(format!("{address:#x}")));

    let contents = serde_json::to_string_pretty(&deployments)
        .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
    fs::write(file_path, contents).map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;

    debug!("Wrote {contract_key} = {address:#x} to {}", file_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployments_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.json");

        let proxy = Address::repeat_byte(0x01);
        let implementation = Address::repeat_byte(0x02);
        write_deployment(&path, &proxy_key("TherasShop"), proxy).unwrap();
        write_deployment(&path, &implementation_key("TherasShop"), implementation).unwrap();

        assert_eq!(read_deployment(&path, "TherasShopProxy").unwrap(), proxy);
        assert_eq!(
            read_deployment(&path, "TherasShopImplementation").unwrap(),
            implementation
        );

        // Overwriting keeps the other entries
        let upgraded = Address::repeat_byte(0x03);
        write_deployment(&path, "TherasShopImplementation", upgraded).unwrap();
        assert_eq!(read_deployment(&path, "TherasShopProxy").unwrap(), proxy);
        assert_eq!(read_deployment(&path, "TherasShopImplementation").unwrap(), upgraded);
    }

    #[test]
    fn test_missing_deployment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.json");

        let err = read_deployment(&path, "TherasShopProxy").unwrap_err();
        assert!(matches!(err, ScriptError::ReadDeployments(_)));
    }

    #[test]
    fn test_parse_signer() {
        let signer = parse_signer(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        assert_eq!(
            signer.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
        assert!(parse_signer("0x1234").is_err());
    }
}
