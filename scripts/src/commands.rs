//! Implementations of the various deploy scripts

use std::{str::FromStr, time::Duration};

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};
use contracts_common::types::DeploymentDescriptor;
use itertools::Itertools;
use tracing::info;

use crate::{
    artifacts::Artifacts,
    chain::{rpc::RpcClient, WaitOptions},
    cli::{
        ConvertUnitsArgs, ConvertUsdArgs, DeployProxyArgs, ImplementationArgs, RevertArgs,
        ScriptContext, UpgradeArgs,
    },
    constants::ACCOUNT_KEY_ENV_VAR,
    conversion::{convert_to_usd, convert_units, parse_quantity},
    deploy::Deployer,
    errors::ScriptError,
    snapshot::SnapshotManager,
    utils::{
        implementation_key, parse_address, parse_signer, proxy_key, read_deployment,
        setup_client, write_deployment,
    },
};

/// Connect to the configured node and load the artifacts
async fn setup_deployer(
    context: &ScriptContext,
    timeout: Duration,
) -> Result<Deployer<RpcClient>, ScriptError> {
    let client = setup_client(&context.rpc_url, Some(context.chain_id)).await?;
    let artifacts = Artifacts::load_dir(&context.artifacts)?;

    let wait = WaitOptions::default().with_timeout(timeout);
    Ok(Deployer::new(client, artifacts).with_wait_options(wait))
}

/// The deployer's key, which only deployments and upgrades need
fn deployer_signer(context: &ScriptContext) -> Result<PrivateKeySigner, ScriptError> {
    let priv_key = context.priv_key.as_deref().ok_or_else(|| {
        ScriptError::ClientInitialization(format!(
            "no private key, pass --pkey or set {ACCOUNT_KEY_ENV_VAR}"
        ))
    })?;
    parse_signer(priv_key)
}

/// The proxy given on the command line, or the one recorded under
/// `deployed_as` in the deployments file
fn resolve_proxy(
    proxy: Option<&str>,
    deployed_as: &str,
    context: &ScriptContext,
) -> Result<Address, ScriptError> {
    match proxy {
        Some(proxy) => parse_address(proxy),
        None => read_deployment(&context.deployments_path, &proxy_key(deployed_as)),
    }
}

/// Deploy a logic contract behind a proxy and record both addresses
pub async fn deploy_proxy(
    args: DeployProxyArgs,
    context: &ScriptContext,
) -> Result<(), ScriptError> {
    let signer = deployer_signer(context)?;
    let offchain_signer = parse_address(&args.offchain_signer)?;
    let owner = match &args.owner {
        Some(owner) => parse_address(owner)?,
        None => signer.address(),
    };

    let init_args = std::iter::once(owner.to_string())
        .chain(args.init_args.iter().cloned())
        .collect_vec();
    let descriptor = DeploymentDescriptor::new(&args.contract, init_args, args.kind)
        .with_initializer(&args.initializer);

    let deployer = setup_deployer(context, Duration::from_secs(args.timeout)).await?;
    let instance = deployer.deploy(&descriptor, &signer, offchain_signer).await?;

    write_deployment(&context.deployments_path, &proxy_key(&args.contract), instance.proxy)?;
    write_deployment(
        &context.deployments_path,
        &implementation_key(&args.contract),
        instance.implementation,
    )?;

    Ok(())
}

/// Upgrade a proxy and record its new implementation
pub async fn upgrade(args: UpgradeArgs, context: &ScriptContext) -> Result<(), ScriptError> {
    let signer = deployer_signer(context)?;
    let proxy = resolve_proxy(args.proxy.as_deref(), &args.deployed_as, context)?;

    let deployer = setup_deployer(context, Duration::from_secs(args.timeout)).await?;
    let instance = deployer.upgrade(proxy, &args.contract, &signer).await?;

    write_deployment(
        &context.deployments_path,
        &implementation_key(&args.deployed_as),
        instance.implementation,
    )
}

/// Log the implementation & upgrade authority of a proxy
pub async fn implementation(
    args: ImplementationArgs,
    context: &ScriptContext,
) -> Result<(), ScriptError> {
    let proxy = resolve_proxy(args.proxy.as_deref(), &args.deployed_as, context)?;
    let client = setup_client(&context.rpc_url, Some(context.chain_id)).await?;

    // Inspection needs no artifacts
    let deployer = Deployer::new(client, Artifacts::new());
    let kind = deployer.detect_proxy_kind(proxy).await?;
    let implementation = deployer.resolve_implementation(proxy, kind).await?;
    let (owner, admin) = deployer.resolve_upgrade_authority(proxy, kind).await?;

    info!("{kind} proxy {proxy:#x} points at {implementation:#x}, upgradeable by {owner:#x}");
    if let Some(admin) = admin {
        info!("Upgrades go through {admin:#x}");
    }

    Ok(())
}

/// Snapshot a development node
pub async fn snapshot(context: &ScriptContext) -> Result<(), ScriptError> {
    let client = setup_client(&context.rpc_url, Some(context.chain_id)).await?;

    let id = SnapshotManager::new(client).capture().await?;
    info!("Captured snapshot {id}");

    Ok(())
}

/// Roll a development node back to a snapshot
pub async fn revert(args: RevertArgs, context: &ScriptContext) -> Result<(), ScriptError> {
    let client = setup_client(&context.rpc_url, Some(context.chain_id)).await?;

    SnapshotManager::new(client).restore(args.id).await?;
    info!("Restored snapshot {}", args.id);

    Ok(())
}

/// Log the USD value of a decimal amount
pub fn convert_usd_cmd(args: ConvertUsdArgs) -> Result<(), ScriptError> {
    info!("{}", usd_value(&args)?);
    Ok(())
}

/// Log a raw quantity in its display unit
pub fn convert_units_cmd(args: ConvertUnitsArgs) -> Result<(), ScriptError> {
    info!("{}", units_value(&args)?);
    Ok(())
}

/// Render the USD value of the amount given on the command line
fn usd_value(args: &ConvertUsdArgs) -> Result<String, ScriptError> {
    let quantity = parse_quantity(&args.amount)?;
    let rate = parse_raw(&args.rate)?;
    convert_to_usd(quantity, rate, args.decimals)
}

/// Render the raw quantity given on the command line
fn units_value(args: &ConvertUnitsArgs) -> Result<String, ScriptError> {
    convert_units(parse_raw(&args.raw_quantity)?)
}

/// Parse an integer given in smallest units
fn parse_raw(raw: &str) -> Result<U256, ScriptError> {
    U256::from_str(raw.trim()).map_err(|e| ScriptError::InvalidQuantity(format!("{raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    /// Parse a command line into its command
    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("shop-scripts").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_convert_usd_takes_decimal_amount() {
        let Command::ConvertUsd(args) = parse(&["convert-usd", "1.5", "4360160000000"]) else {
            panic!("expected convert-usd");
        };
        assert_eq!(usd_value(&args).unwrap(), "1.5 = 65402 USD");
    }

    #[test]
    fn test_convert_units_takes_raw_quantity() {
        let Command::ConvertUnits(args) = parse(&["convert-units", "1500000000000000000"]) else {
            panic!("expected convert-units");
        };
        assert_eq!(units_value(&args).unwrap(), "1.5 L-USD");

        // A decimal amount is not a raw quantity
        let Command::ConvertUnits(args) = parse(&["convert-units", "1.5"]) else {
            panic!("expected convert-units");
        };
        assert!(matches!(units_value(&args), Err(ScriptError::InvalidQuantity(_))));
    }
}
