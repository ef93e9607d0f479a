use std::time::Duration;

use alloy::sol_types::SolCall;
use contracts_common::{
    constants::{DEFAULT_LOGIC_CONTRACT, PROXY_ADMIN_CONTRACT},
    solidity::IUpgradeableBeacon,
    types::{DeploymentDescriptor, ProxyKind},
};
use eyre::Result;
use scripts::{
    artifacts::Artifacts,
    chain::WaitOptions,
    deploy::Deployer,
    errors::{RevertReason, ScriptError},
};
use test_helpers::{
    fixtures::{test_artifacts, write_hardhat_artifacts, SHOP_INTERFACE},
    sim::SimulatedChain,
};
use tests::utils::{
    call_address, implementation_slot, owner_of, spawn_miner, TestContext, ALL_PROXY_KINDS,
    TEST_TIMEOUT,
};
use tokio_util::sync::CancellationToken;

alloy::sol! {
    function offchainSigner() external view returns (address);
}

#[tokio::test]
async fn test_implementation_slot_matches_deployment() -> Result<()> {
    for kind in ALL_PROXY_KINDS {
        let ctx = TestContext::new();
        let instance = ctx.deploy_shop(kind).await?;

        assert_eq!(instance.kind, kind);
        assert_eq!(
            ctx.chain.contract_at(instance.implementation).as_deref(),
            Some(DEFAULT_LOGIC_CONTRACT)
        );

        match kind {
            ProxyKind::Beacon => {
                let beacon = instance.admin.unwrap();
                let beacon_implementation = call_address(
                    &ctx.chain,
                    beacon,
                    IUpgradeableBeacon::implementationCall {}.abi_encode(),
                )
                .await?;
                assert_eq!(beacon_implementation, instance.implementation);
            }
            _ => {
                let slot = implementation_slot(&ctx.chain, instance.proxy).await?;
                assert_eq!(slot, instance.implementation);
            }
        }
    }

    Ok(())
}

#[tokio::test]
async fn test_upgrade_authority() -> Result<()> {
    let ctx = TestContext::new();
    let owner = ctx.owner.address();

    let uups = ctx.deploy_shop(ProxyKind::Uups).await?;
    assert_eq!(uups.owner, owner);
    assert_eq!(uups.admin, None);

    // The proxy admin is the first contract created by the proxy
    let transparent = ctx.deploy_shop(ProxyKind::Transparent).await?;
    let admin = transparent.admin.unwrap();
    assert_eq!(admin, transparent.proxy.create(1));
    assert_eq!(ctx.chain.contract_at(admin).as_deref(), Some(PROXY_ADMIN_CONTRACT));
    assert_eq!(owner_of(&ctx.chain, admin).await?, owner);
    assert_eq!(transparent.owner, owner);

    let beacon = ctx.deploy_shop(ProxyKind::Beacon).await?;
    assert_eq!(owner_of(&ctx.chain, beacon.admin.unwrap()).await?, owner);
    assert_eq!(beacon.owner, owner);

    Ok(())
}

#[tokio::test]
async fn test_offchain_signer_appended_to_initializer() -> Result<()> {
    for kind in ALL_PROXY_KINDS {
        let ctx = TestContext::new();
        let instance = ctx.deploy_shop(kind).await?;

        let signer =
            call_address(&ctx.chain, instance.proxy, offchainSignerCall {}.abi_encode()).await?;
        assert_eq!(signer, ctx.offchain_signer);

        // The owner is the first initializer argument
        assert_eq!(owner_of(&ctx.chain, instance.proxy).await?, ctx.owner.address());
    }

    Ok(())
}

#[tokio::test]
async fn test_second_initialization_fails() -> Result<()> {
    for kind in ALL_PROXY_KINDS {
        let ctx = TestContext::new();
        let instance = ctx.deploy_shop(kind).await?;

        let res = ctx
            .deployer
            .initialize(
                instance.proxy,
                &ctx.shop_descriptor(kind),
                &ctx.owner,
                ctx.offchain_signer,
            )
            .await;

        assert!(matches!(
            res,
            Err(ScriptError::DeploymentFailed(RevertReason::AlreadyInitialized))
        ));
    }

    Ok(())
}

#[tokio::test]
async fn test_mined_second_initialization_keeps_reason() -> Result<()> {
    let ctx = TestContext::new();
    let instance = ctx.deploy_shop(ProxyKind::Uups).await?;

    // The failing call is mined instead of being rejected on submission
    ctx.chain.set_automine(false);
    let miner = spawn_miner(&ctx.chain);

    let res = ctx
        .deployer
        .initialize(
            instance.proxy,
            &ctx.shop_descriptor(ProxyKind::Uups),
            &ctx.owner,
            ctx.offchain_signer,
        )
        .await;
    miner.abort();

    assert!(matches!(
        res,
        Err(ScriptError::DeploymentFailed(RevertReason::AlreadyInitialized))
    ));
    assert_eq!(ctx.chain.dump().failures.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_mined_failure_without_revert_data() -> Result<()> {
    // The chain does not know the creation code of `Unregistered`
    let chain = SimulatedChain::with_artifacts(&test_artifacts());
    let mut artifacts = test_artifacts();
    let mut unregistered = artifacts.resolve(DEFAULT_LOGIC_CONTRACT)?.clone();
    unregistered.name = "Unregistered".to_string();
    unregistered.bytecode = vec![0x60, 0x80, 0x60, 0x40, 0x52, 0xff].into();
    artifacts.insert(unregistered);

    let ctx = TestContext::new();
    let deployer = Deployer::new(chain.clone(), artifacts)
        .with_wait_options(WaitOptions::default().with_timeout(TEST_TIMEOUT));
    chain.set_automine(false);
    let miner = spawn_miner(&chain);

    let mut descriptor = ctx.shop_descriptor(ProxyKind::Uups);
    descriptor.contract_name = "Unregistered".to_string();
    let res = deployer.deploy(&descriptor, &ctx.owner, ctx.offchain_signer).await;
    miner.abort();

    // Creations cannot be replayed as calls, so only the hash is known
    assert!(matches!(
        res,
        Err(ScriptError::DeploymentFailed(RevertReason::TransactionFailed(_)))
    ));

    Ok(())
}

#[tokio::test]
async fn test_implementation_initializers_disabled() -> Result<()> {
    let ctx = TestContext::new();
    let instance = ctx.deploy_shop(ProxyKind::Uups).await?;

    let res = ctx
        .deployer
        .initialize(
            instance.implementation,
            &ctx.shop_descriptor(ProxyKind::Uups),
            &ctx.owner,
            ctx.offchain_signer,
        )
        .await;

    assert!(matches!(
        res,
        Err(ScriptError::DeploymentFailed(RevertReason::AlreadyInitialized))
    ));

    Ok(())
}

#[tokio::test]
async fn test_unknown_contract() -> Result<()> {
    let ctx = TestContext::new();
    let state_before = ctx.chain.dump();

    let descriptor = DeploymentDescriptor::new("Missing", vec![], ProxyKind::Uups);
    let res = ctx
        .deployer
        .deploy(&descriptor, &ctx.owner, ctx.offchain_signer)
        .await;

    assert!(matches!(res, Err(ScriptError::ContractNotFound(name)) if name == "Missing"));
    assert_eq!(ctx.chain.dump(), state_before);

    Ok(())
}

#[tokio::test]
async fn test_interface_not_deployable() -> Result<()> {
    let ctx = TestContext::new();
    let state_before = ctx.chain.dump();

    let mut descriptor = ctx.shop_descriptor(ProxyKind::Uups);
    descriptor.contract_name = SHOP_INTERFACE.to_string();
    let res = ctx
        .deployer
        .deploy(&descriptor, &ctx.owner, ctx.offchain_signer)
        .await;

    assert!(matches!(res, Err(ScriptError::ArtifactParsing(_))));
    assert_eq!(ctx.chain.dump(), state_before);

    Ok(())
}

#[tokio::test]
async fn test_deployment_timeout() -> Result<()> {
    let ctx = TestContext::new()
        .with_wait_options(WaitOptions::default().with_timeout(Duration::from_millis(50)));
    ctx.chain.set_automine(false);

    let res = ctx.deploy_shop(ProxyKind::Uups).await;
    let err = res.unwrap_err().downcast::<ScriptError>()?;
    assert!(matches!(err, ScriptError::DeploymentTimeout { .. }));

    Ok(())
}

#[tokio::test]
async fn test_cancelled_wait() -> Result<()> {
    let cancel = CancellationToken::new();
    let mut ctx = TestContext::new().with_wait_options(WaitOptions::default());
    ctx.deployer = ctx.deployer.with_cancellation(cancel.clone());
    ctx.chain.set_automine(false);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let res = ctx.deploy_shop(ProxyKind::Transparent).await;
    canceller.await?;

    let err = res.unwrap_err().downcast::<ScriptError>()?;
    assert!(matches!(err, ScriptError::Cancelled(_)));

    Ok(())
}

#[tokio::test]
async fn test_waits_for_mining() -> Result<()> {
    let ctx = TestContext::new();
    ctx.chain.set_automine(false);

    let miner = spawn_miner(&ctx.chain);

    let res = ctx.deploy_shop(ProxyKind::Beacon).await;
    miner.abort();

    let instance = res?;
    assert_eq!(
        ctx.chain.contract_at(instance.proxy).as_deref(),
        Some("BeaconProxy")
    );

    Ok(())
}

#[tokio::test]
async fn test_deploy_from_artifacts_dir() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_hardhat_artifacts(&test_artifacts(), dir.path())?;

    let ctx = TestContext::with_artifacts(Artifacts::load_dir(dir.path())?);
    let instance = ctx.deploy_shop(ProxyKind::Uups).await?;

    assert_eq!(
        implementation_slot(&ctx.chain, instance.proxy).await?,
        instance.implementation
    );

    Ok(())
}
