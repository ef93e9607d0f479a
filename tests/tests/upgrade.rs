use alloy::sol_types::SolCall;
use contracts_common::{
    constants::DEFAULT_LOGIC_CONTRACT,
    solidity::{IUUPSUpgradeable, IUpgradeableBeacon},
    types::{DeploymentDescriptor, ProxyKind},
};
use eyre::Result;
use scripts::errors::{RevertReason, ScriptError};
use test_helpers::{accounts::{alice, bob}, fixtures::SHOP_V2_CONTRACT};
use tests::utils::{
    call_address, implementation_slot, owner_of, send_raw, TestContext, ALL_PROXY_KINDS,
    STARTING_TOKEN_ID,
};

alloy::sol! {
    function offchainSigner() external view returns (address);
}

#[tokio::test]
async fn test_owner_upgrade() -> Result<()> {
    for kind in ALL_PROXY_KINDS {
        let ctx = TestContext::new();
        let deployed = ctx.deploy_shop(kind).await?;

        let upgraded = ctx.deployer.upgrade(deployed.proxy, SHOP_V2_CONTRACT, &ctx.owner).await?;

        assert_eq!(upgraded.proxy, deployed.proxy);
        assert_eq!(upgraded.kind, kind);
        assert_eq!(upgraded.admin, deployed.admin);
        assert_ne!(upgraded.implementation, deployed.implementation);
        assert_eq!(
            ctx.chain.contract_at(upgraded.implementation).as_deref(),
            Some(SHOP_V2_CONTRACT)
        );
        assert_eq!(
            ctx.deployer.resolve_implementation(deployed.proxy, kind).await?,
            upgraded.implementation
        );

        // Storage lives in the proxy and survives the upgrade
        assert_eq!(owner_of(&ctx.chain, deployed.proxy).await?, ctx.owner.address());
        let signer =
            call_address(&ctx.chain, deployed.proxy, offchainSignerCall {}.abi_encode()).await?;
        assert_eq!(signer, ctx.offchain_signer);
    }

    Ok(())
}

#[tokio::test]
async fn test_non_owner_upgrade_rejected() -> Result<()> {
    for kind in ALL_PROXY_KINDS {
        let ctx = TestContext::new();
        let deployed = ctx.deploy_shop(kind).await?;
        let state_before = ctx.chain.dump();

        let intruder = alice();
        let res = ctx.deployer.upgrade(deployed.proxy, SHOP_V2_CONTRACT, &intruder).await;

        match res {
            Err(ScriptError::UnauthorizedUpgrade { signer, owner }) => {
                assert_eq!(signer, intruder.address());
                assert_eq!(owner, ctx.owner.address());
            }
            other => panic!("expected an unauthorized upgrade, got {other:?}"),
        }

        // Nothing was deployed and the proxy is untouched
        assert_eq!(ctx.chain.dump(), state_before);
    }

    Ok(())
}

#[tokio::test]
async fn test_direct_upgrade_call_reverts() -> Result<()> {
    let ctx = TestContext::new();
    let intruder = alice();

    let uups = ctx.deploy_shop(ProxyKind::Uups).await?;
    let calldata = IUUPSUpgradeable::upgradeToAndCallCall {
        newImplementation: uups.implementation,
        data: Default::default(),
    }
    .abi_encode();
    let res = send_raw(&ctx.chain, &intruder, uups.proxy, calldata).await;
    assert!(matches!(
        res,
        Err(ScriptError::DeploymentFailed(RevertReason::Unauthorized(account)))
            if account == intruder.address()
    ));

    let beacon = ctx.deploy_shop(ProxyKind::Beacon).await?;
    let calldata = IUpgradeableBeacon::upgradeToCall {
        newImplementation: beacon.implementation,
    }
    .abi_encode();
    let res = send_raw(&ctx.chain, &intruder, beacon.admin.unwrap(), calldata).await;
    assert!(matches!(
        res,
        Err(ScriptError::DeploymentFailed(RevertReason::Unauthorized(account)))
            if account == intruder.address()
    ));

    assert_eq!(implementation_slot(&ctx.chain, uups.proxy).await?, uups.implementation);

    Ok(())
}

#[tokio::test]
async fn test_detect_proxy_kind() -> Result<()> {
    let ctx = TestContext::new();

    for kind in ALL_PROXY_KINDS {
        let deployed = ctx.deploy_shop(kind).await?;
        assert_eq!(ctx.deployer.detect_proxy_kind(deployed.proxy).await?, kind);
    }

    let res = ctx.deployer.detect_proxy_kind(alice().address()).await;
    assert!(matches!(res, Err(ScriptError::ContractInteraction(_))));

    Ok(())
}

#[tokio::test]
async fn test_upgrade_to_unknown_contract() -> Result<()> {
    let ctx = TestContext::new();
    let deployed = ctx.deploy_shop(ProxyKind::Transparent).await?;
    let state_before = ctx.chain.dump();

    let res = ctx.deployer.upgrade(deployed.proxy, "Missing", &ctx.owner).await;

    assert!(matches!(res, Err(ScriptError::ContractNotFound(name)) if name == "Missing"));
    assert_eq!(ctx.chain.dump(), state_before);

    Ok(())
}

#[tokio::test]
async fn test_repeated_upgrades() -> Result<()> {
    let ctx = TestContext::new();
    let deployed = ctx.deploy_shop(ProxyKind::Uups).await?;

    let first = ctx.deployer.upgrade(deployed.proxy, SHOP_V2_CONTRACT, &ctx.owner).await?;
    let second = ctx.deployer.upgrade(deployed.proxy, SHOP_V2_CONTRACT, &ctx.owner).await?;

    assert_ne!(first.implementation, second.implementation);
    assert_eq!(implementation_slot(&ctx.chain, deployed.proxy).await?, second.implementation);

    Ok(())
}

#[tokio::test]
async fn test_uups_upgrade_authority_is_logic_owner() -> Result<()> {
    let ctx = TestContext::new();
    let shop_owner = bob();

    // Deployed by the deployer, owned by someone else
    let descriptor = DeploymentDescriptor::new(
        DEFAULT_LOGIC_CONTRACT,
        vec![shop_owner.address().to_string(), STARTING_TOKEN_ID.to_string()],
        ProxyKind::Uups,
    );
    let deployed = ctx.deployer.deploy(&descriptor, &ctx.owner, ctx.offchain_signer).await?;
    assert_eq!(deployed.owner, shop_owner.address());

    let res = ctx.deployer.upgrade(deployed.proxy, SHOP_V2_CONTRACT, &ctx.owner).await;
    assert!(matches!(res, Err(ScriptError::UnauthorizedUpgrade { .. })));

    let upgraded = ctx.deployer.upgrade(deployed.proxy, SHOP_V2_CONTRACT, &shop_owner).await?;
    assert_eq!(
        ctx.chain.contract_at(upgraded.implementation).as_deref(),
        Some(SHOP_V2_CONTRACT)
    );

    Ok(())
}
