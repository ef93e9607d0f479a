use contracts_common::types::{ProxyKind, SnapshotId};
use eyre::Result;
use scripts::{
    errors::ScriptError,
    snapshot::{ScopedSnapshots, SnapshotManager},
};
use tests::utils::TestContext;

#[tokio::test]
async fn test_restore_brings_back_state() -> Result<()> {
    let ctx = TestContext::new();
    let mut snapshots = SnapshotManager::new(ctx.chain.clone());

    let id = snapshots.capture().await?;
    let state_before = ctx.chain.dump();

    ctx.deploy_shop(ProxyKind::Uups).await?;
    assert_ne!(ctx.chain.dump(), state_before);

    snapshots.restore(id).await?;
    assert_eq!(ctx.chain.dump(), state_before);
    assert_eq!(snapshots.current(), None);

    Ok(())
}

#[tokio::test]
async fn test_snapshot_is_single_use() -> Result<()> {
    let ctx = TestContext::new();
    let mut snapshots = SnapshotManager::new(ctx.chain.clone());

    let id = snapshots.capture().await?;
    snapshots.restore(id).await?;

    let res = snapshots.restore(id).await;
    assert!(matches!(res, Err(ScriptError::InvalidSnapshot(invalid)) if invalid == id));

    Ok(())
}

#[tokio::test]
async fn test_restore_invalidates_later_snapshots() -> Result<()> {
    let ctx = TestContext::new();
    let mut snapshots = SnapshotManager::new(ctx.chain.clone());

    let earlier = snapshots.capture().await?;
    ctx.deploy_shop(ProxyKind::Beacon).await?;
    let later = snapshots.capture().await?;

    snapshots.restore(earlier).await?;

    let res = snapshots.restore(later).await;
    assert!(matches!(res, Err(ScriptError::InvalidSnapshot(invalid)) if invalid == later));

    Ok(())
}

#[tokio::test]
async fn test_capture_overwrites_tracked_snapshot() -> Result<()> {
    let ctx = TestContext::new();
    let mut snapshots = SnapshotManager::new(ctx.chain.clone());

    let first = snapshots.capture().await?;
    ctx.deploy_shop(ProxyKind::Uups).await?;
    let state_after_deploy = ctx.chain.dump();

    let second = snapshots.capture().await?;
    assert_ne!(first, second);
    assert_eq!(snapshots.current(), Some(second));

    ctx.deploy_shop(ProxyKind::Transparent).await?;
    snapshots.restore_current().await?;
    assert_eq!(ctx.chain.dump(), state_after_deploy);

    // The earlier handle is still live
    snapshots.restore(first).await?;

    Ok(())
}

#[tokio::test]
async fn test_restore_current_without_capture() -> Result<()> {
    let ctx = TestContext::new();
    let mut snapshots = SnapshotManager::new(ctx.chain.clone());

    let res = snapshots.restore_current().await;
    assert!(matches!(res, Err(ScriptError::InvalidSnapshot(_))));

    let res = snapshots.restore(SnapshotId::default()).await;
    assert!(matches!(res, Err(ScriptError::InvalidSnapshot(_))));

    Ok(())
}

#[tokio::test]
async fn test_scoped_snapshots() -> Result<()> {
    let ctx = TestContext::new();
    let mut snapshots = ScopedSnapshots::new(ctx.chain.clone());

    snapshots.capture_for("deploy").await?;
    let clean_state = ctx.chain.dump();

    ctx.deploy_shop(ProxyKind::Uups).await?;
    snapshots.capture_for("upgrade").await?;
    assert!(snapshots.handle(&"upgrade").is_some());

    // Rolling the first scenario back consumes the second's handle as well
    snapshots.restore_for(&"deploy").await?;
    assert_eq!(ctx.chain.dump(), clean_state);
    assert_eq!(snapshots.handle(&"deploy"), None);
    assert_eq!(snapshots.handle(&"upgrade"), None);

    let res = snapshots.restore_for(&"upgrade").await;
    assert!(matches!(res, Err(ScriptError::InvalidSnapshot(_))));

    Ok(())
}

#[tokio::test]
async fn test_redeploy_after_restore_is_deterministic() -> Result<()> {
    let ctx = TestContext::new();
    let mut snapshots = SnapshotManager::new(ctx.chain.clone());

    let id = snapshots.capture().await?;
    let first = ctx.deploy_shop(ProxyKind::Transparent).await?;

    snapshots.restore(id).await?;
    let second = ctx.deploy_shop(ProxyKind::Transparent).await?;

    assert_eq!(first, second);

    Ok(())
}
