//! Capture & restore of full chain state around test scenarios

use std::{collections::HashMap, hash::Hash};

use contracts_common::types::SnapshotId;
use tracing::debug;

use crate::{chain::SnapshotChain, errors::ScriptError};

/// Tracks the most recently captured snapshot of a chain.
///
/// Capturing again overwrites the tracked handle. Restoring a snapshot
/// consumes it, along with every snapshot taken after it.
pub struct SnapshotManager<C> {
    /// The chain being snapshotted
    chain: C,
    /// The last captured handle, if it has not been consumed
    current: Option<SnapshotId>,
}

impl<C: SnapshotChain> SnapshotManager<C> {
    /// A manager over the given chain, tracking no snapshot
    pub fn new(chain: C) -> Self {
        Self {
            chain,
            current: None,
        }
    }

    /// The tracked snapshot handle
    pub fn current(&self) -> Option<SnapshotId> {
        self.current
    }

    /// The underlying chain
    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Record the current chain state
    pub async fn capture(&mut self) -> Result<SnapshotId, ScriptError> {
        let id = SnapshotId(self.chain.snapshot().await?);
        debug!("Captured snapshot {id}");

        self.current = Some(id);
        Ok(id)
    }

    /// Roll the chain back to the given snapshot, consuming it
    pub async fn restore(&mut self, id: SnapshotId) -> Result<(), ScriptError> {
        if !self.chain.revert(id.0).await? {
            return Err(ScriptError::InvalidSnapshot(id));
        }
        debug!("Restored snapshot {id}");

        // Every handle at or after `id` is gone
        if self.current.is_some_and(|current| current >= id) {
            self.current = None;
        }

        Ok(())
    }

    /// Roll the chain back to the tracked snapshot
    pub async fn restore_current(&mut self) -> Result<(), ScriptError> {
        let id = self
            .current
            .ok_or(ScriptError::InvalidSnapshot(SnapshotId::default()))?;
        self.restore(id).await
    }
}

/// Snapshot handles keyed by the scenario that captured them, so that
/// concurrent suites do not clobber each other's handle
pub struct ScopedSnapshots<K, C> {
    /// The chain being snapshotted
    chain: C,
    /// The live handle of each scenario
    handles: HashMap<K, SnapshotId>,
}

impl<K: Eq + Hash, C: SnapshotChain> ScopedSnapshots<K, C> {
    /// An empty set of handles over the given chain
    pub fn new(chain: C) -> Self {
        Self {
            chain,
            handles: HashMap::new(),
        }
    }

    /// The live handle of a scenario
    pub fn handle(&self, key: &K) -> Option<SnapshotId> {
        self.handles.get(key).copied()
    }

    /// Record the current chain state on behalf of `key`, replacing any
    /// previous handle of that scenario
    pub async fn capture_for(&mut self, key: K) -> Result<SnapshotId, ScriptError> {
        let id = SnapshotId(self.chain.snapshot().await?);
        self.handles.insert(key, id);
        Ok(id)
    }

    /// Roll the chain back to the handle captured by `key`, consuming it
    pub async fn restore_for(&mut self, key: &K) -> Result<(), ScriptError> {
        let id = self
            .handles
            .get(key)
            .copied()
            .ok_or(ScriptError::InvalidSnapshot(SnapshotId::default()))?;

        // A failed request leaves the handle live, the chain never saw it
        let reverted = self.chain.revert(id.0).await?;
        self.handles.remove(key);
        if !reverted {
            return Err(ScriptError::InvalidSnapshot(id));
        }

        // Later handles were consumed by the chain as well
        self.handles.retain(|_, handle| *handle < id);
        Ok(())
    }
}
