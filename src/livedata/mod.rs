//! Live-data snapshot collaborator boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::value::ValueRequirement;

/// Provides point-in-time snapshots of live market data. Used by delta
/// calculator callers to obtain the two cache generations it compares.
pub trait LiveDataSnapshotProvider: Send + Sync {
    /// Captures the current values, returning the snapshot timestamp.
    fn snapshot(&self) -> u64;

    /// Queries a previously captured snapshot.
    fn query_snapshot(
        &self,
        timestamp: u64,
        requirement: &ValueRequirement,
    ) -> Option<serde_json::Value>;
}

#[derive(Default)]
struct Inner {
    current: HashMap<ValueRequirement, serde_json::Value>,
    snapshots: HashMap<u64, HashMap<ValueRequirement, serde_json::Value>>,
}

/// In-process snapshot provider fed by explicit `put` calls. Snapshot
/// timestamps are a monotonic counter rather than wall-clock time so that
/// two snapshots taken in the same millisecond stay distinct.
#[derive(Default)]
pub struct InMemoryLiveDataSnapshotProvider {
    inner: RwLock<Inner>,
    next_timestamp: AtomicU64,
}

impl InMemoryLiveDataSnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, requirement: ValueRequirement, value: serde_json::Value) {
        self.inner
            .write()
            .expect("snapshot lock poisoned")
            .current
            .insert(requirement, value);
    }
}

impl LiveDataSnapshotProvider for InMemoryLiveDataSnapshotProvider {
    fn snapshot(&self) -> u64 {
        let timestamp = self.next_timestamp.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write().expect("snapshot lock poisoned");
        let frozen = inner.current.clone();
        inner.snapshots.insert(timestamp, frozen);
        timestamp
    }

    fn query_snapshot(
        &self,
        timestamp: u64,
        requirement: &ValueRequirement,
    ) -> Option<serde_json::Value> {
        self.inner
            .read()
            .expect("snapshot lock poisoned")
            .snapshots
            .get(&timestamp)?
            .get(requirement)
            .cloned()
    }
}
