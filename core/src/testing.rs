//! Fixtures shared by the unit tests of this crate.

use crate::models::{BranchDraft, BranchId, BranchPatch, BranchRecord, Level};
use crate::storage::{BranchStore, Database, SqliteBranchStore};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

pub fn sqlite_store() -> (tempfile::TempDir, SqliteBranchStore) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("test.db"));
    let store = SqliteBranchStore::open(&db, "tester").unwrap();
    (dir, store)
}

pub fn level(n: u8) -> Level {
    Level::new(n).unwrap()
}

/// Wraps a store, counting calls and failing on demand
pub struct FlakyStore<S> {
    inner: S,
    offline: AtomicBool,
    failing_levels: AtomicU8,
    calls: AtomicUsize,
    writes: AtomicUsize,
}

impl<S: BranchStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
            failing_levels: AtomicU8::new(0),
            calls: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Every call fails while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Calls addressed to `level` fail until cleared
    pub fn fail_level(&self, level: Level) {
        self.failing_levels.fetch_or(1 << level.index(), Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of create and update calls issued
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, level: Level) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_levels.load(Ordering::SeqCst) & (1 << level.index()) != 0;
        if self.offline.load(Ordering::SeqCst) || failing {
            return Err(Error::Storage("network unreachable".to_string()));
        }
        Ok(())
    }
}

impl<S: BranchStore> BranchStore for FlakyStore<S> {
    fn list(&self, level: Level) -> Result<Vec<BranchRecord>> {
        self.check(level)?;
        self.inner.list(level)
    }

    fn get(&self, level: Level, id: BranchId) -> Result<BranchRecord> {
        self.check(level)?;
        self.inner.get(level, id)
    }

    fn create(&self, level: Level, draft: &BranchDraft) -> Result<BranchRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check(level)?;
        self.inner.create(level, draft)
    }

    fn update(&self, level: Level, id: BranchId, patch: &BranchPatch) -> Result<BranchRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check(level)?;
        self.inner.update(level, id, patch)
    }

    fn remove(&self, level: Level, id: BranchId) -> Result<()> {
        self.check(level)?;
        self.inner.remove(level, id)
    }
}
