use crate::models::{BranchDraft, BranchId, BranchPatch, BranchRecord, Level};
use crate::Result;

/// Remote branch storage, scoped to one authenticated user.
///
/// Every call is addressed by level so the backend is free to keep one
/// collection per level or a single collection keyed by level. Implementors
/// must be shareable across threads: the five level listings of an initial
/// load run concurrently.
pub trait BranchStore: Send + Sync {
    /// All records at `level`, newest first
    fn list(&self, level: Level) -> Result<Vec<BranchRecord>>;

    fn get(&self, level: Level, id: BranchId) -> Result<BranchRecord>;

    fn create(&self, level: Level, draft: &BranchDraft) -> Result<BranchRecord>;

    /// Apply the fields present in `patch`; absent fields stay unchanged
    fn update(&self, level: Level, id: BranchId, patch: &BranchPatch) -> Result<BranchRecord>;

    /// Fails with `NotFound` when `id` does not exist
    fn remove(&self, level: Level, id: BranchId) -> Result<()>;
}
