use super::BranchStore;
use crate::models::{Branch, BranchDraft, BranchId, BranchPatch, Level};
use crate::Result;
use tracing::debug;

/// Level-addressed access to a [`BranchStore`] that hands back in-memory
/// [`Branch`] values with their transient flags cleared.
#[derive(Clone, Copy)]
pub struct BranchRepository<'a> {
    store: &'a dyn BranchStore,
}

impl<'a> BranchRepository<'a> {
    pub fn new(store: &'a dyn BranchStore) -> Self {
        Self { store }
    }

    /// Fetch every branch at `level`
    pub fn list(&self, level: Level) -> Result<Vec<Branch>> {
        debug!(%level, "listing branches");
        let records = self.store.list(level)?;
        Ok(records
            .into_iter()
            .map(|record| Branch::from_record(level, record))
            .collect())
    }

    /// Fetch one branch with its full content
    pub fn get(&self, level: Level, id: BranchId) -> Result<Branch> {
        debug!(%level, %id, "fetching branch");
        let record = self.store.get(level, id)?;
        Ok(Branch::from_record(level, record))
    }

    /// Create a branch; the parent rule is checked before storage is called
    pub fn create(&self, level: Level, draft: &BranchDraft) -> Result<Branch> {
        draft.check_parent(level)?;
        debug!(%level, parent = ?draft.parent_id, "creating branch");
        let record = self.store.create(level, draft)?;
        Ok(Branch::from_record(level, record))
    }

    pub fn update(&self, level: Level, id: BranchId, patch: &BranchPatch) -> Result<Branch> {
        debug!(%level, %id, "updating branch");
        let record = self.store.update(level, id, patch)?;
        Ok(Branch::from_record(level, record))
    }

    /// Delete a branch. `Ok(false)` means it was already gone.
    pub fn remove(&self, level: Level, id: BranchId) -> Result<bool> {
        debug!(%level, %id, "removing branch");
        match self.store.remove(level, id) {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sqlite_store, FlakyStore};

    #[test]
    fn test_list_normalizes_records() {
        let (_dir, store) = sqlite_store();
        let repo = BranchRepository::new(&store);
        repo.create(Level::ROOT, &BranchDraft::root("Docs", "<p>root</p>")).unwrap();

        let branches = repo.list(Level::ROOT).unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].level, Level::ROOT);
        assert!(!branches[0].is_expanded);
        assert!(!branches[0].is_menu_pending);
    }

    #[test]
    fn test_create_rejects_parent_at_root_before_storage() {
        let (_dir, store) = sqlite_store();
        let flaky = FlakyStore::new(store);
        let repo = BranchRepository::new(&flaky);

        let result = repo.create(Level::ROOT, &BranchDraft::child(BranchId(1), "Docs", "x"));
        assert!(result.is_err());
        assert_eq!(flaky.calls(), 0);
    }

    #[test]
    fn test_remove_missing_is_not_an_error() {
        let (_dir, store) = sqlite_store();
        let repo = BranchRepository::new(&store);

        assert!(!repo.remove(Level::ROOT, BranchId(404)).unwrap());
    }

    #[test]
    fn test_storage_failure_propagates() {
        let (_dir, store) = sqlite_store();
        let flaky = FlakyStore::new(store);
        flaky.set_offline(true);
        let repo = BranchRepository::new(&flaky);

        assert!(repo.list(Level::ROOT).is_err());
        assert!(repo.remove(Level::ROOT, BranchId(1)).is_err());
    }
}
