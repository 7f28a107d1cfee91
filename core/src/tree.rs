use crate::models::{Branch, BranchDraft, BranchId, BranchPatch, Level};
use crate::storage::BranchRepository;
use crate::{Error, Result};
use std::collections::HashMap;
use tracing::{info, warn};

/// The five per-level branch collections plus load and error state.
///
/// This is the only writer of the transient `is_expanded` and
/// `is_menu_pending` flags. Storage failures never clear data that is
/// already loaded; they are recorded and reported to the caller.
#[derive(Debug, Default)]
pub struct TreeState {
    levels: [Vec<Branch>; Level::COUNT],
    level_errors: [Option<String>; Level::COUNT],
    error: Option<String>,
    loading: bool,
}

impl TreeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from already-loaded branches, bucketed by their level
    pub fn with_branches(branches: impl IntoIterator<Item = Branch>) -> Self {
        let mut state = Self::new();
        for branch in branches {
            state.levels[branch.level.index()].push(branch);
        }
        state
    }

    pub fn collection(&self, level: Level) -> &[Branch] {
        &self.levels[level.index()]
    }

    /// Level-1 branches, the roots of the tree
    pub fn roots(&self) -> &[Branch] {
        self.collection(Level::ROOT)
    }

    pub fn find(&self, level: Level, id: BranchId) -> Option<&Branch> {
        self.collection(level).iter().find(|b| b.id == id)
    }

    fn find_mut(&mut self, level: Level, id: BranchId) -> Option<&mut Branch> {
        self.levels[level.index()].iter_mut().find(|b| b.id == id)
    }

    /// Branches at `level` whose parent is `parent_id`, in collection order.
    ///
    /// Level 1 has no parents, so asking for its children yields nothing.
    pub fn children_of(&self, level: Level, parent_id: BranchId) -> Vec<&Branch> {
        if level.is_root() {
            return Vec::new();
        }
        self.collection(level)
            .iter()
            .filter(|b| b.is_child_of(parent_id))
            .collect()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Most recent failure message, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Failure recorded by the last listing of `level`
    pub fn level_error(&self, level: Level) -> Option<&str> {
        self.level_errors[level.index()].as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub(crate) fn record_error(&mut self, level: Level, action: &str, err: &Error) {
        warn!(%level, action, error = %err, "branch operation failed");
        self.error = Some(format!("Failed to {} level {} branch: {}", action, level, err));
    }

    /// Load all five levels concurrently.
    ///
    /// A level whose listing fails keeps its previous collection and records
    /// its own error; the other levels still load. A successful write or a
    /// full reload clears the last recorded error.
    pub fn fetch_all(&mut self, repo: BranchRepository<'_>) {
        self.loading = true;
        self.error = None;

        let results: Vec<(Level, Result<Vec<Branch>>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = Level::ALL
                .iter()
                .map(|&level| (level, scope.spawn(move || repo.list(level))))
                .collect();

            handles
                .into_iter()
                .map(|(level, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(Error::Storage(format!("listing level {} panicked", level)))
                    });
                    (level, result)
                })
                .collect()
        });

        for (level, result) in results {
            self.apply_listing(level, result);
        }

        self.loading = false;
    }

    /// Re-fetch one level. Returns false when the listing failed.
    pub fn fetch_level(&mut self, repo: BranchRepository<'_>, level: Level) -> bool {
        let result = repo.list(level);
        self.apply_listing(level, result)
    }

    /// Replace a level's collection with a fresh listing, carrying over the
    /// transient flags of branches that are still present.
    fn apply_listing(&mut self, level: Level, result: Result<Vec<Branch>>) -> bool {
        match result {
            Ok(mut fresh) => {
                let previous: HashMap<BranchId, (bool, bool)> = self.levels[level.index()]
                    .iter()
                    .map(|b| (b.id, (b.is_expanded, b.is_menu_pending)))
                    .collect();
                for branch in &mut fresh {
                    if let Some(&(expanded, pending)) = previous.get(&branch.id) {
                        branch.is_expanded = expanded;
                        branch.is_menu_pending = pending;
                    }
                }
                self.levels[level.index()] = fresh;
                self.level_errors[level.index()] = None;
                true
            }
            Err(err) => {
                self.record_error(level, "fetch", &err);
                self.level_errors[level.index()] = Some(err.to_string());
                false
            }
        }
    }

    /// Fetch one branch with full content, recording any failure
    pub fn fetch_branch(&mut self, repo: BranchRepository<'_>, level: Level, id: BranchId) -> Option<Branch> {
        match repo.get(level, id) {
            Ok(branch) => Some(branch),
            Err(err) => {
                self.record_error(level, "fetch", &err);
                None
            }
        }
    }

    /// Flip `is_expanded` on exactly one branch. Returns the new value.
    pub fn toggle_expanded(&mut self, level: Level, id: BranchId) -> Option<bool> {
        let branch = self.find_mut(level, id)?;
        branch.is_expanded = !branch.is_expanded;
        Some(branch.is_expanded)
    }

    /// Create a branch and append it to its level's collection
    pub fn add(&mut self, repo: BranchRepository<'_>, level: Level, draft: &BranchDraft) -> Option<Branch> {
        self.loading = true;
        let result = repo.create(level, draft);
        self.loading = false;

        match result {
            Ok(branch) => {
                info!(%level, id = %branch.id, "branch created");
                self.error = None;
                self.levels[level.index()].push(branch.clone());
                Some(branch)
            }
            Err(err) => {
                self.record_error(level, "add", &err);
                None
            }
        }
    }

    /// Persist the title and content of `branch`, then replace the local
    /// record while keeping its transient flags.
    pub fn apply_update(&mut self, repo: BranchRepository<'_>, level: Level, branch: &Branch) -> Option<Branch> {
        self.loading = true;
        let result = repo.update(level, branch.id, &BranchPatch::from_branch(branch));
        self.loading = false;

        match result {
            Ok(mut updated) => {
                info!(%level, id = %updated.id, "branch updated");
                self.error = None;
                if let Some(existing) = self.find_mut(level, updated.id) {
                    updated.is_expanded = existing.is_expanded;
                    updated.is_menu_pending = existing.is_menu_pending;
                    *existing = updated.clone();
                }
                Some(updated)
            }
            Err(err) => {
                self.record_error(level, "update", &err);
                None
            }
        }
    }

    /// Delete a branch from storage and from its collection.
    ///
    /// Children at the next level are left in place; with their parent gone
    /// they are simply never reached by the tree walk.
    pub fn remove(&mut self, repo: BranchRepository<'_>, level: Level, id: BranchId) -> bool {
        self.loading = true;
        let result = repo.remove(level, id);
        self.loading = false;

        match result {
            Ok(existed) => {
                info!(%level, %id, existed, "branch removed");
                self.error = None;
                self.levels[level.index()].retain(|b| b.id != id);
                true
            }
            Err(err) => {
                self.record_error(level, "delete", &err);
                false
            }
        }
    }

    pub fn set_menu_pending(&mut self, level: Level, id: BranchId) {
        if let Some(branch) = self.find_mut(level, id) {
            branch.is_menu_pending = true;
        }
    }

    pub fn reset_menu_pending(&mut self, level: Level) {
        for branch in &mut self.levels[level.index()] {
            branch.is_menu_pending = false;
        }
    }

    pub fn reset_all_menu_pending(&mut self) {
        for level in Level::ALL {
            self.reset_menu_pending(level);
        }
    }

    /// Every branch currently flagged as the menu target
    pub fn menu_pending(&self) -> impl Iterator<Item = &Branch> {
        self.levels.iter().flatten().filter(|b| b.is_menu_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BranchRecord;
    use crate::storage::BranchStore;
    use crate::testing::{level, sqlite_store, FlakyStore};
    use chrono::Utc;

    fn branch(level_n: u8, id: i64, parent: Option<i64>, title: &str) -> Branch {
        let now = Utc::now();
        Branch::from_record(
            level(level_n),
            BranchRecord {
                id: BranchId(id),
                parent_id: parent.map(BranchId),
                title: title.to_string(),
                content: format!("<p>{}</p>", title),
                created_at: now,
                updated_at: now,
            },
        )
    }

    fn seed(store: &dyn BranchStore) -> (BranchId, BranchId) {
        let root = store.create(Level::ROOT, &BranchDraft::root("Docs", "<p>docs</p>")).unwrap();
        let child = store.create(level(2), &BranchDraft::child(root.id, "Intro", "<p>intro</p>")).unwrap();
        (root.id, child.id)
    }

    #[test]
    fn test_children_of_scenario() {
        let mut tree = TreeState::with_branches(vec![
            branch(1, 1, None, "Docs"),
            branch(2, 10, Some(1), "Intro"),
        ]);

        assert_eq!(tree.toggle_expanded(Level::ROOT, BranchId(1)), Some(true));
        let children = tree.children_of(level(2), BranchId(1));
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].title, "Intro");
        assert!(tree.children_of(Level::ROOT, BranchId(1)).is_empty());
    }

    #[test]
    fn test_toggle_only_touches_target() {
        let mut tree = TreeState::with_branches(vec![
            branch(1, 1, None, "Docs"),
            branch(1, 2, None, "Guides"),
            branch(2, 10, Some(1), "Intro"),
        ]);
        tree.toggle_expanded(level(2), BranchId(10));
        tree.toggle_expanded(Level::ROOT, BranchId(1));
        tree.toggle_expanded(Level::ROOT, BranchId(1));

        assert!(!tree.find(Level::ROOT, BranchId(1)).unwrap().is_expanded);
        assert!(!tree.find(Level::ROOT, BranchId(2)).unwrap().is_expanded);
        // collapsing the parent leaves the child's own state alone
        assert!(tree.find(level(2), BranchId(10)).unwrap().is_expanded);
        assert_eq!(tree.toggle_expanded(Level::ROOT, BranchId(99)), None);
    }

    #[test]
    fn test_fetch_all_loads_every_level() {
        let (_dir, store) = sqlite_store();
        let (root_id, child_id) = seed(&store);
        let mut tree = TreeState::new();

        tree.fetch_all(BranchRepository::new(&store));

        assert!(!tree.is_loading());
        assert_eq!(tree.roots()[0].id, root_id);
        assert_eq!(tree.collection(level(2))[0].id, child_id);
        assert!(tree.error().is_none());
    }

    #[test]
    fn test_fetch_all_isolates_level_failures() {
        let (_dir, store) = sqlite_store();
        let (_, child_id) = seed(&store);
        let flaky = FlakyStore::new(store);
        let mut tree = TreeState::new();
        tree.fetch_all(BranchRepository::new(&flaky));
        assert_eq!(tree.collection(level(2)).len(), 1);

        flaky.inner().create(Level::ROOT, &BranchDraft::root("Guides", "<p>g</p>")).unwrap();
        flaky.fail_level(level(2));
        tree.fetch_all(BranchRepository::new(&flaky));

        assert!(!tree.is_loading());
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.collection(level(2))[0].id, child_id);
        assert!(tree.level_error(level(2)).is_some());
        assert!(tree.level_error(Level::ROOT).is_none());
        assert!(tree.error().is_some());
    }

    #[test]
    fn test_add_appends_with_cleared_flags() {
        let (_dir, store) = sqlite_store();
        let (root_id, _) = seed(&store);
        let repo = BranchRepository::new(&store);
        let mut tree = TreeState::new();
        tree.fetch_all(repo);
        let before = tree.children_of(level(2), root_id).len();

        let added = tree
            .add(repo, level(2), &BranchDraft::child(root_id, "Setup", "<p>setup</p>"))
            .unwrap();

        let children = tree.children_of(level(2), root_id);
        assert_eq!(children.len(), before + 1);
        let stored = children.iter().find(|b| b.id == added.id).unwrap();
        assert!(!stored.is_expanded);
        assert!(!stored.is_menu_pending);
    }

    #[test]
    fn test_add_failure_leaves_state_untouched() {
        let (_dir, store) = sqlite_store();
        seed(&store);
        let flaky = FlakyStore::new(store);
        let repo = BranchRepository::new(&flaky);
        let mut tree = TreeState::new();
        tree.fetch_all(repo);

        flaky.set_offline(true);
        let result = tree.add(repo, Level::ROOT, &BranchDraft::root("Guides", "<p>g</p>"));

        assert!(result.is_none());
        assert_eq!(tree.roots().len(), 1);
        assert!(tree.error().unwrap().contains("add"));
        assert!(!tree.is_loading());
    }

    #[test]
    fn test_successful_retry_clears_error() {
        let (_dir, store) = sqlite_store();
        let flaky = FlakyStore::new(store);
        let repo = BranchRepository::new(&flaky);
        let mut tree = TreeState::new();

        flaky.set_offline(true);
        assert!(tree.add(repo, Level::ROOT, &BranchDraft::root("Guides", "<p>g</p>")).is_none());
        assert!(tree.error().is_some());

        flaky.set_offline(false);
        assert!(tree.add(repo, Level::ROOT, &BranchDraft::root("Guides", "<p>g</p>")).is_some());
        assert!(tree.error().is_none());
    }

    #[test]
    fn test_apply_update_preserves_transient_flags() {
        let (_dir, store) = sqlite_store();
        let (root_id, _) = seed(&store);
        let repo = BranchRepository::new(&store);
        let mut tree = TreeState::new();
        tree.fetch_all(repo);
        tree.toggle_expanded(Level::ROOT, root_id);

        let mut edited = tree.find(Level::ROOT, root_id).unwrap().clone();
        edited.title = "Documentation".to_string();
        edited.content = "<p>new</p>".to_string();
        let updated = tree.apply_update(repo, Level::ROOT, &edited).unwrap();

        assert!(updated.is_expanded);
        let stored = tree.find(Level::ROOT, root_id).unwrap();
        assert_eq!(stored.title, "Documentation");
        assert!(stored.is_expanded);
    }

    #[test]
    fn test_refetch_keeps_expansion() {
        let (_dir, store) = sqlite_store();
        let (root_id, _) = seed(&store);
        let repo = BranchRepository::new(&store);
        let mut tree = TreeState::new();
        tree.fetch_all(repo);
        tree.toggle_expanded(Level::ROOT, root_id);

        assert!(tree.fetch_level(repo, Level::ROOT));
        assert!(tree.find(Level::ROOT, root_id).unwrap().is_expanded);
    }

    #[test]
    fn test_remove_orphans_children() {
        let (_dir, store) = sqlite_store();
        let (root_id, child_id) = seed(&store);
        let repo = BranchRepository::new(&store);
        let mut tree = TreeState::new();
        tree.fetch_all(repo);

        assert!(tree.remove(repo, Level::ROOT, root_id));

        assert!(tree.find(Level::ROOT, root_id).is_none());
        let orphan = tree.find(level(2), child_id).unwrap();
        assert_eq!(orphan.parent_id, Some(root_id));
    }

    #[test]
    fn test_remove_of_vanished_branch_cleans_local_state() {
        let (_dir, store) = sqlite_store();
        let (root_id, _) = seed(&store);
        let repo = BranchRepository::new(&store);
        let mut tree = TreeState::new();
        tree.fetch_all(repo);
        store.remove(Level::ROOT, root_id).unwrap();

        assert!(tree.remove(repo, Level::ROOT, root_id));
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn test_remove_failure_keeps_branch() {
        let (_dir, store) = sqlite_store();
        let (root_id, _) = seed(&store);
        let flaky = FlakyStore::new(store);
        let repo = BranchRepository::new(&flaky);
        let mut tree = TreeState::new();
        tree.fetch_all(repo);

        flaky.set_offline(true);
        assert!(!tree.remove(repo, Level::ROOT, root_id));
        assert!(tree.find(Level::ROOT, root_id).is_some());
    }

    #[test]
    fn test_menu_pending_flags() {
        let mut tree = TreeState::with_branches(vec![
            branch(1, 1, None, "Docs"),
            branch(2, 10, Some(1), "Intro"),
        ]);
        tree.set_menu_pending(Level::ROOT, BranchId(1));
        tree.set_menu_pending(level(2), BranchId(10));
        assert_eq!(tree.menu_pending().count(), 2);

        tree.reset_menu_pending(level(2));
        assert_eq!(tree.menu_pending().count(), 1);

        tree.reset_all_menu_pending();
        assert_eq!(tree.menu_pending().count(), 0);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn toggle_twice_is_identity(ops in proptest::collection::vec((1u8..=3, 1i64..=4), 0..20), target in 1i64..=4) {
                let mut branches = Vec::new();
                for id in 1..=4 {
                    branches.push(branch(1, id, None, "Root"));
                    branches.push(branch(2, id, Some(id), "Child"));
                    branches.push(branch(3, id, Some(id), "Grandchild"));
                }
                let mut tree = TreeState::with_branches(branches);
                for (lvl, id) in ops {
                    tree.toggle_expanded(level(lvl), BranchId(id));
                }
                let snapshot: Vec<bool> = Level::ALL
                    .iter()
                    .flat_map(|&l| tree.collection(l).iter().map(|b| b.is_expanded).collect::<Vec<_>>())
                    .collect();

                tree.toggle_expanded(level(2), BranchId(target));
                tree.toggle_expanded(level(2), BranchId(target));

                let after: Vec<bool> = Level::ALL
                    .iter()
                    .flat_map(|&l| tree.collection(l).iter().map(|b| b.is_expanded).collect::<Vec<_>>())
                    .collect();
                prop_assert_eq!(snapshot, after);
            }
        }
    }
}
