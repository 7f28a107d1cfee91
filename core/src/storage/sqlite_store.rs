use super::{BranchStore, Connection, Database};
use crate::models::{
    datetime_to_timestamp, timestamp_to_datetime, BranchDraft, BranchId, BranchPatch, BranchRecord, Level,
};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Mutex;

/// Normalize a user name into the owner key rows are scoped by.
///
/// Lowercases, keeps only `[a-z0-9_]`, and prefixes `u_` when the result
/// starts with a digit.
pub fn normalize_owner(username: &str) -> Result<String> {
    let sanitized: String = username
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    if sanitized.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Invalid username for branch storage: {:?}",
            username
        )));
    }

    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        Ok(format!("u_{}", sanitized))
    } else {
        Ok(sanitized)
    }
}

/// SQLite-backed [`BranchStore`] holding one table per level, with every
/// row owned by a single user.
pub struct SqliteBranchStore {
    conn: Mutex<Connection>,
    owner: String,
}

impl SqliteBranchStore {
    /// Open (creating if needed) the database and scope it to `username`
    pub fn open(db: &Database, username: &str) -> Result<Self> {
        let conn = db.get_or_create()?;
        Self::new(conn, username)
    }

    pub fn new(conn: Connection, username: &str) -> Result<Self> {
        Database::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            owner: normalize_owner(username)?,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Number of branches the owner has at `level`
    pub fn count(&self, level: Level) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE owner = ?1", Database::table_name(level)),
                params![self.owner],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Storage("branch database lock poisoned".to_string()))?;
        f(&conn)
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<BranchRecord> {
        Ok(BranchRecord {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            created_at: timestamp_to_datetime(row.get(4)?),
            updated_at: timestamp_to_datetime(row.get(5)?),
        })
    }

    fn fetch(&self, conn: &Connection, level: Level, id: BranchId) -> Result<BranchRecord> {
        let record = conn
            .query_row(
                &format!(
                    "SELECT id, parent_id, title, content, created_at, updated_at FROM {} WHERE id = ?1 AND owner = ?2",
                    Database::table_name(level)
                ),
                params![id, self.owner],
                Self::row_to_record,
            )
            .optional()?;

        record.ok_or_else(|| Error::NotFound(format!("Branch not found: level {} id {}", level, id)))
    }
}

impl BranchStore for SqliteBranchStore {
    fn list(&self, level: Level) -> Result<Vec<BranchRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, parent_id, title, content, created_at, updated_at FROM {} WHERE owner = ?1 ORDER BY id DESC",
                Database::table_name(level)
            ))?;

            let records = stmt
                .query_map(params![self.owner], Self::row_to_record)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(records)
        })
    }

    fn get(&self, level: Level, id: BranchId) -> Result<BranchRecord> {
        self.with_conn(|conn| self.fetch(conn, level, id))
    }

    fn create(&self, level: Level, draft: &BranchDraft) -> Result<BranchRecord> {
        if draft.title.trim().is_empty() || draft.content.is_empty() {
            return Err(Error::InvalidInput("Title and content are required".to_string()));
        }
        draft.check_parent(level)?;

        self.with_conn(|conn| {
            let now = datetime_to_timestamp(&Utc::now());
            conn.execute(
                &format!(
                    "INSERT INTO {} (owner, parent_id, title, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    Database::table_name(level)
                ),
                params![self.owner, draft.parent_id, draft.title, draft.content, now, now],
            )?;
            let id = BranchId(conn.last_insert_rowid());
            self.fetch(conn, level, id)
        })
    }

    fn update(&self, level: Level, id: BranchId, patch: &BranchPatch) -> Result<BranchRecord> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("No fields to update".to_string()));
        }

        self.with_conn(|conn| {
            let rows_affected = conn.execute(
                &format!(
                    "UPDATE {} SET title = COALESCE(?1, title), content = COALESCE(?2, content), updated_at = ?3 WHERE id = ?4 AND owner = ?5",
                    Database::table_name(level)
                ),
                params![
                    patch.title,
                    patch.content,
                    datetime_to_timestamp(&Utc::now()),
                    id,
                    self.owner,
                ],
            )?;

            if rows_affected == 0 {
                return Err(Error::NotFound(format!("Branch not found: level {} id {}", level, id)));
            }

            self.fetch(conn, level, id)
        })
    }

    fn remove(&self, level: Level, id: BranchId) -> Result<()> {
        self.with_conn(|conn| {
            let rows_affected = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1 AND owner = ?2", Database::table_name(level)),
                params![id, self.owner],
            )?;

            if rows_affected == 0 {
                return Err(Error::NotFound(format!("Branch not found: level {} id {}", level, id)));
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup_store(user: &str) -> (tempfile::TempDir, SqliteBranchStore) {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db"));
        let store = SqliteBranchStore::open(&db, user).unwrap();
        (dir, store)
    }

    fn level(n: u8) -> Level {
        Level::new(n).unwrap()
    }

    #[test]
    fn test_normalize_owner() {
        assert_eq!(normalize_owner("John.Doe").unwrap(), "johndoe");
        assert_eq!(normalize_owner("42team").unwrap(), "u_42team");
        assert!(normalize_owner("!!!").is_err());
    }

    #[test]
    fn test_create_and_get() {
        let (_dir, store) = setup_store("alice");
        let created = store.create(Level::ROOT, &BranchDraft::root("Docs", "<p>x</p>")).unwrap();

        let fetched = store.get(Level::ROOT, created.id).unwrap();
        assert_eq!(fetched.title, "Docs");
        assert_eq!(fetched.parent_id, None);
    }

    #[test]
    fn test_list_is_newest_first() {
        let (_dir, store) = setup_store("alice");
        let first = store.create(Level::ROOT, &BranchDraft::root("First", "a")).unwrap();
        let second = store.create(Level::ROOT, &BranchDraft::root("Second", "b")).unwrap();

        let ids: Vec<BranchId> = store.list(Level::ROOT).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_levels_are_separate_collections() {
        let (_dir, store) = setup_store("alice");
        let root = store.create(Level::ROOT, &BranchDraft::root("Docs", "a")).unwrap();
        store.create(level(2), &BranchDraft::child(root.id, "Intro", "b")).unwrap();

        assert_eq!(store.count(Level::ROOT).unwrap(), 1);
        assert_eq!(store.count(level(2)).unwrap(), 1);
        assert_eq!(store.count(level(3)).unwrap(), 0);
    }

    #[test]
    fn test_owners_are_isolated() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db"));
        let alice = SqliteBranchStore::open(&db, "alice").unwrap();
        let bob = SqliteBranchStore::open(&db, "bob").unwrap();

        let created = alice.create(Level::ROOT, &BranchDraft::root("Private", "a")).unwrap();

        assert!(bob.list(Level::ROOT).unwrap().is_empty());
        assert!(bob.get(Level::ROOT, created.id).unwrap_err().is_not_found());
        assert!(bob.remove(Level::ROOT, created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_requires_title_and_content() {
        let (_dir, store) = setup_store("alice");
        assert!(store.create(Level::ROOT, &BranchDraft::root("", "a")).is_err());
        assert!(store.create(Level::ROOT, &BranchDraft::root("Docs", "")).is_err());
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let (_dir, store) = setup_store("alice");
        let created = store.create(Level::ROOT, &BranchDraft::root("Docs", "<p>body</p>")).unwrap();

        let patch = BranchPatch {
            title: Some("Documentation".to_string()),
            content: None,
        };
        let updated = store.update(Level::ROOT, created.id, &patch).unwrap();
        assert_eq!(updated.title, "Documentation");
        assert_eq!(updated.content, "<p>body</p>");
    }

    #[test]
    fn test_update_errors() {
        let (_dir, store) = setup_store("alice");
        let created = store.create(Level::ROOT, &BranchDraft::root("Docs", "a")).unwrap();

        let empty = BranchPatch::default();
        assert!(matches!(store.update(Level::ROOT, created.id, &empty), Err(Error::InvalidInput(_))));

        let patch = BranchPatch {
            title: Some("Other".to_string()),
            content: None,
        };
        assert!(store.update(Level::ROOT, BranchId(999), &patch).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_does_not_cascade() {
        let (_dir, store) = setup_store("alice");
        let root = store.create(Level::ROOT, &BranchDraft::root("Docs", "a")).unwrap();
        store.create(level(2), &BranchDraft::child(root.id, "Intro", "b")).unwrap();

        store.remove(Level::ROOT, root.id).unwrap();

        assert!(store.list(Level::ROOT).unwrap().is_empty());
        assert_eq!(store.list(level(2)).unwrap().len(), 1);
        assert!(store.remove(Level::ROOT, root.id).unwrap_err().is_not_found());
    }
}
