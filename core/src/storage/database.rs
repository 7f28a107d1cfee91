use crate::models::Level;
use crate::{Error, Result};
use rusqlite::Connection as SqliteConnection;
use std::path::{Path, PathBuf};

pub type Connection = SqliteConnection;

pub const SCHEMA_VERSION: i32 = 1;

/// Database manager for branch storage
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    /// Create a new database manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Get a connection to the database
    pub fn connect(&self) -> Result<Connection> {
        let conn = SqliteConnection::open(&self.db_path)?;
        Ok(conn)
    }

    /// Create a new database and initialize it with the schema
    pub fn create(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = SqliteConnection::open(&self.db_path)?;
        Self::initialize_schema(&conn)?;
        Ok(conn)
    }

    /// Create every level table plus metadata. Safe to run repeatedly.
    pub fn initialize_schema(conn: &Connection) -> Result<()> {
        let mut schema = String::from(
            "CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);\n",
        );
        for level in Level::ALL {
            schema.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner TEXT NOT NULL,
                    parent_id INTEGER,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_owner ON {table}(owner);\n",
                table = Self::table_name(level)
            ));
        }
        schema.push_str(&format!(
            "INSERT OR IGNORE INTO metadata (key, value) VALUES ('schema_version', '{}');",
            SCHEMA_VERSION
        ));
        conn.execute_batch(&schema)?;
        Ok(())
    }

    /// Table holding the branches of `level`
    pub fn table_name(level: Level) -> String {
        format!("branches{}", level)
    }

    /// Check if the database exists
    pub fn exists(&self) -> bool {
        self.db_path.exists()
    }

    /// Get or create a database connection
    pub fn get_or_create(&self) -> Result<Connection> {
        if self.exists() {
            let conn = self.connect()?;
            Self::initialize_schema(&conn)?;
            Ok(conn)
        } else {
            self.create()
        }
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get the current schema version
    pub fn get_schema_version(&self, conn: &Connection) -> Result<i32> {
        let version: String = conn.query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;

        version
            .parse::<i32>()
            .map_err(|_| Error::InvalidInput("Invalid schema version".to_string()))
    }
}
