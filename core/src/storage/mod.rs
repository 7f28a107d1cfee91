mod branch_repository;
mod database;
mod sqlite_store;
mod store;

pub use branch_repository::BranchRepository;
pub use database::{Connection, Database, SCHEMA_VERSION};
pub use sqlite_store::{normalize_owner, SqliteBranchStore};
pub use store::BranchStore;
