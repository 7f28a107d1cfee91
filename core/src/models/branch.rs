use super::Level;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of characters a title must keep after trimming
pub const MIN_TITLE_LEN: usize = 3;

/// Storage-assigned identifier of a branch, unique within its level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub i64);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for BranchId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for BranchId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(BranchId)
    }
}

/// A branch as exchanged with storage. Carries no UI state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BranchRecord {
    pub id: BranchId,
    #[serde(default, alias = "branch_id")]
    pub parent_id: Option<BranchId>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One node of the tree as held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub id: BranchId,
    pub level: Level,
    pub parent_id: Option<BranchId>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Children are rendered while set. Never persisted.
    pub is_expanded: bool,
    /// Marks the context-menu target. Never persisted.
    pub is_menu_pending: bool,
}

impl Branch {
    /// Normalize a storage record; transient flags start cleared
    pub fn from_record(level: Level, record: BranchRecord) -> Self {
        Self {
            id: record.id,
            level,
            parent_id: record.parent_id,
            title: record.title,
            content: record.content,
            created_at: record.created_at,
            updated_at: record.updated_at,
            is_expanded: false,
            is_menu_pending: false,
        }
    }

    /// The persisted shape of this branch, without transient flags
    pub fn to_record(&self) -> BranchRecord {
        BranchRecord {
            id: self.id,
            parent_id: self.parent_id,
            title: self.title.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Level-5 branches are structural leaves
    pub fn can_have_children(&self) -> bool {
        !self.level.is_leaf()
    }

    pub fn is_child_of(&self, parent_id: BranchId) -> bool {
        self.parent_id == Some(parent_id)
    }
}

/// Fields supplied when creating a branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BranchDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BranchId>,
    pub title: String,
    pub content: String,
}

impl BranchDraft {
    pub fn root(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            parent_id: None,
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn child(parent_id: BranchId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Check the parent rule for the level this draft is created at
    pub fn check_parent(&self, level: Level) -> Result<()> {
        match (level.is_root(), self.parent_id) {
            (true, Some(parent)) => Err(Error::InvalidInput(format!(
                "Level 1 branches cannot have a parent (got {})",
                parent
            ))),
            (false, None) => Err(Error::InvalidInput(format!(
                "Level {} branches need a parent",
                level
            ))),
            _ => Ok(()),
        }
    }
}

/// Partial update; `None` fields are left unchanged by storage
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BranchPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl BranchPatch {
    /// Patch carrying the editable fields of `branch`
    pub fn from_branch(branch: &Branch) -> Self {
        Self {
            title: Some(branch.title.clone()),
            content: Some(branch.content.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Reject titles shorter than [`MIN_TITLE_LEN`] once trimmed
pub fn validate_title(title: &str) -> Result<&str> {
    let trimmed = title.trim();
    if trimmed.chars().count() < MIN_TITLE_LEN {
        return Err(Error::Validation(format!(
            "Title must be at least {} characters",
            MIN_TITLE_LEN
        )));
    }
    Ok(trimmed)
}
