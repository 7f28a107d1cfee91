use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Depth of a branch in the tree, 1 (root) through 5 (leaf only).
///
/// A `Level` can only be constructed inside that range, so every collection
/// index and child/parent step derived from it is in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const COUNT: usize = 5;
    pub const ROOT: Level = Level(1);
    pub const LEAF: Level = Level(5);
    pub const ALL: [Level; Level::COUNT] = [Level(1), Level(2), Level(3), Level(4), Level(5)];

    pub fn new(value: u8) -> Result<Self> {
        if (1..=Self::COUNT as u8).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidInput(format!(
                "Invalid branch level {}. Must be 1-5.",
                value
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based slot for per-level arrays
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// The level children of this level live at; `None` for the leaf level
    pub fn child(self) -> Option<Level> {
        if self.is_leaf() { None } else { Some(Level(self.0 + 1)) }
    }

    /// The level parents of this level live at; `None` for the root level
    pub fn parent(self) -> Option<Level> {
        if self.is_root() { None } else { Some(Level(self.0 - 1)) }
    }

    pub fn is_root(self) -> bool {
        self.0 == 1
    }

    pub fn is_leaf(self) -> bool {
        self.0 == Self::COUNT as u8
    }
}

impl TryFrom<u8> for Level {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Level::new(value)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
