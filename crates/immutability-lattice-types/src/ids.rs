//! Stable identifiers for program-model entities.
//!
//! Types and fields live in an arena (see [`crate::model::ProgramModel`]) and are
//! addressed by dense integer ids. Generic parameters and locks are named.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a type declaration in the program model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

/// Index of a field declaration in the program model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FieldId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A generic type parameter, identified by its declared name (`T`, `T1`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamId(pub String);

impl ParamId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a monitor guarding a write in the analysed program.
///
/// `this` for synchronized instance methods, the class name for synchronized
/// static methods, or any explicit lock expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub String);

impl LockId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for LockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
