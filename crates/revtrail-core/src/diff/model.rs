//! Structural diff output types.

use crate::model::FieldValue;
use serde::{Deserialize, Serialize};

/// Discriminant of a [`DiffEntry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    New,
    Edit,
    Delete,
    ArrayChange,
}

/// One structural difference between two values.
///
/// `path` lists object keys (and, below arrays, element indices) from the
/// snapshot root down to the changed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DiffEntry {
    /// Present only on the right-hand side
    New { path: Vec<String>, rhs: FieldValue },
    /// Present on both sides with different values
    Edit {
        path: Vec<String>,
        lhs: FieldValue,
        rhs: FieldValue,
    },
    /// Present only on the left-hand side
    Delete { path: Vec<String>, lhs: FieldValue },
    /// An array grew or shrank at `index`
    ArrayChange {
        path: Vec<String>,
        index: usize,
        item: ArrayItem,
    },
}

/// Element added to or removed from an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ArrayItem {
    New { rhs: FieldValue },
    Delete { lhs: FieldValue },
}

impl DiffEntry {
    pub fn kind(&self) -> DiffKind {
        match self {
            DiffEntry::New { .. } => DiffKind::New,
            DiffEntry::Edit { .. } => DiffKind::Edit,
            DiffEntry::Delete { .. } => DiffKind::Delete,
            DiffEntry::ArrayChange { .. } => DiffKind::ArrayChange,
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            DiffEntry::New { path, .. }
            | DiffEntry::Edit { path, .. }
            | DiffEntry::Delete { path, .. }
            | DiffEntry::ArrayChange { path, .. } => path,
        }
    }

    /// Top-level field this entry belongs to
    pub fn field(&self) -> Option<&str> {
        self.path().first().map(String::as_str)
    }

    /// Old value, if the entry has one
    pub fn lhs(&self) -> Option<&FieldValue> {
        match self {
            DiffEntry::Edit { lhs, .. } | DiffEntry::Delete { lhs, .. } => Some(lhs),
            DiffEntry::ArrayChange {
                item: ArrayItem::Delete { lhs },
                ..
            } => Some(lhs),
            _ => None,
        }
    }

    /// New value, if the entry has one
    pub fn rhs(&self) -> Option<&FieldValue> {
        match self {
            DiffEntry::Edit { rhs, .. } | DiffEntry::New { rhs, .. } => Some(rhs),
            DiffEntry::ArrayChange {
                item: ArrayItem::New { rhs },
                ..
            } => Some(rhs),
            _ => None,
        }
    }

    /// True when any path segment is in `names`
    pub fn touches_any(&self, names: &std::collections::BTreeSet<String>) -> bool {
        self.path().iter().any(|segment| names.contains(segment))
    }
}
