use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::Operation;
use super::value::{FieldValue, Snapshot};
use crate::diff::{DiffChunk, DiffEntry};

/// One audit record per committed, tracked mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub model: String,
    /// Sanitized post-mutation snapshot
    pub document: Snapshot,
    pub operation: Operation,
    pub document_id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One changed top-level field within a Revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionChange {
    pub id: String,
    /// Top-level field name
    pub path: String,
    pub document: ChangeDocument,
    pub diff: Vec<DiffChunk>,
    pub revision_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Typed payload of a RevisionChange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeDocument {
    /// Change between scalar values (text, number, bool, null)
    ScalarChange { entry: DiffEntry },
    /// Change where at least one side is a date
    DateChange { entry: DiffEntry },
    /// Change involving an object or array
    StructuredChange { entry: DiffEntry },
    /// Payload erased by a redaction
    Redacted,
}

impl ChangeDocument {
    /// Classify a diff entry by the values it carries
    pub fn from_entry(entry: DiffEntry) -> Self {
        let sides = [entry.lhs(), entry.rhs()];
        if sides.iter().flatten().any(|v| v.is_date()) {
            ChangeDocument::DateChange { entry }
        } else if sides.iter().flatten().any(|v| v.is_nested())
            || matches!(entry, DiffEntry::ArrayChange { .. })
        {
            ChangeDocument::StructuredChange { entry }
        } else {
            ChangeDocument::ScalarChange { entry }
        }
    }

    pub fn entry(&self) -> Option<&DiffEntry> {
        match self {
            ChangeDocument::ScalarChange { entry }
            | ChangeDocument::DateChange { entry }
            | ChangeDocument::StructuredChange { entry } => Some(entry),
            ChangeDocument::Redacted => None,
        }
    }

    pub fn old_value(&self) -> Option<&FieldValue> {
        self.entry().and_then(DiffEntry::lhs)
    }

    pub fn new_value(&self) -> Option<&FieldValue> {
        self.entry().and_then(DiffEntry::rhs)
    }

    pub fn is_redacted(&self) -> bool {
        matches!(self, ChangeDocument::Redacted)
    }
}
