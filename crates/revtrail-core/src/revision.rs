//! Revision planning.
//!
//! A [`ChangeSet`] is what the interceptor hands to the recorder: the new
//! counter, the sanitized document and the delta. [`ChangeSet::planned_changes`]
//! turns the delta into the per-field rows the recorder persists, without
//! touching storage.

use serde::{Deserialize, Serialize};

use crate::diff::{diff_chars, DiffChunk, DiffEntry};
use crate::model::{ChangeDocument, Operation, Snapshot};
use crate::normalize::normalize;

/// Outcome of a tracked mutation that must be recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub model: String,
    pub document_id: String,
    pub operation: Operation,
    /// Committed counter the write was based on (0 for create)
    pub base_revision: i64,
    /// Counter assigned to the entity, always `base_revision + 1`
    pub revision: i64,
    /// Sanitized post-mutation snapshot
    pub document: Snapshot,
    /// Empty for a destroy with no field changes
    pub delta: Vec<DiffEntry>,
}

/// One RevisionChange row, before ids and timestamps are assigned
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub path: String,
    pub document: ChangeDocument,
    pub diff: Vec<DiffChunk>,
}

impl ChangeSet {
    /// Change rows for this revision in delta order
    ///
    /// Destroy revisions carry no change rows.
    pub fn planned_changes(&self) -> Vec<PlannedChange> {
        if self.operation == Operation::Destroy {
            return Vec::new();
        }

        self.delta
            .iter()
            .filter_map(|entry| {
                let path = entry.field()?.to_string();
                let old = normalize(entry.lhs());
                let new = normalize(entry.rhs());
                Some(PlannedChange {
                    path,
                    diff: diff_chars(&old, &new),
                    document: ChangeDocument::from_entry(entry.clone()),
                })
            })
            .collect()
    }
}
