//! Reads and bulk maintenance over recorded revisions.
//!
//! Every operation taking an id list treats an empty list as a no-op and
//! processes long lists in batches that stay under SQLite's bound-parameter
//! limit.

use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use revtrail_core::diff::DiffChunk;
use revtrail_core::errors::{ExError, ExErrorKind};
use revtrail_core::model::{ChangeDocument, Operation, Revision, RevisionChange, Snapshot};
use revtrail_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::errors::{from_rusqlite, serialization_error, Result};
use crate::recorder::{in_savepoint, to_millis};

/// Ids bound per statement
const BATCH_SIZE: usize = 500;

const REVISION_COLUMNS: &str =
    "id, model, document, operation, document_id, revision, created_at, updated_at";
const CHANGE_COLUMNS: &str = "id, path, document, diff, revision_id, created_at, updated_at";

/// Fields to overwrite on every matching Revision; `None` leaves a column alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionPatch {
    pub model: Option<String>,
    pub document: Option<Snapshot>,
}

/// Fields to overwrite on every matching RevisionChange
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionChangePatch {
    pub path: Option<String>,
    pub document: Option<ChangeDocument>,
    pub diff: Option<Vec<DiffChunk>>,
}

/// Row counts touched by [`redact_documents`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RedactionSummary {
    pub revisions: usize,
    pub changes: usize,
}

/// All revisions of the given documents, in storage order
pub fn find_all_by_document_ids(conn: &Connection, document_ids: &[String]) -> Result<Vec<Revision>> {
    let mut revisions = Vec::new();
    for batch in document_ids.chunks(BATCH_SIZE) {
        let sql = format!(
            "SELECT {} FROM revisions WHERE document_id IN ({}) ORDER BY rowid",
            REVISION_COLUMNS,
            placeholders(batch.len())
        );
        revisions.extend(select_revisions(conn, &sql, batch)?);
    }
    Ok(revisions)
}

/// Revisions of one document ordered by revision counter
pub fn history_for_document(conn: &Connection, document_id: &str) -> Result<Vec<Revision>> {
    let sql = format!(
        "SELECT {} FROM revisions WHERE document_id = ?1 ORDER BY revision, rowid",
        REVISION_COLUMNS
    );
    select_revisions(conn, &sql, &[document_id.to_string()])
}

/// Highest recorded revision counter of a document, if any
pub fn latest_revision_number(conn: &Connection, document_id: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT MAX(revision) FROM revisions WHERE document_id = ?1",
        [document_id],
        |row| row.get::<_, Option<i64>>(0),
    )
    .optional()
    .map(Option::flatten)
    .map_err(from_rusqlite)
}

/// Changes owned by the given revisions, in storage order
pub fn find_changes_by_revision_ids(
    conn: &Connection,
    revision_ids: &[String],
) -> Result<Vec<RevisionChange>> {
    let mut changes = Vec::new();
    for batch in revision_ids.chunks(BATCH_SIZE) {
        let sql = format!(
            "SELECT {} FROM revision_changes WHERE revision_id IN ({}) ORDER BY rowid",
            CHANGE_COLUMNS,
            placeholders(batch.len())
        );
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let raw = stmt
            .query_map(params_from_iter(batch.iter()), RawChange::from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        for row in raw {
            changes.push(row.decode()?);
        }
    }
    Ok(changes)
}

/// Patch every Revision of the given documents; returns the rows updated
///
/// # Errors
///
/// `Persistence` when an update fails; earlier batches stay applied.
pub fn update_by_document_ids(
    conn: &Connection,
    document_ids: &[String],
    patch: &RevisionPatch,
) -> Result<usize> {
    let mut assignments = Vec::new();
    if let Some(model) = &patch.model {
        assignments.push(("model", Value::Text(model.clone())));
    }
    if let Some(document) = &patch.document {
        let json = serde_json::to_string(document)
            .map_err(|e| serialization_error("update_by_document_ids", "document", e))?;
        assignments.push(("document", Value::Text(json)));
    }

    bulk_update(
        conn,
        "update_by_document_ids",
        "revisions",
        "document_id",
        document_ids,
        assignments,
    )
}

/// Patch every RevisionChange owned by the given revisions; returns the rows updated
///
/// # Errors
///
/// `Persistence` when an update fails; earlier batches stay applied.
pub fn update_by_revision_ids(
    conn: &Connection,
    revision_ids: &[String],
    patch: &RevisionChangePatch,
) -> Result<usize> {
    let mut assignments = Vec::new();
    if let Some(path) = &patch.path {
        assignments.push(("path", Value::Text(path.clone())));
    }
    if let Some(document) = &patch.document {
        let json = serde_json::to_string(document)
            .map_err(|e| serialization_error("update_by_revision_ids", "document", e))?;
        assignments.push(("document", Value::Text(json)));
    }
    if let Some(diff) = &patch.diff {
        let json = serde_json::to_string(diff)
            .map_err(|e| serialization_error("update_by_revision_ids", "diff", e))?;
        assignments.push(("diff", Value::Text(json)));
    }

    bulk_update(
        conn,
        "update_by_revision_ids",
        "revision_changes",
        "revision_id",
        revision_ids,
        assignments,
    )
}

/// Erase the recorded content of the given documents
///
/// Revision documents become empty and every owned change becomes
/// [`ChangeDocument::Redacted`] with an empty diff. Counters, operations and
/// timestamps of creation are kept. All rows change together or not at all.
///
/// # Errors
///
/// `Persistence` when any update fails; no row is changed in that case.
pub fn redact_documents(conn: &Connection, document_ids: &[String]) -> Result<RedactionSummary> {
    if document_ids.is_empty() {
        return Ok(RedactionSummary::default());
    }

    let start = Instant::now();
    log_op_start!("redact_documents", rows = document_ids.len() as u64);

    let result = in_savepoint(conn, |conn| {
        let revision_ids: Vec<String> = find_all_by_document_ids(conn, document_ids)?
            .into_iter()
            .map(|revision| revision.id)
            .collect();

        let changes = update_by_revision_ids(
            conn,
            &revision_ids,
            &RevisionChangePatch {
                path: None,
                document: Some(ChangeDocument::Redacted),
                diff: Some(Vec::new()),
            },
        )?;
        let revisions = update_by_document_ids(
            conn,
            document_ids,
            &RevisionPatch {
                model: None,
                document: Some(Snapshot::new()),
            },
        )?;

        Ok(RedactionSummary { revisions, changes })
    });

    match result {
        Ok(summary) => {
            log_op_end!(
                "redact_documents",
                duration_ms = start.elapsed().as_millis() as u64,
                rows = (summary.revisions + summary.changes) as u64
            );
            Ok(summary)
        }
        Err(err) => {
            let err = err.with_op("redact_documents");
            log_op_error!(
                "redact_documents",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            Err(err)
        }
    }
}

fn bulk_update(
    conn: &Connection,
    op: &str,
    table: &str,
    key_column: &str,
    ids: &[String],
    assignments: Vec<(&str, Value)>,
) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut set_clause: Vec<String> = assignments
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect();
    set_clause.push(format!("updated_at = ?{}", assignments.len() + 1));

    let mut fixed: Vec<Value> = assignments.into_iter().map(|(_, value)| value).collect();
    fixed.push(Value::Integer(to_millis(&Utc::now())));

    let mut updated = 0;
    for batch in ids.chunks(BATCH_SIZE) {
        let in_list = (0..batch.len())
            .map(|i| format!("?{}", fixed.len() + i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} IN ({})",
            table,
            set_clause.join(", "),
            key_column,
            in_list
        );

        let params = fixed
            .iter()
            .cloned()
            .chain(batch.iter().cloned().map(Value::Text));
        updated += conn
            .execute(&sql, params_from_iter(params))
            .map_err(|e| from_rusqlite(e).with_op(op.to_string()))?;
    }

    tracing::debug!(op, table, rows = updated, "Bulk update applied");
    Ok(updated)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn select_revisions(conn: &Connection, sql: &str, params: &[String]) -> Result<Vec<Revision>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let raw = stmt
        .query_map(params_from_iter(params.iter()), RawRevision::from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    raw.into_iter().map(RawRevision::decode).collect()
}

/// `revisions` row before its JSON and timestamp columns are decoded
struct RawRevision {
    id: String,
    model: String,
    document: String,
    operation: String,
    document_id: String,
    revision: i64,
    created_at: i64,
    updated_at: i64,
}

impl RawRevision {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            model: row.get(1)?,
            document: row.get(2)?,
            operation: row.get(3)?,
            document_id: row.get(4)?,
            revision: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Revision> {
        let document: Snapshot = serde_json::from_str(&self.document)
            .map_err(|e| serialization_error("decode_revision", "document", e))?;
        let operation: Operation = self.operation.parse()?;
        Ok(Revision {
            created_at: from_millis(self.created_at, &self.id)?,
            updated_at: from_millis(self.updated_at, &self.id)?,
            id: self.id,
            model: self.model,
            document,
            operation,
            document_id: self.document_id,
            revision: self.revision,
        })
    }
}

/// `revision_changes` row before its JSON and timestamp columns are decoded
struct RawChange {
    id: String,
    path: String,
    document: String,
    diff: String,
    revision_id: String,
    created_at: i64,
    updated_at: i64,
}

impl RawChange {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            document: row.get(2)?,
            diff: row.get(3)?,
            revision_id: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<RevisionChange> {
        let document: ChangeDocument = serde_json::from_str(&self.document)
            .map_err(|e| serialization_error("decode_change", "document", e))?;
        let diff: Vec<DiffChunk> = serde_json::from_str(&self.diff)
            .map_err(|e| serialization_error("decode_change", "diff", e))?;
        Ok(RevisionChange {
            created_at: from_millis(self.created_at, &self.id)?,
            updated_at: from_millis(self.updated_at, &self.id)?,
            id: self.id,
            path: self.path,
            document,
            diff,
            revision_id: self.revision_id,
        })
    }
}

fn from_millis(millis: i64, row_id: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        ExError::new(ExErrorKind::Serialization)
            .with_op("decode_timestamp")
            .with_entity_id(row_id)
            .with_message(format!("timestamp {} out of range", millis))
    })
}
