//! Revision recording.
//!
//! Persists a [`ChangeSet`] produced by the interceptor as one `revisions`
//! row plus one `revision_changes` row per changed top-level field. The rows
//! are written inside a savepoint, so the call composes with an enclosing
//! transaction: pass a `&Transaction` to record in the same unit of work as
//! the domain write, or a plain `&Connection` to record on its own.

use std::time::Instant;

use chrono::{DateTime, SubsecRound, Utc};
use revtrail_core::model::{Revision, RevisionChange};
use revtrail_core::revision::ChangeSet;
use revtrail_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::Connection;
use uuid::Uuid;

use crate::errors::{from_rusqlite, serialization_error, Result};

const SAVEPOINT: &str = "revtrail_record";

/// Rows written for one recorded revision
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRevision {
    pub revision: Revision,
    pub changes: Vec<RevisionChange>,
}

/// Persist a change set as a Revision and its RevisionChanges.
///
/// ## Errors
///
/// - `ExErrorKind::Persistence`: an insert failed; nothing from this call is kept
/// - `ExErrorKind::Serialization`: a document could not be encoded
pub fn record(conn: &Connection, change_set: &ChangeSet) -> Result<RecordedRevision> {
    let start = Instant::now();
    log_op_start!(
        "record",
        model = change_set.model.as_str(),
        document_id = change_set.document_id.as_str(),
        revision = change_set.revision
    );

    match in_savepoint(conn, |conn| insert_rows(conn, change_set)) {
        Ok(recorded) => {
            log_op_end!(
                "record",
                duration_ms = start.elapsed().as_millis() as u64,
                revision_id = recorded.revision.id.as_str(),
                rows = recorded.changes.len() as u64
            );
            Ok(recorded)
        }
        Err(err) => {
            let err = err
                .with_op("record")
                .with_model(change_set.model.as_str())
                .with_entity_id(change_set.document_id.as_str())
                .with_revision(change_set.revision);
            log_op_error!(
                "record",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                document_id = change_set.document_id.as_str()
            );
            Err(err)
        }
    }
}

/// Run `body` inside a named savepoint, rolling back to it on error
pub(crate) fn in_savepoint<T>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {}", SAVEPOINT))
        .map_err(from_rusqlite)?;

    match body(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {}", SAVEPOINT))
                .map_err(from_rusqlite)?;
            Ok(value)
        }
        Err(err) => {
            // Keep the original error even if the rollback itself fails
            if let Err(rollback) = conn.execute_batch(&format!(
                "ROLLBACK TO {sp}; RELEASE {sp}",
                sp = SAVEPOINT
            )) {
                tracing::warn!(error = %rollback, "Savepoint rollback failed");
            }
            Err(err)
        }
    }
}

fn insert_rows(conn: &Connection, change_set: &ChangeSet) -> Result<RecordedRevision> {
    // Stored with millisecond precision
    let now = Utc::now().trunc_subsecs(3);

    let revision = Revision {
        id: Uuid::now_v7().to_string(),
        model: change_set.model.clone(),
        document: change_set.document.clone(),
        operation: change_set.operation,
        document_id: change_set.document_id.clone(),
        revision: change_set.revision,
        created_at: now,
        updated_at: now,
    };
    insert_revision(conn, &revision)?;

    let changes = change_set
        .planned_changes()
        .into_iter()
        .map(|planned| RevisionChange {
            id: Uuid::now_v7().to_string(),
            path: planned.path,
            document: planned.document,
            diff: planned.diff,
            revision_id: revision.id.clone(),
            created_at: now,
            updated_at: now,
        })
        .collect::<Vec<_>>();

    for change in &changes {
        insert_change(conn, change)?;
    }

    Ok(RecordedRevision { revision, changes })
}

fn insert_revision(conn: &Connection, revision: &Revision) -> Result<()> {
    let document = serde_json::to_string(&revision.document)
        .map_err(|e| serialization_error("record", "document", e))?;

    conn.execute(
        r#"
        INSERT INTO revisions (
            id, model, document, operation, document_id, revision, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        rusqlite::params![
            revision.id,
            revision.model,
            document,
            revision.operation.as_str(),
            revision.document_id,
            revision.revision,
            to_millis(&revision.created_at),
            to_millis(&revision.updated_at),
        ],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

fn insert_change(conn: &Connection, change: &RevisionChange) -> Result<()> {
    let document = serde_json::to_string(&change.document)
        .map_err(|e| serialization_error("record", "document", e))?;
    let diff = serde_json::to_string(&change.diff)
        .map_err(|e| serialization_error("record", "diff", e))?;

    conn.execute(
        r#"
        INSERT INTO revision_changes (
            id, path, document, diff, revision_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        rusqlite::params![
            change.id,
            change.path,
            document,
            diff,
            change.revision_id,
            to_millis(&change.created_at),
            to_millis(&change.updated_at),
        ],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

pub(crate) fn to_millis(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
