//! Audit trail commands: read a document's history, redact documents.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use revtrail_core::model::{Revision, RevisionChange};
use revtrail_core::{log_op_end, log_op_error, log_op_start};
use revtrail_core_types::RequestContext;
use revtrail_store::errors::Result;
use revtrail_store::query::{find_changes_by_revision_ids, history_for_document, redact_documents};
use revtrail_store::RedactionSummary;
use rusqlite::Connection;
use serde::Serialize;

/// Engine-level audit commands
#[derive(Debug, Clone)]
pub enum AuditCommand {
    /// Full history of each document, oldest revision first
    History { document_ids: Vec<String> },
    /// Erase recorded content of each document
    Redact { document_ids: Vec<String> },
}

/// Result of applying an audit command
#[derive(Debug, Clone)]
pub enum AuditCommandResult {
    History(Vec<DocumentHistory>),
    Redacted(RedactionSummary),
}

/// Revisions of one document with their changes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHistory {
    pub document_id: String,
    pub revisions: Vec<RevisionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionEntry {
    #[serde(flatten)]
    pub revision: Revision,
    pub changes: Vec<RevisionChange>,
}

/// Apply an audit command on behalf of a request
///
/// # Errors
///
/// `Persistence` or `Serialization` from the underlying queries.
pub fn apply_audit_command(
    cmd: AuditCommand,
    conn: &Connection,
    ctx: &RequestContext,
) -> Result<AuditCommandResult> {
    let (op, document_ids) = match &cmd {
        AuditCommand::History { document_ids } => ("audit_history", document_ids),
        AuditCommand::Redact { document_ids } => ("audit_redact", document_ids),
    };
    let start = Instant::now();
    log_op_start!(
        op,
        request_id = ctx.request_id.as_str(),
        rows = document_ids.len() as u64
    );

    let result = match &cmd {
        AuditCommand::History { document_ids } => {
            document_history(conn, document_ids).map(AuditCommandResult::History)
        }
        AuditCommand::Redact { document_ids } => {
            redact_documents(conn, document_ids).map(AuditCommandResult::Redacted)
        }
    };

    match result {
        Ok(result) => {
            log_op_end!(
                op,
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = ctx.request_id.as_str()
            );
            Ok(result)
        }
        Err(err) => {
            let err = err.with_request_id(ctx.request_id.clone());
            log_op_error!(
                op,
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = ctx.request_id.as_str()
            );
            Err(err)
        }
    }
}

/// History of each requested document, in request order without duplicates
///
/// Documents without revisions are returned with an empty list.
pub fn document_history(conn: &Connection, document_ids: &[String]) -> Result<Vec<DocumentHistory>> {
    let mut seen = BTreeSet::new();
    let mut histories = Vec::new();
    for document_id in document_ids {
        if !seen.insert(document_id.as_str()) {
            continue;
        }
        histories.push((document_id.clone(), history_for_document(conn, document_id)?));
    }

    let revision_ids: Vec<String> = histories
        .iter()
        .flat_map(|(_, revisions)| revisions.iter().map(|r| r.id.clone()))
        .collect();
    let mut changes_by_revision: BTreeMap<String, Vec<RevisionChange>> = BTreeMap::new();
    for change in find_changes_by_revision_ids(conn, &revision_ids)? {
        changes_by_revision
            .entry(change.revision_id.clone())
            .or_default()
            .push(change);
    }

    Ok(histories
        .into_iter()
        .map(|(document_id, revisions)| DocumentHistory {
            document_id,
            revisions: revisions
                .into_iter()
                .map(|revision| RevisionEntry {
                    changes: changes_by_revision.remove(&revision.id).unwrap_or_default(),
                    revision,
                })
                .collect(),
        })
        .collect())
}
