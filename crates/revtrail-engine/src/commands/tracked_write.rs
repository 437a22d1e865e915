//! Tracked write orchestration.
//!
//! ## Pipeline (in order):
//! 1. Load the committed state from the host store (update, destroy)
//! 2. Reject a stale caller revision (Concurrency, no writes)
//! 3. Interceptor: sanitize, diff, assign the next revision
//! 4. Compare-and-set domain write (zero rows → Concurrency)
//! 5. Record the revision, in the same transaction or after commit per `AuditMode`

use std::time::Instant;

use revtrail_core::config::{AuditMode, TrackingConfig};
use revtrail_core::errors::{ExError, TrackingError};
use revtrail_core::model::{Operation, Tracked};
use revtrail_core::revision::ChangeSet;
use revtrail_core::{log_op_end, log_op_error, log_op_start, prepare};
use revtrail_core_types::RequestContext;
use revtrail_store::errors::{from_rusqlite, Result};
use revtrail_store::{record, RecordedRevision};
use rusqlite::{Connection, TransactionBehavior};

use crate::entity_store::EntityStore;

/// Result of a tracked write
#[derive(Debug, Clone)]
pub struct WriteOutcome<T> {
    /// The entity as written, carrying its assigned revision
    pub entity: T,
    /// `None` when the write changed no tracked field
    pub recorded: Option<RecordedRevision>,
}

/// Performs create/update/destroy on a host store with revision tracking
#[derive(Debug, Clone)]
pub struct TrackedWriter<S> {
    store: S,
    config: TrackingConfig,
}

impl<S> TrackedWriter<S> {
    pub fn new(store: S, config: TrackingConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Insert a new entity and record its first revision
    ///
    /// # Errors
    ///
    /// `Persistence` when the insert or the audit write fails.
    pub fn create<T>(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        entity: T,
    ) -> Result<WriteOutcome<T>>
    where
        T: Tracked,
        S: EntityStore<T>,
    {
        self.write(conn, ctx, Operation::Create, entity)
    }

    /// Write the pending state of an existing entity
    ///
    /// `entity.revision()` is the counter the caller read; when present it
    /// must still be the committed one.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the entity has no committed state
    /// - `Concurrency` when another writer committed first
    /// - `TrackingInvariant` when the committed state has no revision counter
    pub fn update<T>(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        entity: T,
    ) -> Result<WriteOutcome<T>>
    where
        T: Tracked,
        S: EntityStore<T>,
    {
        self.write(conn, ctx, Operation::Update, entity)
    }

    /// Delete an entity; always records a destroy revision
    ///
    /// # Errors
    ///
    /// - `NotFound` when the entity has no committed state
    /// - `Concurrency` when another writer committed first
    pub fn destroy<T>(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        entity: T,
    ) -> Result<WriteOutcome<T>>
    where
        T: Tracked,
        S: EntityStore<T>,
    {
        self.write(conn, ctx, Operation::Destroy, entity)
    }

    fn write<T>(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        operation: Operation,
        mut entity: T,
    ) -> Result<WriteOutcome<T>>
    where
        T: Tracked,
        S: EntityStore<T>,
    {
        let op = op_name(operation);
        let start = Instant::now();
        let document_id = entity.document_id();

        log_op_start!(
            op,
            request_id = ctx.request_id.as_str(),
            trace_id = ctx.trace_id.as_ref().map(|t| t.as_str()),
            model = entity.model(),
            document_id = document_id.as_str()
        );

        let result = match self.config.audit_mode {
            AuditMode::Transactional => self.write_transactional(conn, operation, &mut entity),
            AuditMode::PostCommit => self.write_post_commit(conn, operation, &mut entity),
        };

        match result {
            Ok(recorded) => {
                log_op_end!(
                    op,
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str(),
                    document_id = document_id.as_str(),
                    revision = entity.revision().unwrap_or_default(),
                    recorded = recorded.is_some()
                );
                Ok(WriteOutcome { entity, recorded })
            }
            Err(err) => {
                let err = with_request_context(err, op, ctx);
                log_op_error!(
                    op,
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str(),
                    document_id = document_id.as_str()
                );
                Err(err)
            }
        }
    }

    /// Domain write and audit rows commit or roll back together
    fn write_transactional<T>(
        &self,
        conn: &mut Connection,
        operation: Operation,
        entity: &mut T,
    ) -> Result<Option<RecordedRevision>>
    where
        T: Tracked,
        S: EntityStore<T>,
    {
        // Take the write lock up front so concurrent writers queue on busy_timeout
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;

        let change_set = self.apply_domain(&tx, operation, entity)?;
        let recorded = change_set.as_ref().map(|set| record(&tx, set)).transpose()?;

        tx.commit().map_err(from_rusqlite)?;
        Ok(recorded)
    }

    /// Domain write commits first; a failed audit write leaves it in place
    fn write_post_commit<T>(
        &self,
        conn: &mut Connection,
        operation: Operation,
        entity: &mut T,
    ) -> Result<Option<RecordedRevision>>
    where
        T: Tracked,
        S: EntityStore<T>,
    {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;
        let change_set = self.apply_domain(&tx, operation, entity)?;
        tx.commit().map_err(from_rusqlite)?;

        match change_set {
            Some(set) => record(conn, &set).map(Some),
            None => Ok(None),
        }
    }

    fn apply_domain<T>(
        &self,
        conn: &Connection,
        operation: Operation,
        entity: &mut T,
    ) -> Result<Option<ChangeSet>>
    where
        T: Tracked,
        S: EntityStore<T>,
    {
        let policy = self.config.policy_for(entity.model());

        if operation == Operation::Create {
            let change_set = prepare(None, entity, operation, &policy)?;
            self.store.insert(conn, entity)?;
            return Ok(change_set);
        }

        let model = entity.model().to_string();
        let document_id = entity.document_id();
        let previous = self
            .store
            .load(conn, &document_id)?
            .ok_or_else(|| TrackingError::EntityNotFound {
                model: model.clone(),
                document_id: document_id.clone(),
            })?;

        if let (Some(expected), Some(committed)) = (entity.revision(), previous.revision()) {
            if expected != committed {
                return Err(TrackingError::RevisionConflict {
                    model,
                    document_id,
                    expected,
                    found: Some(committed),
                }
                .into());
            }
        }

        // A destroy may hit a row that never carried a counter
        let committed = previous.revision();
        let change_set = prepare(Some(&previous), entity, operation, &policy)?;

        let affected = match operation {
            Operation::Destroy => self.store.delete(conn, entity, committed)?,
            _ => self.store.update(conn, entity, committed)?,
        };
        if affected == 0 {
            let found = self
                .store
                .load(conn, &document_id)?
                .and_then(|current| current.revision());
            return Err(TrackingError::RevisionConflict {
                model,
                document_id,
                expected: committed.unwrap_or_default(),
                found,
            }
            .into());
        }

        Ok(change_set)
    }
}

fn op_name(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "tracked_create",
        Operation::Update => "tracked_update",
        Operation::Destroy => "tracked_destroy",
    }
}

fn with_request_context(err: ExError, op: &str, ctx: &RequestContext) -> ExError {
    let err = if err.op().is_none() {
        err.with_op(op.to_string())
    } else {
        err
    };
    let err = err.with_request_id(ctx.request_id.clone());
    match &ctx.trace_id {
        Some(trace_id) => err.with_trace_id(trace_id.clone()),
        None => err,
    }
}
