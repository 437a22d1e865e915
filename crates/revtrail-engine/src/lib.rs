//! revtrail Engine - Orchestration layer
//!
//! Coordinates a tracked write end to end: load the committed state from the
//! host store, run the interceptor, perform the compare-and-set domain write,
//! then record the revision according to the configured audit mode.

pub mod commands;
pub mod entity_store;

pub use commands::audit::{
    apply_audit_command, document_history, AuditCommand, AuditCommandResult, DocumentHistory,
    RevisionEntry,
};
pub use commands::tracked_write::{TrackedWriter, WriteOutcome};
pub use entity_store::EntityStore;
