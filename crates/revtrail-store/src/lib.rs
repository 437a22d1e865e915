//! revtrail Store - SQLite persistence for the audit trail
//!
//! Provides:
//! - Connection helpers and embedded, checksummed migrations
//! - The revision recorder (`recorder::record`)
//! - Bulk reads, patches and redaction over recorded revisions (`query`)

pub mod db;
pub mod errors;
pub mod migrations;
pub mod query;
pub mod recorder;

// Re-export key types
pub use errors::Result;
pub use query::{RedactionSummary, RevisionChangePatch, RevisionPatch};
pub use recorder::{record, RecordedRevision};
