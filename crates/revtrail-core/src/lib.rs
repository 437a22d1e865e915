//! revtrail Core - change tracking kernel
//!
//! This crate provides the storage-independent half of revision tracking:
//! - Value model (`FieldValue`, `Snapshot`) and the `Tracked` host trait
//! - Value normalization and structural / character diffing
//! - The change interceptor (`prepare`) and revision planning (`ChangeSet`)
//! - Tracking configuration (excluded fields, allow-lists, audit mode)
//! - Error and logging facilities shared by every revtrail crate

pub mod config;
pub mod diff;
pub mod errors;
pub mod interceptor;
pub mod logging_facility;
pub mod model;
pub mod normalize;
pub mod revision;

#[doc(hidden)]
pub use revtrail_core_types::schema as __schema;

// Re-export commonly used types
pub use config::{AuditMode, FieldPolicy, TrackingConfig};
pub use errors::{ExError, ExErrorKind, Result, TrackingError};
pub use interceptor::{prepare, sanitize};
pub use model::{ChangeDocument, FieldValue, Operation, Revision, RevisionChange, Snapshot, Tracked};
pub use normalize::normalize;
pub use revision::{ChangeSet, PlannedChange};
