//! Diff engines.
//!
//! - [`engine::compute_delta`] compares two sanitized snapshots and returns
//!   path-aware [`DiffEntry`] values.
//! - [`chars::diff_chars`] compares two normalized strings character by
//!   character for storage on each RevisionChange.
//!
//! ```
//! use revtrail_core::diff::{compute_delta, Comparison};
//! use revtrail_core::model::Snapshot;
//! use std::collections::BTreeSet;
//!
//! let before = Snapshot::new().with("name", "Alice");
//! let after = Snapshot::new().with("name", "Alicia");
//! let delta = compute_delta(&before, &after, &BTreeSet::new(), Comparison::Exact).unwrap();
//! assert_eq!(delta[0].field(), Some("name"));
//! ```

pub mod chars;
pub mod engine;
pub mod model;

pub use chars::{diff_chars, DiffChunk};
pub use engine::{coerced_equals, compute_delta, exact_equals, Comparison};
pub use model::{ArrayItem, DiffEntry, DiffKind};
