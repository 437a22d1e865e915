//! Core types shared across revtrail facilities
//!
//! - **Correlation types**: RequestId, TraceId, RequestContext
//! - **Schema constants**: Canonical field keys and event names used by the
//!   logging facility and by audit rows

pub mod correlation;
pub mod schema;

pub use correlation::{RequestContext, RequestId, TraceId};
