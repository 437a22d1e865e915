//! Canonical schema constants for structured logging
//!
//! These keys are shared by the logging macros, the test capture layer and
//! any log consumer, so they must not drift.

// Canonical field keys
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Audit identifiers
pub const FIELD_MODEL: &str = "model";
pub const FIELD_DOCUMENT_ID: &str = "document_id";
pub const FIELD_OPERATION: &str = "operation";
pub const FIELD_REVISION: &str = "revision";

// Collection sizes
pub const FIELD_DELTA_LEN: &str = "delta_len";
pub const FIELD_ROWS: &str = "rows";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
