//! Canonical logging macros
//!
//! Every tracked operation logs exactly one start event and exactly one
//! terminal event (`end` or `end_error`).

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use revtrail_core::log_op_start;
/// log_op_start!("prepare");
/// log_op_start!("prepare", model = "profile", document_id = "p1");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_START,
        )
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_START,
            $($field)*
        )
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use revtrail_core::log_op_end;
/// log_op_end!("record", duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_END,
            duration_ms = $duration,
        )
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        )
    };
}

/// Log an operation error
///
/// Accepts anything convertible into `ExError` and records its kind and code.
///
/// # Example
///
/// ```
/// # use revtrail_core::log_op_error;
/// # use revtrail_core::errors::{ExError, ExErrorKind};
/// let err = ExError::new(ExErrorKind::Persistence);
/// log_op_error!("record", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            err.message = ex_err.message(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            err.message = ex_err.message(),
            $($field)*
        );
    }};
}
