use revtrail_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers and tests can match on
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Validation
    InvalidInput,
    NotFound,

    // Tracking
    /// The revision counter is missing where the tracker requires one
    TrackingInvariant,
    /// Compare-and-set on the revision counter lost against another writer
    Concurrency,

    // Integration/IO
    Persistence,
    Serialization,
    Config,
    Io,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::TrackingInvariant => "ERR_TRACKING_INVARIANT",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification (`kind`) for programmatic handling plus optional
/// audit context (model, document id, revision) for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    model: Option<String>,
    entity_id: Option<String>,
    revision: Option<i64>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            model: None,
            entity_id: None,
            revision: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add model (entity type label) context
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add entity (document) ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add revision counter context
    pub fn with_revision(mut self, revision: i64) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn revision(&self) -> Option<i64> {
        self.revision
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(model) = &self.model {
            write!(f, " (model: {})", model)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(revision) = self.revision {
            write!(f, " (revision: {})", revision)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Domain errors raised while tracking a write
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    /// An update reached the interceptor without a committed revision counter
    #[error("{model} {document_id} has no revision counter; update cannot be tracked")]
    MissingRevision { model: String, document_id: String },

    /// The committed state handed to the interceptor belongs to another entity
    #[error("previous state of {model} belongs to {found}, expected {expected}")]
    PreviousStateMismatch {
        model: String,
        expected: String,
        found: String,
    },

    /// Update or destroy without the committed state it applies to
    #[error("{operation} of {model} {document_id} requires the committed state")]
    MissingPreviousState {
        model: String,
        document_id: String,
        operation: String,
    },

    /// Compare-and-set on the revision counter found a different value
    #[error("{model} {document_id} expected revision {expected} but found {found:?}")]
    RevisionConflict {
        model: String,
        document_id: String,
        expected: i64,
        found: Option<i64>,
    },

    /// Entity is not present in the host store
    #[error("{model} {document_id} not found")]
    EntityNotFound { model: String, document_id: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl From<TrackingError> for ExError {
    fn from(err: TrackingError) -> Self {
        let message = err.to_string();
        match err {
            TrackingError::MissingRevision { model, document_id } => {
                ExError::new(ExErrorKind::TrackingInvariant)
                    .with_model(model)
                    .with_entity_id(document_id)
                    .with_message(message)
            }
            TrackingError::PreviousStateMismatch { model, found, .. } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_model(model)
                    .with_entity_id(found)
                    .with_message(message)
            }
            TrackingError::MissingPreviousState {
                model, document_id, ..
            } => ExError::new(ExErrorKind::InvalidInput)
                .with_model(model)
                .with_entity_id(document_id)
                .with_message(message),
            TrackingError::RevisionConflict {
                model,
                document_id,
                expected,
                ..
            } => ExError::new(ExErrorKind::Concurrency)
                .with_model(model)
                .with_entity_id(document_id)
                .with_revision(expected)
                .with_message(message),
            TrackingError::EntityNotFound { model, document_id } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_model(model)
                    .with_entity_id(document_id)
                    .with_message(message)
            }
            TrackingError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
            TrackingError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::Config).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        TrackingError::Serialization {
            message: err.to_string(),
        }
        .into()
    }
}
