//! Tracking configuration
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! excluded_fields = ["id", "createdAt", "updatedAt", "deletedAt", "revision"]
//! audit_mode = "post_commit"
//!
//! [tracked_fields]
//! profile = ["firstName", "lastName", "email"]
//! ```

use crate::errors::{ExError, Result, TrackingError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Meta fields that never take part in a diff
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &[
    "id",
    "createdAt",
    "updatedAt",
    "deletedAt",
    "revision",
    "created_at",
    "updated_at",
    "deleted_at",
];

/// Whether audit rows share the transaction of the domain write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// Domain write and audit rows commit or roll back together
    #[default]
    Transactional,
    /// Domain write commits first; a failing audit write leaves it committed
    PostCommit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingConfig {
    pub excluded_fields: BTreeSet<String>,
    /// Per-model allow-list of trackable top-level fields
    pub tracked_fields: BTreeMap<String, BTreeSet<String>>,
    pub audit_mode: AuditMode,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            excluded_fields: DEFAULT_EXCLUDED_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tracked_fields: BTreeMap::new(),
            audit_mode: AuditMode::default(),
        }
    }
}

impl TrackingConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// `Config` when the document is not valid TOML or names unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TrackingConfig = toml::from_str(text).map_err(|e| {
            ExError::from(TrackingError::InvalidConfig {
                message: e.to_string(),
            })
            .with_op("load_config")
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, `Config` when it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(crate::errors::ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_audit_mode(mut self, mode: AuditMode) -> Self {
        self.audit_mode = mode;
        self
    }

    pub fn with_tracked_fields<I, S>(mut self, model: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_fields.insert(
            model.to_string(),
            fields.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Resolve the field policy for one model
    pub fn policy_for(&self, model: &str) -> FieldPolicy {
        FieldPolicy {
            excluded: self.excluded_fields.clone(),
            allowed: self.tracked_fields.get(model).cloned(),
        }
    }

    fn validate(&self) -> Result<()> {
        for (model, fields) in &self.tracked_fields {
            if let Some(field) = fields.iter().find(|f| self.excluded_fields.contains(*f)) {
                return Err(TrackingError::InvalidConfig {
                    message: format!(
                        "tracked field '{}' of model '{}' is also excluded",
                        field, model
                    ),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Which top-level fields of one model take part in diffing
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPolicy {
    excluded: BTreeSet<String>,
    allowed: Option<BTreeSet<String>>,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        TrackingConfig::default().policy_for("")
    }
}

impl FieldPolicy {
    pub fn is_excluded(&self, field: &str) -> bool {
        self.excluded.contains(field)
    }

    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    /// True when `field` is neither excluded nor outside the allow-list
    pub fn is_trackable(&self, field: &str) -> bool {
        if self.is_excluded(field) {
            return false;
        }
        match &self.allowed {
            Some(allowed) => allowed.contains(field),
            None => true,
        }
    }
}
