use serde::{Deserialize, Serialize};

use super::value::Snapshot;

/// Kind of mutation being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Destroy,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = crate::errors::ExError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "destroy" => Ok(Operation::Destroy),
            other => Err(
                crate::errors::ExError::new(crate::errors::ExErrorKind::InvalidInput)
                    .with_op("parse_operation")
                    .with_message(format!("unknown operation '{}'", other)),
            ),
        }
    }
}

/// A persisted domain record whose writes are audited
///
/// The `revision` counter belongs to the tracker: hosts read it, but only
/// [`crate::interceptor::prepare`] assigns it.
pub trait Tracked {
    /// Entity type label stored verbatim on every Revision
    fn model(&self) -> &str;

    fn document_id(&self) -> String;

    /// Committed revision counter; `None` when the record carries none
    fn revision(&self) -> Option<i64>;

    fn set_revision(&mut self, revision: i64);

    /// All top-level fields, meta fields included
    fn snapshot(&self) -> Snapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_round_trips_through_str() {
        for op in [Operation::Create, Operation::Update, Operation::Destroy] {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("delete".parse::<Operation>().is_err());
    }

    #[test]
    fn test_operation_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&Operation::Destroy).unwrap(),
            "\"destroy\""
        );
    }
}
