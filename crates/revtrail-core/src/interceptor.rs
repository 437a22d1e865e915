//! Change interception for tracked writes.
//!
//! [`prepare`] runs on the write's critical path, before the domain store is
//! touched. It assigns the next revision counter and returns the
//! [`ChangeSet`] the recorder will persist. An error aborts the write.

use std::time::Instant;

use crate::config::FieldPolicy;
use crate::diff::{compute_delta, Comparison};
use crate::errors::{ExError, ExErrorKind, Result, TrackingError};
use crate::model::{Operation, Snapshot, Tracked};
use crate::revision::ChangeSet;
use crate::{log_op_end, log_op_error, log_op_start};

/// Drop fields that never take part in diffing
///
/// Removes nested values (objects and arrays; dates are scalars here),
/// excluded names, and names outside the model's allow-list.
pub fn sanitize(snapshot: Snapshot, policy: &FieldPolicy) -> Snapshot {
    snapshot
        .into_iter()
        .filter(|(field, value)| !value.is_nested() && policy.is_trackable(field))
        .collect()
}

/// Compare the committed state with the pending one and assign the next revision
///
/// `previous` is the last committed state of the entity (`None` for create).
/// Returns `Some(ChangeSet)` when a Revision must be recorded: always for
/// destroy, otherwise only when at least one tracked field changed. When
/// nothing changed `next` keeps the committed counter and `None` is returned.
///
/// # Errors
///
/// - `TrackingInvariant` when an update's committed state has no revision counter
/// - `InvalidInput` when update/destroy lack a committed state, or it belongs
///   to another entity
pub fn prepare<T: Tracked>(
    previous: Option<&T>,
    next: &mut T,
    operation: Operation,
    policy: &FieldPolicy,
) -> Result<Option<ChangeSet>> {
    let start = Instant::now();
    let model = next.model().to_string();
    let document_id = next.document_id();

    log_op_start!(
        "prepare",
        model = model.as_str(),
        document_id = document_id.as_str(),
        operation = operation.as_str()
    );

    match prepare_inner(previous, next, operation, policy) {
        Ok(change_set) => {
            let duration = start.elapsed().as_millis() as u64;
            match &change_set {
                Some(set) => {
                    log_op_end!(
                        "prepare",
                        duration_ms = duration,
                        document_id = document_id.as_str(),
                        revision = set.revision,
                        delta_len = set.delta.len() as u64
                    );
                }
                None => {
                    log_op_end!(
                        "prepare",
                        duration_ms = duration,
                        document_id = document_id.as_str(),
                        delta_len = 0u64
                    );
                }
            }
            Ok(change_set)
        }
        Err(err) => {
            let err = err.with_op("prepare");
            log_op_error!(
                "prepare",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            Err(err)
        }
    }
}

fn prepare_inner<T: Tracked>(
    previous: Option<&T>,
    next: &mut T,
    operation: Operation,
    policy: &FieldPolicy,
) -> Result<Option<ChangeSet>> {
    let model = next.model().to_string();
    let document_id = next.document_id();

    let previous = match (operation, previous) {
        (Operation::Create, _) => None,
        (_, Some(prev)) => {
            if prev.document_id() != document_id || prev.model() != model {
                return Err(TrackingError::PreviousStateMismatch {
                    model,
                    expected: document_id,
                    found: prev.document_id(),
                }
                .into());
            }
            Some(prev)
        }
        (_, None) => {
            return Err(TrackingError::MissingPreviousState {
                model,
                document_id,
                operation: operation.to_string(),
            }
            .into());
        }
    };

    let base_revision = match (operation, previous.and_then(|prev| prev.revision())) {
        (Operation::Create, _) => 0,
        (_, Some(revision)) => revision,
        (Operation::Update, None) => {
            return Err(TrackingError::MissingRevision { model, document_id }.into());
        }
        (Operation::Destroy, None) => 0,
    };

    // The counter belongs to the tracker; whatever the caller put there is discarded
    next.set_revision(base_revision);

    let before = previous
        .map(|prev| sanitize(prev.snapshot(), policy))
        .unwrap_or_default();
    let mut after = sanitize(next.snapshot(), policy);
    // Fields first populated by this update are stored but not diffed
    if operation == Operation::Update {
        after.retain(|field, _| before.contains_key(field));
    }

    let delta = compute_delta(&before, &after, policy.excluded(), Comparison::Exact);
    if operation != Operation::Destroy && delta.is_none() {
        return Ok(None);
    }

    let revision = base_revision.checked_add(1).ok_or_else(|| {
        ExError::new(ExErrorKind::TrackingInvariant)
            .with_model(model.as_str())
            .with_entity_id(document_id.as_str())
            .with_revision(base_revision)
            .with_message("revision counter overflow")
    })?;
    next.set_revision(revision);
    let document = sanitize(next.snapshot(), policy);

    Ok(Some(ChangeSet {
        model,
        document_id,
        operation,
        base_revision,
        revision,
        document,
        delta: delta.unwrap_or_default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingConfig;
    use crate::model::FieldValue;
    use serde_json::json;

    #[derive(Debug, Clone)]
    struct Profile {
        id: String,
        name: String,
        email: Option<String>,
        skills: Vec<String>,
        revision: Option<i64>,
    }

    impl Profile {
        fn new(id: &str, name: &str, revision: Option<i64>) -> Self {
            Self {
                id: id.to_string(),
                name: name.to_string(),
                email: None,
                skills: Vec::new(),
                revision,
            }
        }
    }

    impl Tracked for Profile {
        fn model(&self) -> &str {
            "profile"
        }

        fn document_id(&self) -> String {
            self.id.clone()
        }

        fn revision(&self) -> Option<i64> {
            self.revision
        }

        fn set_revision(&mut self, revision: i64) {
            self.revision = Some(revision);
        }

        fn snapshot(&self) -> Snapshot {
            Snapshot::new()
                .with("id", self.id.as_str())
                .with("name", self.name.as_str())
                .with("email", self.email.clone())
                .with("skills", FieldValue::from(json!(self.skills)))
                .with("revision", self.revision)
        }
    }

    fn policy() -> FieldPolicy {
        FieldPolicy::default()
    }

    #[test]
    fn test_sanitize_drops_nested_and_excluded() {
        let snapshot = Profile::new("1", "Alice", Some(2)).snapshot();
        let clean = sanitize(snapshot, &policy());
        let keys: Vec<&String> = clean.keys().collect();
        assert_eq!(keys, ["email", "name"]);
    }

    #[test]
    fn test_sanitize_applies_allow_list() {
        let policy = TrackingConfig::default()
            .with_tracked_fields("profile", ["name"])
            .policy_for("profile");
        let clean = sanitize(Profile::new("1", "Alice", Some(2)).snapshot(), &policy);
        assert_eq!(clean.len(), 1);
        assert!(clean.contains_key("name"));
    }

    #[test]
    fn test_update_with_change_bumps_revision() {
        let previous = Profile::new("1", "Alice", Some(2));
        let mut next = Profile::new("1", "Alicia", Some(2));

        let set = prepare(Some(&previous), &mut next, Operation::Update, &policy())
            .unwrap()
            .unwrap();

        assert_eq!(set.base_revision, 2);
        assert_eq!(set.revision, 3);
        assert_eq!(next.revision, Some(3));
        assert_eq!(set.delta.len(), 1);
        assert_eq!(set.delta[0].field(), Some("name"));
    }

    #[test]
    fn test_update_without_change_returns_none() {
        let previous = Profile::new("1", "Alice", Some(4));
        let mut next = previous.clone();

        let set = prepare(Some(&previous), &mut next, Operation::Update, &policy()).unwrap();
        assert!(set.is_none());
        assert_eq!(next.revision, Some(4));
    }

    #[test]
    fn test_caller_supplied_revision_is_reset() {
        let previous = Profile::new("1", "Alice", Some(4));
        let mut next = Profile::new("1", "Alice", Some(99));

        let set = prepare(Some(&previous), &mut next, Operation::Update, &policy()).unwrap();
        assert!(set.is_none());
        assert_eq!(next.revision, Some(4));
    }

    #[test]
    fn test_nested_only_change_is_ignored() {
        let previous = Profile::new("1", "Alice", Some(1));
        let mut next = previous.clone();
        next.skills.push("welding".to_string());

        let set = prepare(Some(&previous), &mut next, Operation::Update, &policy()).unwrap();
        assert!(set.is_none());
    }

    #[derive(Clone)]
    struct Sparse {
        fields: Snapshot,
        revision: Option<i64>,
    }

    impl Sparse {
        fn new(fields: Snapshot, revision: Option<i64>) -> Self {
            Self { fields, revision }
        }
    }

    impl Tracked for Sparse {
        fn model(&self) -> &str {
            "company"
        }
        fn document_id(&self) -> String {
            "c1".to_string()
        }
        fn revision(&self) -> Option<i64> {
            self.revision
        }
        fn set_revision(&mut self, revision: i64) {
            self.revision = Some(revision);
        }
        fn snapshot(&self) -> Snapshot {
            self.fields.clone().with("revision", self.revision)
        }
    }

    #[test]
    fn test_update_ignores_fields_absent_from_previous() {
        let previous = Sparse::new(Snapshot::new().with("name", "Acme"), Some(1));
        let mut next = Sparse::new(
            Snapshot::new().with("name", "Acme").with("siret", "123"),
            Some(1),
        );

        let set = prepare(Some(&previous), &mut next, Operation::Update, &policy()).unwrap();
        assert!(set.is_none());
    }

    #[test]
    fn test_document_keeps_fields_first_populated_by_update() {
        let previous = Sparse::new(Snapshot::new().with("name", "Acme"), Some(1));
        let mut next = Sparse::new(
            Snapshot::new().with("name", "Acme2").with("siret", "123"),
            Some(1),
        );

        let set = prepare(Some(&previous), &mut next, Operation::Update, &policy())
            .unwrap()
            .unwrap();

        let fields: Vec<&str> = set.delta.iter().filter_map(|e| e.field()).collect();
        assert_eq!(fields, ["name"]);
        let keys: Vec<&String> = set.document.keys().collect();
        assert_eq!(keys, ["name", "siret"]);
        assert_eq!(set.document.get("siret"), Some(&FieldValue::from("123")));
    }

    #[test]
    fn test_tracked_revision_field_ignores_caller_counter() {
        let policy = TrackingConfig::from_toml_str(r#"excluded_fields = ["id"]"#)
            .unwrap()
            .policy_for("company");
        let previous = Sparse::new(Snapshot::new().with("name", "Acme"), Some(4));

        let mut untouched = Sparse::new(Snapshot::new().with("name", "Acme"), Some(99));
        let set = prepare(Some(&previous), &mut untouched, Operation::Update, &policy).unwrap();
        assert!(set.is_none());
        assert_eq!(untouched.revision, Some(4));

        let mut renamed = Sparse::new(Snapshot::new().with("name", "Acme2"), Some(99));
        let set = prepare(Some(&previous), &mut renamed, Operation::Update, &policy)
            .unwrap()
            .unwrap();
        let fields: Vec<&str> = set.delta.iter().filter_map(|e| e.field()).collect();
        assert_eq!(fields, ["name"]);
        assert_eq!(set.document.get("revision"), Some(&FieldValue::from(5i64)));
    }

    #[test]
    fn test_update_without_revision_fails_fast() {
        let previous = Profile::new("1", "Alice", None);
        let mut next = Profile::new("1", "Alicia", None);

        let err = prepare(Some(&previous), &mut next, Operation::Update, &policy()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::TrackingInvariant);
        assert_eq!(err.op(), Some("prepare"));
        assert_eq!(next.revision, None);
    }

    #[test]
    fn test_update_without_previous_state_is_rejected() {
        let mut next = Profile::new("1", "Alicia", Some(1));
        let err = prepare::<Profile>(None, &mut next, Operation::Update, &policy()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_previous_state_of_other_entity_is_rejected() {
        let previous = Profile::new("2", "Bob", Some(1));
        let mut next = Profile::new("1", "Alice", Some(1));
        let err = prepare(Some(&previous), &mut next, Operation::Update, &policy()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_create_starts_at_revision_one() {
        let mut next = Profile::new("1", "Alice", Some(7));
        let set = prepare::<Profile>(None, &mut next, Operation::Create, &policy())
            .unwrap()
            .unwrap();

        assert_eq!(set.base_revision, 0);
        assert_eq!(set.revision, 1);
        assert_eq!(next.revision, Some(1));
        // null email is reported as a new field
        let fields: Vec<&str> = set.delta.iter().filter_map(|e| e.field()).collect();
        assert_eq!(fields, ["email", "name"]);
    }

    #[test]
    fn test_destroy_always_produces_change_set() {
        let previous = Profile::new("1", "Alice", Some(5));
        let mut next = previous.clone();

        let set = prepare(Some(&previous), &mut next, Operation::Destroy, &policy())
            .unwrap()
            .unwrap();

        assert_eq!(set.operation, Operation::Destroy);
        assert_eq!(set.revision, 6);
        assert!(set.delta.is_empty());
        assert!(set.planned_changes().is_empty());
    }
}
