// Recorder and query service against a migrated database

use revtrail_core::diff::DiffEntry;
use revtrail_core::model::{ChangeDocument, FieldValue, Operation, Snapshot, Tracked};
use revtrail_core::revision::ChangeSet;
use revtrail_core::{prepare, FieldPolicy};
use revtrail_store::query::{
    find_all_by_document_ids, find_changes_by_revision_ids, history_for_document,
    latest_revision_number, redact_documents, update_by_document_ids, update_by_revision_ids,
    RevisionChangePatch, RevisionPatch,
};
use revtrail_store::record;
use rusqlite::Connection;

fn setup_test_db() -> Connection {
    let mut conn = revtrail_store::db::open_in_memory().unwrap();
    revtrail_store::migrations::apply_migrations(&mut conn).unwrap();
    conn
}

fn edit(field: &str, lhs: impl Into<FieldValue>, rhs: impl Into<FieldValue>) -> DiffEntry {
    DiffEntry::Edit {
        path: vec![field.to_string()],
        lhs: lhs.into(),
        rhs: rhs.into(),
    }
}

fn change_set(document_id: &str, revision: i64, operation: Operation, delta: Vec<DiffEntry>) -> ChangeSet {
    ChangeSet {
        model: "profile".to_string(),
        document_id: document_id.to_string(),
        operation,
        base_revision: revision - 1,
        revision,
        document: Snapshot::new().with("name", "Alicia").with("city", "Lyon"),
        delta,
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_alice_to_alicia_round_trip() {
    let conn = setup_test_db();

    let recorded = record(
        &conn,
        &change_set("1", 3, Operation::Update, vec![edit("name", "Alice", "Alicia")]),
    )
    .unwrap();

    let revisions = find_all_by_document_ids(&conn, &ids(&["1"])).unwrap();
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0], recorded.revision);
    assert_eq!(revisions[0].revision, 3);
    assert_eq!(revisions[0].operation, Operation::Update);
    assert_eq!(revisions[0].document.get("name"), Some(&FieldValue::from("Alicia")));

    let changes = find_changes_by_revision_ids(&conn, &[recorded.revision.id.clone()]).unwrap();
    assert_eq!(changes, recorded.changes);
    assert_eq!(changes[0].path, "name");
    assert_eq!(changes[0].diff[0].value, "Alic");
    assert_eq!(changes[0].document.old_value(), Some(&FieldValue::from("Alice")));
}

#[test]
fn test_one_change_per_changed_field() {
    let conn = setup_test_db();

    let recorded = record(
        &conn,
        &change_set(
            "1",
            1,
            Operation::Update,
            vec![edit("active", true, false), edit("city", "Paris", "Lyon")],
        ),
    )
    .unwrap();

    let paths: Vec<&str> = recorded.changes.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, ["active", "city"]);

    // "1" -> "0"
    let active = &recorded.changes[0].diff;
    assert_eq!(active.len(), 2);
    assert!(active[0].removed);
    assert!(active[1].added);
}

#[test]
fn test_history_orders_by_revision() {
    let conn = setup_test_db();
    for revision in [2, 1, 3] {
        record(
            &conn,
            &change_set("p1", revision, Operation::Update, vec![edit("name", "a", "b")]),
        )
        .unwrap();
    }

    let history = history_for_document(&conn, "p1").unwrap();
    let counters: Vec<i64> = history.iter().map(|r| r.revision).collect();
    assert_eq!(counters, [1, 2, 3]);
    assert_eq!(latest_revision_number(&conn, "p1").unwrap(), Some(3));
    assert_eq!(latest_revision_number(&conn, "unknown").unwrap(), None);
}

#[test]
fn test_empty_id_lists_are_noops() {
    let conn = setup_test_db();
    record(&conn, &change_set("p1", 1, Operation::Create, vec![])).unwrap();

    assert!(find_all_by_document_ids(&conn, &[]).unwrap().is_empty());
    assert!(find_changes_by_revision_ids(&conn, &[]).unwrap().is_empty());
    assert_eq!(
        update_by_document_ids(&conn, &[], &RevisionPatch::default()).unwrap(),
        0
    );
    assert_eq!(
        update_by_revision_ids(&conn, &[], &RevisionChangePatch::default()).unwrap(),
        0
    );
    assert_eq!(redact_documents(&conn, &[]).unwrap().revisions, 0);
}

#[test]
fn test_update_by_document_ids_patches_matching_rows() {
    let conn = setup_test_db();
    record(&conn, &change_set("a", 1, Operation::Update, vec![edit("name", "x", "y")])).unwrap();
    record(&conn, &change_set("a", 2, Operation::Update, vec![edit("name", "y", "z")])).unwrap();
    record(&conn, &change_set("b", 1, Operation::Update, vec![edit("name", "x", "y")])).unwrap();

    let patch = RevisionPatch {
        model: Some("candidate".to_string()),
        document: None,
    };
    let updated = update_by_document_ids(&conn, &ids(&["a", "missing"]), &patch).unwrap();
    assert_eq!(updated, 2);

    let all = find_all_by_document_ids(&conn, &ids(&["a", "b"])).unwrap();
    let models: Vec<(&str, &str)> = all
        .iter()
        .map(|r| (r.document_id.as_str(), r.model.as_str()))
        .collect();
    assert_eq!(
        models,
        [("a", "candidate"), ("a", "candidate"), ("b", "profile")]
    );
    // untouched column survives
    assert_eq!(all[0].document.get("city"), Some(&FieldValue::from("Lyon")));
}

#[test]
fn test_update_by_revision_ids_patches_changes() {
    let conn = setup_test_db();
    let recorded = record(
        &conn,
        &change_set("a", 1, Operation::Update, vec![edit("name", "x", "y"), edit("city", "p", "q")]),
    )
    .unwrap();

    let updated = update_by_revision_ids(
        &conn,
        &[recorded.revision.id.clone()],
        &RevisionChangePatch {
            path: None,
            document: None,
            diff: Some(Vec::new()),
        },
    )
    .unwrap();
    assert_eq!(updated, 2);

    let changes = find_changes_by_revision_ids(&conn, &[recorded.revision.id]).unwrap();
    assert!(changes.iter().all(|c| c.diff.is_empty()));
    assert!(changes.iter().all(|c| !c.document.is_redacted()));
}

#[test]
fn test_redaction_erases_content_but_keeps_history_shape() {
    let conn = setup_test_db();
    let first = record(&conn, &change_set("a", 1, Operation::Update, vec![edit("name", "x", "y")])).unwrap();
    record(&conn, &change_set("a", 2, Operation::Destroy, vec![])).unwrap();
    let other = record(&conn, &change_set("b", 1, Operation::Update, vec![edit("name", "x", "y")])).unwrap();

    let summary = redact_documents(&conn, &ids(&["a"])).unwrap();
    assert_eq!(summary.revisions, 2);
    assert_eq!(summary.changes, 1);

    let history = history_for_document(&conn, "a").unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.document.is_empty()));
    assert_eq!(history[1].operation, Operation::Destroy);

    let changes = find_changes_by_revision_ids(&conn, &[first.revision.id]).unwrap();
    assert_eq!(changes[0].document, ChangeDocument::Redacted);
    assert!(changes[0].diff.is_empty());
    assert_eq!(changes[0].path, "name");

    // other documents untouched
    let untouched = find_changes_by_revision_ids(&conn, &[other.revision.id]).unwrap();
    assert!(!untouched[0].document.is_redacted());
}

#[test]
fn test_large_id_lists_are_batched() {
    let conn = setup_test_db();
    record(&conn, &change_set("doc-1200", 1, Operation::Create, vec![])).unwrap();

    let many: Vec<String> = (0..1_500).map(|i| format!("doc-{}", i)).collect();
    let found = find_all_by_document_ids(&conn, &many).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].document_id, "doc-1200");
}

struct Company {
    fields: Snapshot,
    revision: Option<i64>,
}

impl Tracked for Company {
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
        self.fields.clone()
    }
}

#[test]
fn test_stored_document_includes_field_added_by_update() {
    let conn = setup_test_db();
    let previous = Company {
        fields: Snapshot::new().with("name", "Acme"),
        revision: Some(1),
    };
    let mut next = Company {
        fields: Snapshot::new().with("name", "Acme2").with("siret", "123"),
        revision: Some(1),
    };

    let set = prepare(Some(&previous), &mut next, Operation::Update, &FieldPolicy::default())
        .unwrap()
        .unwrap();
    let recorded = record(&conn, &set).unwrap();

    // only the diffed field gets a change row
    let paths: Vec<&str> = recorded.changes.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, ["name"]);

    let stored = history_for_document(&conn, "c1").unwrap();
    assert_eq!(stored[0].revision, 2);
    assert_eq!(stored[0].document.get("siret"), Some(&FieldValue::from("123")));
    assert_eq!(stored[0].document.get("name"), Some(&FieldValue::from("Acme2")));
}

#[test]
fn test_long_text_replacement_is_recorded() {
    let conn = setup_test_db();
    let old = "Welder with ten years of shipyard experience. ".repeat(500);
    let new = "Project manager for offshore wind farms. ".repeat(500);

    let recorded = record(
        &conn,
        &change_set("cv-1", 2, Operation::Update, vec![edit("description", old.as_str(), new.as_str())]),
    )
    .unwrap();

    let changes = find_changes_by_revision_ids(&conn, &[recorded.revision.id]).unwrap();
    let diff = &changes[0].diff;
    let rebuilt_old: String = diff.iter().filter(|c| !c.added).map(|c| c.value.as_str()).collect();
    let rebuilt_new: String = diff.iter().filter(|c| !c.removed).map(|c| c.value.as_str()).collect();
    assert_eq!(rebuilt_old, old);
    assert_eq!(rebuilt_new, new);
}
