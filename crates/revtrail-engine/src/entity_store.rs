//! Host persistence seam.
//!
//! revtrail never owns the domain tables. A host implements [`EntityStore`]
//! for each tracked type so the writer can read the committed state and
//! write the new one on the same connection (and transaction) as the audit
//! rows.

use revtrail_core::model::Tracked;
use revtrail_store::Result;
use rusqlite::Connection;

/// Row-level access to one tracked entity type
///
/// `update` and `delete` are compare-and-set operations: they must only
/// touch the row when its stored revision equals `expected_revision`, and
/// report the number of affected rows. Zero rows is reported back to the
/// caller as a lost race.
///
/// `expected_revision` is `None` for rows that carry no counter yet, so the
/// comparison has to match NULL too, e.g. `WHERE id = ? AND revision IS ?`.
pub trait EntityStore<T: Tracked> {
    /// Committed state of one entity, if it exists
    fn load(&self, conn: &Connection, document_id: &str) -> Result<Option<T>>;

    fn insert(&self, conn: &Connection, entity: &T) -> Result<()>;

    /// Write `entity` (carrying its new revision) if the row is still at `expected_revision`
    fn update(&self, conn: &Connection, entity: &T, expected_revision: Option<i64>) -> Result<usize>;

    /// Remove the row if it is still at `expected_revision`
    fn delete(&self, conn: &Connection, entity: &T, expected_revision: Option<i64>) -> Result<usize>;
}

impl<T: Tracked, S: EntityStore<T> + ?Sized> EntityStore<T> for &S {
    fn load(&self, conn: &Connection, document_id: &str) -> Result<Option<T>> {
        (**self).load(conn, document_id)
    }

    fn insert(&self, conn: &Connection, entity: &T) -> Result<()> {
        (**self).insert(conn, entity)
    }

    fn update(&self, conn: &Connection, entity: &T, expected_revision: Option<i64>) -> Result<usize> {
        (**self).update(conn, entity, expected_revision)
    }

    fn delete(&self, conn: &Connection, entity: &T, expected_revision: Option<i64>) -> Result<usize> {
        (**self).delete(conn, entity, expected_revision)
    }
}
