//! Host-side fixtures: a `profiles` table and its compare-and-set store

use revtrail_core::model::{FieldValue, Snapshot, Tracked};
use revtrail_engine::EntityStore;
use revtrail_store::errors::{from_rusqlite, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub city: Option<String>,
    pub skills: Vec<String>,
    pub revision: Option<i64>,
}

impl Profile {
    #[allow(dead_code)]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: None,
            city: None,
            skills: Vec::new(),
            revision: None,
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
            .with("city", self.city.clone())
            .with(
                "skills",
                FieldValue::Array(self.skills.iter().map(|s| s.as_str().into()).collect()),
            )
            .with("revision", self.revision)
    }
}

pub struct SqliteProfileStore;

impl EntityStore<Profile> for SqliteProfileStore {
    fn load(&self, conn: &Connection, document_id: &str) -> Result<Option<Profile>> {
        conn.query_row(
            "SELECT id, name, email, city, skills, revision FROM profiles WHERE id = ?1",
            [document_id],
            |row| {
                let skills: String = row.get(4)?;
                Ok(Profile {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    city: row.get(3)?,
                    skills: serde_json::from_str(&skills).unwrap_or_default(),
                    revision: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(from_rusqlite)
    }

    fn insert(&self, conn: &Connection, entity: &Profile) -> Result<()> {
        conn.execute(
            "INSERT INTO profiles (id, name, email, city, skills, revision)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                entity.id,
                entity.name,
                entity.email,
                entity.city,
                serde_json::to_string(&entity.skills).unwrap_or_default(),
                entity.revision,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    fn update(
        &self,
        conn: &Connection,
        entity: &Profile,
        expected_revision: Option<i64>,
    ) -> Result<usize> {
        conn.execute(
            "UPDATE profiles SET name = ?1, email = ?2, city = ?3, skills = ?4, revision = ?5
             WHERE id = ?6 AND revision IS ?7",
            rusqlite::params![
                entity.name,
                entity.email,
                entity.city,
                serde_json::to_string(&entity.skills).unwrap_or_default(),
                entity.revision,
                entity.id,
                expected_revision,
            ],
        )
        .map_err(from_rusqlite)
    }

    fn delete(
        &self,
        conn: &Connection,
        entity: &Profile,
        expected_revision: Option<i64>,
    ) -> Result<usize> {
        conn.execute(
            "DELETE FROM profiles WHERE id = ?1 AND revision IS ?2",
            rusqlite::params![entity.id, expected_revision],
        )
        .map_err(from_rusqlite)
    }
}

fn create_profiles_table(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            city TEXT,
            skills TEXT NOT NULL,
            revision INTEGER
        )",
    )
    .unwrap();
}

/// Migrated in-memory database with the host table
#[allow(dead_code)]
pub fn setup_test_db() -> Connection {
    let mut conn = revtrail_store::db::open_in_memory().unwrap();
    revtrail_store::migrations::apply_migrations(&mut conn).unwrap();
    create_profiles_table(&conn);
    conn
}

/// Migrated file database with the host table
#[allow(dead_code)]
pub fn setup_file_db(path: &Path) -> Connection {
    let mut conn = revtrail_store::db::open(path).unwrap();
    revtrail_store::migrations::apply_migrations(&mut conn).unwrap();
    create_profiles_table(&conn);
    conn
}

/// Put a profile row in place without going through the tracker
#[allow(dead_code)]
pub fn seed_profile(conn: &Connection, profile: &Profile) {
    SqliteProfileStore.insert(conn, profile).unwrap();
}

#[allow(dead_code)]
pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}
