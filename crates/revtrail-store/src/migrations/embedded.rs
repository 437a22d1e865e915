//! Embedded SQL migrations
//!
//! Migrations are embedded at compile time using include_str!

/// Migration metadata
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// All embedded migrations in application order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_revisions",
            sql: include_str!("../../migrations/001_revisions.sql"),
        },
        Migration {
            id: "002_revision_changes",
            sql: include_str!("../../migrations/002_revision_changes.sql"),
        },
    ]
}
