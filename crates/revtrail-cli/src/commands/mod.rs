pub mod history;
pub mod migrate;
pub mod redact;

use std::path::Path;

use rusqlite::Connection;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the store at `db`, creating parent directories and applying pending migrations
pub fn open_store(db: &str) -> Result<Connection, Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(db).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut conn = revtrail_store::db::open(db)?;
    revtrail_store::migrations::apply_migrations(&mut conn)?;
    Ok(conn)
}
