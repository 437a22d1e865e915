//! Schema migration command

use clap::Args;

use super::{open_store, CliResult};

#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[arg(long, default_value = ".revtrail/revisions.db")]
    pub db: String,
}

pub fn execute(args: MigrateArgs) -> CliResult {
    let conn = open_store(&args.db)?;
    let applied = revtrail_store::migrations::applied_migrations(&conn)?;

    println!("Migrations applied: {}", applied.len());
    for id in applied {
        println!("  {}", id);
    }
    Ok(())
}
