//! revtrail CLI
//!
//! Operator commands over a revision store

use clap::{Parser, Subcommand};
use revtrail_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "revtrail")]
#[command(about = "revtrail - Revision history for tracked documents", long_about = None)]
struct Cli {
    /// Emit JSON log lines instead of human-readable ones
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the revision tables
    Migrate(commands::migrate::MigrateArgs),
    /// Show the revision history of documents
    History(commands::history::HistoryArgs),
    /// Erase the recorded content of documents
    Redact(commands::redact::RedactArgs),
}

fn main() {
    let cli = Cli::parse();

    logging_facility::init(if cli.log_json {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::execute(args),
        Commands::History(args) => commands::history::execute(args),
        Commands::Redact(args) => commands::redact::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
