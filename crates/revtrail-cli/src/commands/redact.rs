//! Redaction command

use clap::Args;
use revtrail_core_types::RequestContext;
use revtrail_engine::{apply_audit_command, AuditCommand, AuditCommandResult};

use super::{open_store, CliResult};

#[derive(Debug, Args)]
pub struct RedactArgs {
    /// Document ids whose recorded content is erased
    #[arg(required = true)]
    pub document_ids: Vec<String>,

    #[arg(long, default_value = ".revtrail/revisions.db")]
    pub db: String,
}

pub fn execute(args: RedactArgs) -> CliResult {
    let conn = open_store(&args.db)?;
    let cmd = AuditCommand::Redact {
        document_ids: args.document_ids,
    };

    match apply_audit_command(cmd, &conn, &RequestContext::new())? {
        AuditCommandResult::Redacted(summary) => {
            println!("Redacted:");
            println!("  revisions: {}", summary.revisions);
            println!("  changes: {}", summary.changes);
            Ok(())
        }
        other => Err(format!("unexpected result: {:?}", other).into()),
    }
}
