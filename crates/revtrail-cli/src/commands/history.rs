//! Document history command

use clap::Args;
use revtrail_core::model::{FieldValue, RevisionChange};
use revtrail_core_types::RequestContext;
use revtrail_engine::{apply_audit_command, AuditCommand, AuditCommandResult, DocumentHistory};

use super::{open_store, CliResult};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Document ids to show
    #[arg(required = true)]
    pub document_ids: Vec<String>,

    #[arg(long, default_value = ".revtrail/revisions.db")]
    pub db: String,

    /// Print the history as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: HistoryArgs) -> CliResult {
    let conn = open_store(&args.db)?;
    let cmd = AuditCommand::History {
        document_ids: args.document_ids,
    };

    let histories = match apply_audit_command(cmd, &conn, &RequestContext::new())? {
        AuditCommandResult::History(histories) => histories,
        other => return Err(format!("unexpected result: {:?}", other).into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&histories)?);
    } else {
        for history in &histories {
            print_history(history);
        }
    }
    Ok(())
}

fn print_history(history: &DocumentHistory) {
    println!("Document {}:", history.document_id);
    if history.revisions.is_empty() {
        println!("  (no revisions)");
        return;
    }
    for entry in &history.revisions {
        let revision = &entry.revision;
        println!(
            "  revision {} {} {} at {}",
            revision.revision,
            revision.model,
            revision.operation,
            revision.created_at.to_rfc3339()
        );
        for change in &entry.changes {
            println!("    {}", describe_change(change));
        }
    }
}

fn describe_change(change: &RevisionChange) -> String {
    if change.document.is_redacted() {
        return format!("{}: [redacted]", change.path);
    }
    format!(
        "{}: {} -> {}",
        change.path,
        render(change.document.old_value()),
        render(change.document.new_value())
    )
}

fn render(value: Option<&FieldValue>) -> String {
    match value {
        Some(value) => value.to_json().to_string(),
        None => "(absent)".to_string(),
    }
}
