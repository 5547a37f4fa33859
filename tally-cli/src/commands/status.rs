//! `tally status` - Show where the database stands against the migrations directory.

use tally_migrate::{MigrationRegistry, MigrationState};

use crate::commands::Project;
use crate::error::CliResult;
use crate::output;

/// Run the status command
pub async fn run(project: &Project) -> CliResult<()> {
    output::header("Migration Status");

    let engine = project.engine(MigrationRegistry::new());
    let conn = project.connect().await?;
    let status = engine.status(&conn).await?;

    output::kv("Current batch", &status.current_batch.to_string());
    output::kv("Applied", &status.applied_count().to_string());
    output::kv("Pending", &status.pending_count().to_string());
    output::newline();

    for entry in &status.entries {
        let state = match &entry.state {
            MigrationState::Pending => output::style_pending("pending"),
            MigrationState::Applied { batch } => {
                output::style_success(&format!("batch {}", batch))
            }
            MigrationState::Drifted { batch, .. } => {
                output::style_error(&format!("batch {}, changed since applied", batch))
            }
        };
        output::list_item(&format!("{} [{}]", entry.file_name, state));
    }

    for record in &status.missing {
        output::list_item(&format!(
            "{} [{}]",
            record.file_name,
            output::style_error(&format!("batch {}, file missing", record.batch))
        ));
    }

    output::newline();
    if status.is_consistent() {
        output::success("History matches the migrations directory.");
    } else {
        output::warn("History does not match the migrations directory.");
    }

    Ok(())
}
