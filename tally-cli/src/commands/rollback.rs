//! `tally rollback` - Revert the most recent batch.

use tally_migrate::MigrationRegistry;

use crate::cli::RollbackArgs;
use crate::commands::Project;
use crate::error::CliResult;
use crate::output;

/// Run the rollback command
pub async fn run(project: &Project, args: RollbackArgs) -> CliResult<()> {
    run_with(project, args, MigrationRegistry::new()).await
}

/// Run the rollback command with Rust migrations registered by id
pub async fn run_with(
    project: &Project,
    args: RollbackArgs,
    registry: MigrationRegistry,
) -> CliResult<()> {
    let engine = project.reporting_engine(registry);
    let conn = project.connect().await?;

    let result = engine.rollback(&conn, args.force, args.rls()).await?;

    if result.has_changes() {
        output::line("Done !");
    } else {
        output::line("Nothing to rollback.");
    }
    Ok(())
}
