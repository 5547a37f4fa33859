//! `tally migrate` - Apply every new migration as one batch.

use tally_migrate::MigrationRegistry;

use crate::cli::MigrateArgs;
use crate::commands::Project;
use crate::error::CliResult;
use crate::output;

/// Run the migrate command
pub async fn run(project: &Project, args: MigrateArgs) -> CliResult<()> {
    run_with(project, args, MigrationRegistry::new()).await
}

/// Run the migrate command with Rust migrations registered by id
pub async fn run_with(
    project: &Project,
    args: MigrateArgs,
    registry: MigrationRegistry,
) -> CliResult<()> {
    let engine = project.reporting_engine(registry);
    let conn = project.connect().await?;

    let result = engine.migrate(&conn, args.rls()).await?;

    if result.has_changes() {
        output::line("Done !");
    } else {
        output::line("No new migrations.");
    }
    Ok(())
}
