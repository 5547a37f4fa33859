//! `tally init` - Create the migration history table.

use tally_migrate::MigrationRegistry;

use crate::commands::Project;
use crate::error::CliResult;
use crate::output;

/// Run the init command
pub async fn run(project: &Project) -> CliResult<()> {
    let engine = project.engine(MigrationRegistry::new());
    let conn = project.connect().await?;

    engine.initialize(&conn).await?;

    output::kv("History table", &conn.table().name);
    output::kv(
        "Migrations",
        &engine.catalog().migrations_dir().display().to_string(),
    );
    output::line("Done !");
    Ok(())
}
