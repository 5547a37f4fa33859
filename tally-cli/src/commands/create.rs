//! `tally create` - Scaffold a new migration file.

use tally_migrate::MigrationRegistry;

use crate::cli::CreateArgs;
use crate::commands::Project;
use crate::error::CliResult;
use crate::output;

/// Run the create command
pub async fn run(project: &Project, args: CreateArgs) -> CliResult<()> {
    let engine = project.engine(MigrationRegistry::new());
    let path = engine.create(&args.name).await?;
    output::line(&format!("Created \"{}\"", path.display()));

    Ok(())
}
