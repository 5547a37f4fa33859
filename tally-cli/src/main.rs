//! Tally CLI - Batch database migrations.

use clap::Parser;

use tally_cli::cli::{Cli, Command};
use tally_cli::commands::{self, Project};
use tally_cli::config::Config;
use tally_cli::error::CliResult;
use tally_cli::{logging, output};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    logging::init();

    let rollback = cli.command.is_rollback();
    if let Err(e) = run(cli).await {
        output::error(&format!("ERROR: {}", e));
        if rollback {
            output::error(
                "An error occurred, all the queries executed during the rollback will be reverted...",
            );
        } else {
            output::error("An error occurred, rollback...");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = Config::discover(cli.config.as_deref())?;
    let project = Project::new(config, cli.database_url);

    match cli.command {
        Command::Create(args) => commands::create::run(&project, args).await,
        Command::Migrate(args) => commands::migrate::run(&project, args).await,
        Command::Rollback(args) => commands::rollback::run(&project, args).await,
        Command::Init => commands::init::run(&project).await,
        Command::Status => commands::status::run(&project).await,
    }
}
