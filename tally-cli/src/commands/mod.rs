//! CLI command implementations.

pub mod create;
pub mod init;
pub mod migrate;
pub mod rollback;
pub mod status;

use tally_migrate::{
    Direction, MigrationEngine, MigrationFile, MigrationHooks, MigrationPlan, MigrationRegistry,
};
use tally_postgres::{PgConfig, PgMigrationConnection};
use tracing::debug;

use crate::config::Config;
use crate::error::CliResult;
use crate::output;

/// Everything a command needs: resolved configuration and connection URL.
#[derive(Debug, Clone)]
pub struct Project {
    /// Loaded configuration
    pub config: Config,
    database_url: Option<String>,
}

impl Project {
    /// Create a project from loaded configuration and the CLI/env URL.
    pub fn new(config: Config, database_url: Option<String>) -> Self {
        Self {
            config,
            database_url,
        }
    }

    /// Build an engine with Rust migrations from `registry`.
    pub fn engine(&self, registry: MigrationRegistry) -> MigrationEngine {
        MigrationEngine::with_registry(self.config.migration_config(), registry)
    }

    /// Build an engine that reports progress on the terminal.
    pub fn reporting_engine(&self, registry: MigrationRegistry) -> MigrationEngine {
        self.engine(registry).with_hooks(progress_hooks())
    }

    /// Open the database session for this run.
    pub async fn connect(&self) -> CliResult<PgMigrationConnection> {
        let url = self.config.database_url(self.database_url.as_deref())?;
        let pg_config = PgConfig::from_url(url)?.application_name("tally");
        debug!(url = %pg_config.redacted_url(), "Opening database session");

        let conn = PgMigrationConnection::connect(&pg_config, self.config.history_table()).await?;
        Ok(conn)
    }
}

/// Hooks printing one line per batch, migration and warning.
pub fn progress_hooks() -> MigrationHooks {
    MigrationHooks {
        on_batch: Some(Box::new(|plan: &MigrationPlan| {
            let count = plan.len();
            let plural = if count > 1 { "s" } else { "" };
            output::line(&match plan.direction {
                Direction::Forward => format!(
                    "{} new migration{} found, executing batch {}...",
                    count, plural, plan.batch
                ),
                Direction::Backward => format!(
                    "{} migration{} found in batch {}. Rolling back batch {}...",
                    count, plural, plan.batch, plan.batch
                ),
            });
        })),
        before_migration: Some(Box::new(|direction: Direction, file: &MigrationFile| {
            output::line(&match direction {
                Direction::Forward => format!("Executing new migration \"{}\"...", file.file_name),
                Direction::Backward => format!("Rolling back migration \"{}\"...", file.file_name),
            });
        })),
        on_warning: Some(Box::new(|warning: &str| output::warn(warning))),
    }
}
