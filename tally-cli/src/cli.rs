//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Tally CLI - batch database migrations
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Tally CLI - batch database migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./tally.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database connection URL
    #[arg(long, global = true, env = "POSTGRES_URI", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new migration file in the migrations directory
    Create(CreateArgs),

    /// Execute every migration that hasn't been executed yet, as one batch
    Migrate(MigrateArgs),

    /// Roll back the last migration batch
    Rollback(RollbackArgs),

    /// Initialize the migration history table
    Init,

    /// Show applied, pending and drifted migrations
    Status,
}

impl Command {
    /// Check if this command reverts a batch.
    pub fn is_rollback(&self) -> bool {
        matches!(self, Command::Rollback(_))
    }
}

/// Arguments for the `create` command
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the new migration
    pub name: String,
}

/// Arguments for the `migrate` command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Tell migrations not to manage row-level security
    #[arg(long)]
    pub ignore_rls: bool,
}

impl MigrateArgs {
    /// Whether migrations should manage row-level security.
    pub fn rls(&self) -> bool {
        !self.ignore_rls
    }
}

/// Arguments for the `rollback` command
#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Roll back migrations whose file changed since they were applied
    #[arg(short, long)]
    pub force: bool,

    /// Tell migrations not to manage row-level security
    #[arg(long)]
    pub ignore_rls: bool,
}

impl RollbackArgs {
    /// Whether migrations should manage row-level security.
    pub fn rls(&self) -> bool {
        !self.ignore_rls
    }
}
