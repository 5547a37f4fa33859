//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tally_migrate::history::{DEFAULT_EXTENSIONS, DEFAULT_TABLE_NAME};
use tally_migrate::{HistoryTable, MigrationConfig};

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "tally.toml";

/// Default migrations directory (relative to project root)
pub const MIGRATIONS_DIR: &str = "migrations";

/// Tally CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Migration configuration
    pub migrations: MigrationsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load an explicitly requested file, or `tally.toml` if present, or defaults.
    pub fn discover(explicit: Option<&Path>) -> CliResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(CONFIG_FILE_NAME);
                if path.is_file() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Resolve the connection URL; `cli_url` (flag or `POSTGRES_URI`) wins.
    pub fn database_url(&self, cli_url: Option<&str>) -> CliResult<String> {
        cli_url
            .or(self.database.url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                CliError::Config(
                    "no database URL: set POSTGRES_URI, pass --database-url or add database.url to tally.toml"
                        .to_string(),
                )
            })
    }

    /// History table definition.
    pub fn history_table(&self) -> HistoryTable {
        HistoryTable::new(&self.database.table_name)
            .with_extensions(self.database.extensions.iter().cloned())
    }

    /// Engine configuration.
    pub fn migration_config(&self) -> MigrationConfig {
        MigrationConfig::new()
            .migrations_dir(&self.migrations.directory)
            .extension(&self.migrations.extension)
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: Option<String>,

    /// Extensions created by `init`
    pub extensions: Vec<String>,

    /// History table name
    pub table_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Migrations directory
    pub directory: PathBuf,

    /// Migration file extension
    pub extension: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(MIGRATIONS_DIR),
            extension: tally_migrate::catalog::DEFAULT_EXTENSION.to_string(),
        }
    }
}
