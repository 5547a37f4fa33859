//! Migration actions and the registry that resolves them.
//!
//! A migration is a pair of actions, forward and backward, each run against a
//! live [`SqlExecutor`] with a row-level-security flag. File-backed migrations
//! are parsed from SQL sections; migrations written in Rust are registered by
//! id and take precedence over the file contents.
//!
//! ```text
//! -- migrate
//! ALTER TABLE events ALTER COLUMN project_id DROP NOT NULL;
//! -- migrate:rls
//! ALTER TABLE events ENABLE ROW LEVEL SECURITY;
//! -- rollback
//! ALTER TABLE events ALTER COLUMN project_id SET NOT NULL;
//! -- rollback:rls
//! ALTER TABLE events DISABLE ROW LEVEL SECURITY;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::MigrationFile;
use crate::error::{MigrateResult, MigrationError};
use crate::hasher::hash_bytes;
use crate::history::SqlExecutor;

/// A reversible migration.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Apply the migration.
    async fn migrate(&self, db: &dyn SqlExecutor, rls: bool) -> MigrateResult<()>;

    /// Revert the migration.
    async fn rollback(&self, db: &dyn SqlExecutor, rls: bool) -> MigrateResult<()>;
}

/// Migration direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply pending migrations.
    Forward,
    /// Revert the last batch.
    Backward,
}

impl Direction {
    /// Run the action matching this direction.
    pub async fn run(
        self,
        migration: &dyn Migration,
        db: &dyn SqlExecutor,
        rls: bool,
    ) -> MigrateResult<()> {
        match self {
            Direction::Forward => migration.migrate(db, rls).await,
            Direction::Backward => migration.rollback(db, rls).await,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "migrate"),
            Direction::Backward => write!(f, "rollback"),
        }
    }
}

const MIGRATE_MARKER: &str = "-- migrate";
const MIGRATE_RLS_MARKER: &str = "-- migrate:rls";
const ROLLBACK_MARKER: &str = "-- rollback";
const ROLLBACK_RLS_MARKER: &str = "-- rollback:rls";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section {
    Migrate,
    MigrateRls,
    Rollback,
    RollbackRls,
}

impl Section {
    fn from_marker(line: &str) -> MigrateResult<Option<Self>> {
        let section = match line {
            MIGRATE_MARKER => Self::Migrate,
            MIGRATE_RLS_MARKER => Self::MigrateRls,
            ROLLBACK_MARKER => Self::Rollback,
            ROLLBACK_RLS_MARKER => Self::RollbackRls,
            other
                if other.starts_with("-- migrate:") || other.starts_with("-- rollback:") =>
            {
                return Err(MigrationError::invalid(format!(
                    "unknown section marker '{}'",
                    other
                )));
            }
            _ => return Ok(None),
        };
        Ok(Some(section))
    }

    fn marker(self) -> &'static str {
        match self {
            Self::Migrate => MIGRATE_MARKER,
            Self::MigrateRls => MIGRATE_RLS_MARKER,
            Self::Rollback => ROLLBACK_MARKER,
            Self::RollbackRls => ROLLBACK_RLS_MARKER,
        }
    }
}

/// A migration defined by SQL sections in a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlMigration {
    /// Forward SQL.
    pub migrate: String,
    /// Forward SQL run only when managing row-level security.
    pub migrate_rls: Option<String>,
    /// Backward SQL.
    pub rollback: String,
    /// Backward SQL run only when managing row-level security.
    pub rollback_rls: Option<String>,
}

impl SqlMigration {
    /// Parse migration file contents.
    pub fn parse(source: &str) -> MigrateResult<Self> {
        let mut sections: HashMap<Section, String> = HashMap::new();
        let mut current: Option<Section> = None;

        for line in source.lines() {
            if let Some(section) = Section::from_marker(line.trim())? {
                if sections.contains_key(&section) {
                    return Err(MigrationError::invalid(format!(
                        "section '{}' appears more than once",
                        section.marker()
                    )));
                }
                sections.insert(section, String::new());
                current = Some(section);
                continue;
            }

            match current {
                Some(section) => {
                    let body = sections.entry(section).or_default();
                    body.push_str(line);
                    body.push('\n');
                }
                None if is_noop(line) => {}
                None => {
                    return Err(MigrationError::invalid(format!(
                        "SQL found before the '{}' marker",
                        MIGRATE_MARKER
                    )));
                }
            }
        }

        let migrate = sections.remove(&Section::Migrate).ok_or_else(|| {
            MigrationError::invalid(format!("missing '{}' section", MIGRATE_MARKER))
        })?;
        let rollback = sections.remove(&Section::Rollback).ok_or_else(|| {
            MigrationError::invalid(format!("missing '{}' section", ROLLBACK_MARKER))
        })?;

        Ok(Self {
            migrate,
            migrate_rls: sections.remove(&Section::MigrateRls),
            rollback,
            rollback_rls: sections.remove(&Section::RollbackRls),
        })
    }

    /// Read and parse a migration file.
    ///
    /// The contents must still match the hash taken when the catalog was
    /// listed, so the recorded hash always fingerprints the SQL that ran.
    pub async fn load(file: &MigrationFile) -> MigrateResult<Self> {
        let bytes = tokio::fs::read(&file.path).await?;
        let current_hash = hash_bytes(&bytes);
        if current_hash != file.hash {
            return Err(MigrationError::ChangedOnDisk {
                file_name: file.file_name.clone(),
                listed_hash: file.hash.clone(),
                current_hash,
            });
        }

        let source = String::from_utf8(bytes).map_err(|e| {
            MigrationError::invalid(format!("{}: not valid UTF-8: {}", file.file_name, e))
        })?;
        Self::parse(&source).map_err(|err| match err {
            MigrationError::InvalidMigration(msg) => {
                MigrationError::invalid(format!("{}: {}", file.file_name, msg))
            }
            other => other,
        })
    }
}

#[async_trait]
impl Migration for SqlMigration {
    async fn migrate(&self, db: &dyn SqlExecutor, rls: bool) -> MigrateResult<()> {
        execute(db, &self.migrate).await?;
        if rls {
            if let Some(sql) = &self.migrate_rls {
                execute(db, sql).await?;
            }
        }
        Ok(())
    }

    async fn rollback(&self, db: &dyn SqlExecutor, rls: bool) -> MigrateResult<()> {
        if rls {
            if let Some(sql) = &self.rollback_rls {
                execute(db, sql).await?;
            }
        }
        execute(db, &self.rollback).await
    }
}

async fn execute(db: &dyn SqlExecutor, sql: &str) -> MigrateResult<()> {
    if sql.lines().all(is_noop) {
        return Ok(());
    }
    db.batch_execute(sql).await
}

fn is_noop(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with("--")
}

/// Migrations implemented in Rust, keyed by migration id.
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    migrations: HashMap<String, Arc<dyn Migration>>,
}

impl MigrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the actions for a migration id.
    pub fn register(mut self, id: impl Into<String>, migration: impl Migration + 'static) -> Self {
        self.migrations.insert(id.into(), Arc::new(migration));
        self
    }

    /// Check whether an id has registered actions.
    pub fn contains(&self, id: &str) -> bool {
        self.migrations.contains_key(id)
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Resolve the actions for a catalog file.
    pub async fn load(&self, file: &MigrationFile) -> MigrateResult<Arc<dyn Migration>> {
        if let Some(migration) = self.migrations.get(file.id.as_str()) {
            debug!(id = %file.id, "Using registered migration");
            return Ok(Arc::clone(migration));
        }

        Ok(Arc::new(SqlMigration::load(file).await?))
    }
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.migrations.keys().collect();
        ids.sort();
        f.debug_struct("MigrationRegistry").field("ids", &ids).finish()
    }
}
