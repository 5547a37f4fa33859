//! Migration history tracking.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::MigrationFile;
use crate::error::MigrateResult;

/// Default name of the history table.
pub const DEFAULT_TABLE_NAME: &str = "migrations";

/// Extensions created by `initialize` unless configured otherwise.
pub const DEFAULT_EXTENSIONS: &[&str] = &["uuid-ossp", "vector"];

/// A record of an executed migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Migration ID.
    pub id: String,
    /// File name at execution time.
    pub file_name: String,
    /// Batch the migration was executed in.
    pub batch: i32,
    /// Content hash at execution time.
    pub hash: String,
}

impl HistoryRecord {
    /// Build the record written when `file` is applied in `batch`.
    pub fn applied(file: &MigrationFile, batch: i32) -> Self {
        Self {
            id: file.id.to_string(),
            file_name: file.file_name.clone(),
            batch,
            hash: file.hash.clone(),
        }
    }
}

/// Migration history repository.
#[async_trait]
pub trait MigrationHistoryRepository: Send + Sync {
    /// Create the history table and required extensions.
    ///
    /// Fails with `AlreadyInitialized` when the table exists.
    async fn initialize(&self) -> MigrateResult<()>;

    /// Highest recorded batch, or 0 when history is empty.
    async fn current_batch(&self) -> MigrateResult<i32>;

    /// Records executed in `batch`.
    async fn records_in_batch(&self, batch: i32) -> MigrateResult<Vec<HistoryRecord>>;

    /// Every record.
    async fn all_records(&self) -> MigrateResult<Vec<HistoryRecord>>;

    /// Record `file` as applied in `batch`. Fails with `DuplicateId` when present.
    async fn insert(&self, batch: i32, file: &MigrationFile) -> MigrateResult<()>;

    /// Delete the record for `id`.
    async fn remove(&self, id: &str) -> MigrateResult<()>;
}

/// Live database handle handed to migration actions.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute one or more statements, discarding any rows.
    async fn batch_execute(&self, sql: &str) -> MigrateResult<()>;
}

/// A single connection that carries history and migration SQL in one transaction.
#[async_trait]
pub trait MigrationConnection: SqlExecutor + MigrationHistoryRepository {
    /// Start a transaction.
    async fn begin(&self) -> MigrateResult<()>;

    /// Commit the open transaction.
    async fn commit(&self) -> MigrateResult<()>;

    /// Discard the open transaction.
    async fn rollback(&self) -> MigrateResult<()>;
}

/// Name and setup of the history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTable {
    /// Table name.
    pub name: String,
    /// Database extensions created alongside the table.
    pub extensions: Vec<String>,
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl HistoryTable {
    /// Create a table definition with the default extensions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Replace the extension list.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Quoted table name.
    pub fn quoted(&self) -> String {
        quote_ident(&self.name)
    }

    /// DDL for `initialize`. The table itself has no `IF NOT EXISTS`.
    pub fn init_sql(&self) -> String {
        let mut sql = format!(
            "CREATE TABLE {}(\n    id text primary key,\n    file_name text,\n    batch integer,\n    hash text);\n",
            self.quoted()
        );

        for extension in &self.extensions {
            sql.push_str(&format!(
                "CREATE EXTENSION IF NOT EXISTS {} SCHEMA public;\n",
                quote_ident(extension)
            ));
        }

        sql
    }

    /// Query for the current batch.
    pub fn current_batch_sql(&self) -> String {
        format!("SELECT COALESCE(MAX(batch), 0) FROM {}", self.quoted())
    }

    /// Query for all records.
    pub fn select_all_sql(&self) -> String {
        format!("SELECT id, file_name, batch, hash FROM {}", self.quoted())
    }

    /// Query for the records of one batch (`$1` = batch).
    pub fn select_batch_sql(&self) -> String {
        format!(
            "SELECT id, file_name, batch, hash FROM {} WHERE batch = $1",
            self.quoted()
        )
    }

    /// Insert statement (`$1..$4` = id, file_name, batch, hash).
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {}(id, file_name, batch, hash) VALUES ($1, $2, $3, $4)",
            self.quoted()
        )
    }

    /// Delete statement (`$1` = id).
    pub fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE id = $1", self.quoted())
    }
}

/// Quote an SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
