//! PostgreSQL migration connection.

use async_trait::async_trait;
use tally_migrate::{
    HistoryRecord, HistoryTable, MigrateResult, MigrationConnection, MigrationError,
    MigrationFile, MigrationHistoryRepository, SqlExecutor,
};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error};

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};

/// A single PostgreSQL session used for one migration run.
///
/// The session is closed when the value is dropped; an open transaction is
/// then rolled back by the server.
pub struct PgMigrationConnection {
    client: Client,
    table: HistoryTable,
    driver: JoinHandle<()>,
}

impl PgMigrationConnection {
    /// Open a session.
    pub async fn connect(config: &PgConfig, table: HistoryTable) -> PgResult<Self> {
        debug!(url = %config.redacted_url(), table = %table.name, "Connecting");
        let (client, connection) = config.to_pg_config().connect(NoTls).await?;

        // Spawn the connection handler
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Connection error");
            }
        });

        Ok(Self {
            client,
            table,
            driver,
        })
    }

    /// History table this connection reads and writes.
    pub fn table(&self) -> &HistoryTable {
        &self.table
    }

    /// Get the underlying tokio-postgres client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn sql_err<'a>(
        &'a self,
        id: Option<&'a str>,
    ) -> impl FnOnce(tokio_postgres::Error) -> MigrationError + 'a {
        move |e| PgError::from(e).into_migration_error(&self.table.name, id)
    }
}

impl Drop for PgMigrationConnection {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

fn record_from_row(row: &Row) -> MigrateResult<HistoryRecord> {
    let get = |e: tokio_postgres::Error| MigrationError::database(format!("invalid history row: {}", e));

    Ok(history_record(
        row.try_get(0).map_err(get)?,
        row.try_get(1).map_err(get)?,
        row.try_get(2).map_err(get)?,
        row.try_get(3).map_err(get)?,
    ))
}

/// Build a record from history columns; only `id` is `NOT NULL`.
fn history_record(
    id: String,
    file_name: Option<String>,
    batch: Option<i32>,
    hash: Option<String>,
) -> HistoryRecord {
    HistoryRecord {
        id,
        file_name: file_name.unwrap_or_default(),
        batch: batch.unwrap_or(0),
        hash: hash.unwrap_or_default(),
    }
}

#[async_trait]
impl SqlExecutor for PgMigrationConnection {
    async fn batch_execute(&self, sql: &str) -> MigrateResult<()> {
        debug!(sql = %sql, "Executing batch");
        self.client.batch_execute(sql).await.map_err(self.sql_err(None))
    }
}

#[async_trait]
impl MigrationHistoryRepository for PgMigrationConnection {
    async fn initialize(&self) -> MigrateResult<()> {
        let sql = self.table.init_sql();
        debug!(sql = %sql, "Creating history table");
        self.client.batch_execute(&sql).await.map_err(self.sql_err(None))
    }

    async fn current_batch(&self) -> MigrateResult<i32> {
        let row = self
            .client
            .query_one(&self.table.current_batch_sql(), &[])
            .await
            .map_err(self.sql_err(None))?;
        row.try_get::<_, i32>(0)
            .map_err(|e| MigrationError::database(format!("invalid batch number: {}", e)))
    }

    async fn records_in_batch(&self, batch: i32) -> MigrateResult<Vec<HistoryRecord>> {
        let rows = self
            .client
            .query(&self.table.select_batch_sql(), &[&batch])
            .await
            .map_err(self.sql_err(None))?;
        rows.iter().map(record_from_row).collect()
    }

    async fn all_records(&self) -> MigrateResult<Vec<HistoryRecord>> {
        let rows = self
            .client
            .query(&self.table.select_all_sql(), &[])
            .await
            .map_err(self.sql_err(None))?;
        rows.iter().map(record_from_row).collect()
    }

    async fn insert(&self, batch: i32, file: &MigrationFile) -> MigrateResult<()> {
        let id = file.id.as_str();
        self.client
            .execute(
                &self.table.insert_sql(),
                &[&id, &file.file_name, &batch, &file.hash],
            )
            .await
            .map_err(self.sql_err(Some(id)))?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> MigrateResult<()> {
        self.client
            .execute(&self.table.delete_sql(), &[&id])
            .await
            .map_err(self.sql_err(Some(id)))?;
        Ok(())
    }
}

#[async_trait]
impl MigrationConnection for PgMigrationConnection {
    async fn begin(&self) -> MigrateResult<()> {
        debug!("Beginning transaction");
        self.client.batch_execute("BEGIN").await.map_err(self.sql_err(None))
    }

    async fn commit(&self) -> MigrateResult<()> {
        debug!("Committing transaction");
        self.client.batch_execute("COMMIT").await.map_err(self.sql_err(None))
    }

    async fn rollback(&self) -> MigrateResult<()> {
        debug!("Rolling back transaction");
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(self.sql_err(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_history_record_columns() {
        let record = history_record(
            "668f863e".to_string(),
            Some("668f863e-add-memory-metadata.sql".to_string()),
            Some(3),
            Some("ab12".to_string()),
        );
        assert_eq!(record.id, "668f863e");
        assert_eq!(record.file_name, "668f863e-add-memory-metadata.sql");
        assert_eq!(record.batch, 3);
        assert_eq!(record.hash, "ab12");
    }

    #[test]
    fn test_history_record_null_columns() {
        let record = history_record("1".to_string(), None, None, None);
        assert_eq!(record.id, "1");
        assert_eq!(record.file_name, "");
        assert_eq!(record.batch, 0);
        assert_eq!(record.hash, "");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let mut config = PgConfig::from_url("postgresql://postgres@127.0.0.1:1/tally").unwrap();
        config.connect_timeout = Duration::from_secs(1);

        let result = PgMigrationConnection::connect(&config, HistoryTable::default()).await;
        let err = result.err().unwrap();
        assert!(matches!(err, PgError::Postgres(_)));

        let err: MigrationError = err.into();
        assert!(matches!(err, MigrationError::Database(_)));
    }
}
