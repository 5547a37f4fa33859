//! In-memory migration connection.
//!
//! Keeps history and executed SQL in process memory with real transaction
//! semantics: work done after `begin` is only visible to other readers once
//! committed and disappears on rollback. Statements can be made to fail to
//! exercise the all-or-nothing path.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::catalog::MigrationFile;
use crate::error::{MigrateResult, MigrationError};
use crate::history::{
    HistoryRecord, HistoryTable, MigrationConnection, MigrationHistoryRepository, SqlExecutor,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    initialized: bool,
    records: Vec<HistoryRecord>,
    statements: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    committed: MemoryState,
    working: Option<MemoryState>,
    fail_on: Vec<String>,
}

impl Inner {
    fn visible(&self) -> &MemoryState {
        self.working.as_ref().unwrap_or(&self.committed)
    }

    fn visible_mut(&mut self) -> &mut MemoryState {
        self.working.as_mut().unwrap_or(&mut self.committed)
    }
}

/// A [`MigrationConnection`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    table: HistoryTable,
    inner: Mutex<Inner>,
}

impl MemoryConnection {
    /// Create a connection to an empty, uninitialized database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connection whose history table already exists.
    pub fn initialized() -> Self {
        let conn = Self::new();
        conn.inner.lock().committed.initialized = true;
        conn
    }

    /// Use a different history table definition.
    pub fn with_table(mut self, table: HistoryTable) -> Self {
        self.table = table;
        self
    }

    /// Seed committed history, initializing the table.
    pub fn with_records(self, records: impl IntoIterator<Item = HistoryRecord>) -> Self {
        {
            let mut inner = self.inner.lock();
            inner.committed.initialized = true;
            inner.committed.records.extend(records);
        }
        self
    }

    /// Make any statement containing `pattern` fail.
    pub fn fail_on(self, pattern: impl Into<String>) -> Self {
        self.inner.lock().fail_on.push(pattern.into());
        self
    }

    /// Statements executed so far, as seen inside the current transaction.
    pub fn statements(&self) -> Vec<String> {
        self.inner.lock().visible().statements.clone()
    }

    /// History records, as seen inside the current transaction.
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.inner.lock().visible().records.clone()
    }

    /// Check whether the history table exists.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().visible().initialized
    }

    /// Check whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.inner.lock().working.is_some()
    }

    fn with_table_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> MigrateResult<T>,
    ) -> MigrateResult<T> {
        let mut inner = self.inner.lock();
        let state = inner.visible_mut();
        if !state.initialized {
            return Err(MigrationError::database(format!(
                "relation {} does not exist",
                self.table.quoted()
            )));
        }
        f(state)
    }
}

#[async_trait]
impl SqlExecutor for MemoryConnection {
    async fn batch_execute(&self, sql: &str) -> MigrateResult<()> {
        let mut inner = self.inner.lock();
        if let Some(pattern) = inner.fail_on.iter().find(|p| sql.contains(p.as_str())) {
            return Err(MigrationError::database(format!(
                "statement failed near \"{}\"",
                pattern
            )));
        }

        debug!(sql = %sql, "Executing batch");
        inner.visible_mut().statements.push(sql.to_string());
        Ok(())
    }
}

#[async_trait]
impl MigrationHistoryRepository for MemoryConnection {
    async fn initialize(&self) -> MigrateResult<()> {
        let mut inner = self.inner.lock();
        let state = inner.visible_mut();
        if state.initialized {
            return Err(MigrationError::AlreadyInitialized(self.table.name.clone()));
        }
        state.initialized = true;
        state.statements.push(self.table.init_sql());
        Ok(())
    }

    async fn current_batch(&self) -> MigrateResult<i32> {
        self.with_table_state(|state| {
            Ok(state.records.iter().map(|r| r.batch).max().unwrap_or(0))
        })
    }

    async fn records_in_batch(&self, batch: i32) -> MigrateResult<Vec<HistoryRecord>> {
        self.with_table_state(|state| {
            Ok(state
                .records
                .iter()
                .filter(|r| r.batch == batch)
                .cloned()
                .collect())
        })
    }

    async fn all_records(&self) -> MigrateResult<Vec<HistoryRecord>> {
        self.with_table_state(|state| Ok(state.records.clone()))
    }

    async fn insert(&self, batch: i32, file: &MigrationFile) -> MigrateResult<()> {
        self.with_table_state(|state| {
            if state.records.iter().any(|r| r.id == file.id.as_str()) {
                return Err(MigrationError::DuplicateId(file.id.to_string()));
            }
            state.records.push(HistoryRecord::applied(file, batch));
            Ok(())
        })
    }

    async fn remove(&self, id: &str) -> MigrateResult<()> {
        self.with_table_state(|state| {
            state.records.retain(|r| r.id != id);
            Ok(())
        })
    }
}

#[async_trait]
impl MigrationConnection for MemoryConnection {
    async fn begin(&self) -> MigrateResult<()> {
        let mut inner = self.inner.lock();
        if inner.working.is_some() {
            return Err(MigrationError::database("transaction already in progress"));
        }
        inner.working = Some(inner.committed.clone());
        Ok(())
    }

    async fn commit(&self) -> MigrateResult<()> {
        let mut inner = self.inner.lock();
        let working = inner
            .working
            .take()
            .ok_or_else(|| MigrationError::database("no transaction in progress"))?;
        inner.committed = working;
        Ok(())
    }

    async fn rollback(&self) -> MigrateResult<()> {
        let mut inner = self.inner.lock();
        inner
            .working
            .take()
            .ok_or_else(|| MigrationError::database("no transaction in progress"))?;
        Ok(())
    }
}
