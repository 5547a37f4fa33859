//! Migration engine implementation.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::catalog::{DEFAULT_EXTENSION, MigrationCatalog, MigrationFile};
use crate::error::MigrateResult;
use crate::history::{MigrationConnection, SqlExecutor};
use crate::migration::{Direction, Migration, MigrationRegistry};
use crate::reconcile::{self, MigrationPlan, MigrationStatus};

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Extension of migration files, without the dot.
    pub extension: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Set the migration file extension.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

/// Callbacks for reporting progress while a batch runs.
#[derive(Default)]
pub struct MigrationHooks {
    /// Called once a non-empty plan is about to run.
    pub on_batch: Option<Box<dyn Fn(&MigrationPlan) + Send + Sync>>,
    /// Called before each migration action.
    pub before_migration: Option<Box<dyn Fn(Direction, &MigrationFile) + Send + Sync>>,
    /// Called for each planning warning.
    pub on_warning: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl fmt::Debug for MigrationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationHooks")
            .field("on_batch", &self.on_batch.is_some())
            .field("before_migration", &self.before_migration.is_some())
            .field("on_warning", &self.on_warning.is_some())
            .finish()
    }
}

/// Result of a migrate or rollback run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    /// Direction of the run.
    pub direction: Direction,
    /// Batch created or reverted (0 when nothing ran).
    pub batch: i32,
    /// File names in execution order.
    pub migrations: Vec<String>,
    /// Warnings raised while planning.
    pub warnings: Vec<String>,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
}

impl MigrationResult {
    fn empty(direction: Direction) -> Self {
        Self {
            direction,
            batch: 0,
            migrations: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Check if any migration ran.
    pub fn has_changes(&self) -> bool {
        !self.migrations.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        if !self.has_changes() {
            return match self.direction {
                Direction::Forward => "No migrations applied".to_string(),
                Direction::Backward => "No migrations rolled back".to_string(),
            };
        }

        let verb = match self.direction {
            Direction::Forward => "applied",
            Direction::Backward => "rolled back",
        };
        format!(
            "{} {} in batch {} ({}ms)",
            self.migrations.len(),
            verb,
            self.batch,
            self.duration_ms
        )
    }
}

/// Run `work` inside a transaction on `conn`, committing only on success.
pub async fn transactional<C, T, F>(conn: &C, work: F) -> MigrateResult<T>
where
    C: MigrationConnection,
    F: Future<Output = MigrateResult<T>>,
{
    conn.begin().await?;
    debug!("Transaction started");

    match work.await {
        Ok(value) => {
            conn.commit().await?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.rollback().await {
                warn!(error = %rollback_err, "Failed to roll back transaction");
            } else {
                debug!("Transaction rolled back");
            }
            Err(err)
        }
    }
}

/// The main migration engine.
#[derive(Debug)]
pub struct MigrationEngine {
    config: MigrationConfig,
    catalog: MigrationCatalog,
    registry: MigrationRegistry,
    hooks: MigrationHooks,
}

impl MigrationEngine {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig) -> Self {
        Self::with_registry(config, MigrationRegistry::new())
    }

    /// Create a new migration engine with Rust-defined migrations.
    pub fn with_registry(config: MigrationConfig, registry: MigrationRegistry) -> Self {
        let catalog =
            MigrationCatalog::new(&config.migrations_dir).with_extension(&config.extension);
        Self {
            config,
            catalog,
            registry,
            hooks: MigrationHooks::default(),
        }
    }

    /// Set progress hooks.
    pub fn with_hooks(mut self, hooks: MigrationHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the migration catalog.
    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    /// Create a new migration file from the template.
    pub async fn create(&self, name: &str) -> MigrateResult<PathBuf> {
        let path = self.catalog.create(name).await?;
        info!(path = %path.display(), "Created migration");
        Ok(path)
    }

    /// Create the migrations directory and the history table.
    pub async fn initialize<C: MigrationConnection>(&self, conn: &C) -> MigrateResult<()> {
        self.catalog.ensure_dir().await?;
        transactional(conn, conn.initialize()).await?;
        info!("Migration history initialized");
        Ok(())
    }

    /// Plan the next forward batch without running it.
    pub async fn plan<C: MigrationConnection>(&self, conn: &C) -> MigrateResult<MigrationPlan> {
        transactional(conn, self.plan_forward(conn)).await
    }

    /// Plan a rollback of the current batch without running it.
    pub async fn plan_rollback<C: MigrationConnection>(
        &self,
        conn: &C,
        force: bool,
    ) -> MigrateResult<MigrationPlan> {
        transactional(conn, self.plan_backward(conn, force)).await
    }

    /// Apply every new migration as one batch in one transaction.
    pub async fn migrate<C: MigrationConnection>(
        &self,
        conn: &C,
        rls: bool,
    ) -> MigrateResult<MigrationResult> {
        let work = async {
            let plan = self.plan_forward(conn).await?;
            self.run_plan(conn, plan, rls).await
        };
        transactional(conn, work).await
    }

    /// Revert the most recent batch in one transaction.
    pub async fn rollback<C: MigrationConnection>(
        &self,
        conn: &C,
        force: bool,
        rls: bool,
    ) -> MigrateResult<MigrationResult> {
        let work = async {
            let plan = self.plan_backward(conn, force).await?;
            self.run_plan(conn, plan, rls).await
        };
        transactional(conn, work).await
    }

    /// Report applied, pending and drifted migrations.
    pub async fn status<C: MigrationConnection>(&self, conn: &C) -> MigrateResult<MigrationStatus> {
        let work = async {
            let catalog = self.catalog.list().await?;
            let history = conn.all_records().await?;
            Ok(reconcile::status(&catalog, &history))
        };
        transactional(conn, work).await
    }

    /// Run forward actions and record them in a new batch.
    ///
    /// Must be called inside a transaction; returns the batch number.
    pub async fn apply_forward<C: MigrationConnection>(
        &self,
        conn: &C,
        migrations: &[MigrationFile],
        rls: bool,
    ) -> MigrateResult<i32> {
        let actions = self.load_all(migrations).await?;
        let batch = conn.current_batch().await? + 1;
        self.execute_forward(conn, batch, migrations, &actions, rls)
            .await?;
        Ok(batch)
    }

    /// Run backward actions and delete their history records.
    ///
    /// Must be called inside a transaction; `migrations` must already be in
    /// descending order.
    pub async fn apply_backward<C: MigrationConnection>(
        &self,
        conn: &C,
        migrations: &[MigrationFile],
        rls: bool,
    ) -> MigrateResult<()> {
        let actions = self.load_all(migrations).await?;
        self.execute_backward(conn, migrations, &actions, rls).await
    }

    async fn plan_forward<C: MigrationConnection>(&self, conn: &C) -> MigrateResult<MigrationPlan> {
        let catalog = self.catalog.list().await?;
        let history = conn.all_records().await?;
        reconcile::plan_forward(&catalog, &history)
    }

    async fn plan_backward<C: MigrationConnection>(
        &self,
        conn: &C,
        force: bool,
    ) -> MigrateResult<MigrationPlan> {
        let catalog = self.catalog.list().await?;
        let batch = conn.current_batch().await?;
        let records = conn.records_in_batch(batch).await?;
        reconcile::plan_rollback(&catalog, &records, batch, force)
    }

    async fn run_plan<C: MigrationConnection>(
        &self,
        conn: &C,
        plan: MigrationPlan,
        rls: bool,
    ) -> MigrateResult<MigrationResult> {
        if let Some(on_warning) = &self.hooks.on_warning {
            for warning in &plan.warnings {
                on_warning(warning);
            }
        }

        if plan.is_empty() {
            info!(direction = %plan.direction, "{}", plan.summary());
            let mut result = MigrationResult::empty(plan.direction);
            result.warnings = plan.warnings;
            return Ok(result);
        }

        let start = Instant::now();
        let actions = self.load_all(&plan.migrations).await?;

        info!(direction = %plan.direction, batch = plan.batch, count = plan.len(), "{}", plan.summary());
        if let Some(on_batch) = &self.hooks.on_batch {
            on_batch(&plan);
        }

        match plan.direction {
            Direction::Forward => {
                self.execute_forward(conn, plan.batch, &plan.migrations, &actions, rls)
                    .await?
            }
            Direction::Backward => {
                self.execute_backward(conn, &plan.migrations, &actions, rls)
                    .await?
            }
        }

        Ok(MigrationResult {
            direction: plan.direction,
            batch: plan.batch,
            migrations: plan.file_names(),
            warnings: plan.warnings,
            duration_ms: i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX),
        })
    }

    async fn load_all(&self, migrations: &[MigrationFile]) -> MigrateResult<Vec<Arc<dyn Migration>>> {
        let mut actions = Vec::with_capacity(migrations.len());
        for file in migrations {
            actions.push(self.registry.load(file).await?);
        }
        Ok(actions)
    }

    async fn execute_forward<C: MigrationConnection>(
        &self,
        conn: &C,
        batch: i32,
        migrations: &[MigrationFile],
        actions: &[Arc<dyn Migration>],
        rls: bool,
    ) -> MigrateResult<()> {
        for (file, action) in migrations.iter().zip(actions) {
            debug!(id = %file.id, file = %file.file_name, batch, "Executing migration");
            self.run_action(Direction::Forward, conn, file, action, rls)
                .await?;
            conn.insert(batch, file).await?;
        }
        Ok(())
    }

    async fn execute_backward<C: MigrationConnection>(
        &self,
        conn: &C,
        migrations: &[MigrationFile],
        actions: &[Arc<dyn Migration>],
        rls: bool,
    ) -> MigrateResult<()> {
        for (file, action) in migrations.iter().zip(actions) {
            debug!(id = %file.id, file = %file.file_name, "Rolling back migration");
            self.run_action(Direction::Backward, conn, file, action, rls)
                .await?;
            conn.remove(file.id.as_str()).await?;
        }
        Ok(())
    }

    async fn run_action<C: MigrationConnection>(
        &self,
        direction: Direction,
        conn: &C,
        file: &MigrationFile,
        action: &Arc<dyn Migration>,
        rls: bool,
    ) -> MigrateResult<()> {
        self.notify(direction, file);
        let handle: &dyn SqlExecutor = conn;
        direction.run(action.as_ref(), handle, rls).await
    }

    fn notify(&self, direction: Direction, file: &MigrationFile) {
        if let Some(before) = &self.hooks.before_migration {
            before(direction, file);
        }
    }
}
