//! Reconciliation of the migration catalog against recorded history.
//!
//! Everything here is pure: the engine reads the catalog and history, and these
//! functions decide what to run or report why nothing can run.

use std::collections::HashMap;

use tracing::warn;

use crate::catalog::MigrationFile;
use crate::error::{MigrateResult, MigrationError};
use crate::history::HistoryRecord;
use crate::id::MigrationId;
use crate::migration::Direction;

/// Ordered work list produced by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Which action the migrations will run.
    pub direction: Direction,
    /// Batch created (forward) or reverted (backward).
    pub batch: i32,
    /// Migrations in execution order.
    pub migrations: Vec<MigrationFile>,
    /// Warnings raised while planning.
    pub warnings: Vec<String>,
}

impl MigrationPlan {
    /// Create an empty plan.
    pub fn empty(direction: Direction, batch: i32) -> Self {
        Self {
            direction,
            batch,
            migrations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Check if there's anything to run.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Number of migrations in the plan.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// File names in execution order.
    pub fn file_names(&self) -> Vec<String> {
        self.migrations.iter().map(|m| m.file_name.clone()).collect()
    }

    /// Get a summary of the plan.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return match self.direction {
                Direction::Forward => "No new migrations".to_string(),
                Direction::Backward => "Nothing to rollback".to_string(),
            };
        }

        let plural = if self.len() > 1 { "s" } else { "" };
        match self.direction {
            Direction::Forward => format!(
                "{} new migration{} found, executing batch {}",
                self.len(),
                plural,
                self.batch
            ),
            Direction::Backward => format!(
                "{} migration{} found in batch {}, rolling back batch {}",
                self.len(),
                plural,
                self.batch,
                self.batch
            ),
        }
    }
}

fn index_catalog(catalog: &[MigrationFile]) -> HashMap<&str, &MigrationFile> {
    catalog.iter().map(|m| (m.id.as_str(), m)).collect()
}

fn mismatch(record: &HistoryRecord, file: &MigrationFile, rollback: bool) -> MigrationError {
    MigrationError::HashMismatch {
        id: record.id.clone(),
        recorded_file: record.file_name.clone(),
        file_name: file.file_name.clone(),
        recorded_hash: record.hash.clone(),
        current_hash: file.hash.clone(),
        rollback,
    }
}

/// Compute the migrations to apply, ascending by id.
///
/// Every history record must still have a file with an unchanged hash.
pub fn plan_forward(
    catalog: &[MigrationFile],
    history: &[HistoryRecord],
) -> MigrateResult<MigrationPlan> {
    let mut pending = index_catalog(catalog);

    for record in history {
        let file = pending
            .get(record.id.as_str())
            .copied()
            .ok_or_else(|| MigrationError::missing(&record.id, &record.file_name))?;

        if file.hash != record.hash {
            return Err(mismatch(record, file, false));
        }

        pending.remove(record.id.as_str());
    }

    let mut migrations: Vec<MigrationFile> = pending.into_values().cloned().collect();
    migrations.sort_by(|a, b| a.id.cmp(&b.id));

    let batch = history.iter().map(|r| r.batch).max().unwrap_or(0) + 1;
    Ok(MigrationPlan {
        direction: Direction::Forward,
        batch,
        migrations,
        warnings: Vec::new(),
    })
}

/// Compute the migrations to revert from `target_batch`, descending by id.
///
/// With `force`, hash drift is reported as a warning instead of an error.
pub fn plan_rollback(
    catalog: &[MigrationFile],
    history: &[HistoryRecord],
    target_batch: i32,
    force: bool,
) -> MigrateResult<MigrationPlan> {
    let files = index_catalog(catalog);
    let mut plan = MigrationPlan::empty(Direction::Backward, target_batch);

    for record in history.iter().filter(|r| r.batch == target_batch) {
        let file = files
            .get(record.id.as_str())
            .copied()
            .ok_or_else(|| MigrationError::missing(&record.id, &record.file_name))?;

        if file.hash != record.hash {
            if !force {
                return Err(mismatch(record, file, true));
            }

            warn!(
                id = %record.id,
                recorded = %record.hash,
                current = %file.hash,
                "Forcing rollback of migration with diverging hash"
            );
            plan.warnings.push(format!(
                "Forcing rollback of migration with diverging hash (id: {})...",
                record.id
            ));
        }

        plan.migrations.push(file.clone());
    }

    plan.migrations.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(plan)
}

/// State of one catalog file relative to history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    /// Not executed yet.
    Pending,
    /// Executed in `batch` with a matching hash.
    Applied {
        /// Batch number.
        batch: i32,
    },
    /// Executed in `batch`, but the file changed since.
    Drifted {
        /// Batch number.
        batch: i32,
        /// Hash recorded at execution time.
        recorded_hash: String,
    },
}

/// Status line for one catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Migration ID.
    pub id: MigrationId,
    /// File name.
    pub file_name: String,
    /// State relative to history.
    pub state: MigrationState,
}

/// Migration status information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// One entry per catalog file, ascending by id.
    pub entries: Vec<StatusEntry>,
    /// History records with no catalog file.
    pub missing: Vec<HistoryRecord>,
    /// Highest recorded batch.
    pub current_batch: i32,
}

impl MigrationStatus {
    /// Number of applied migrations (including drifted ones).
    pub fn applied_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e.state, MigrationState::Pending))
            .count()
    }

    /// Number of pending migrations.
    pub fn pending_count(&self) -> usize {
        self.entries.len() - self.applied_count()
    }

    /// Number of drifted migrations.
    pub fn drifted_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, MigrationState::Drifted { .. }))
            .count()
    }

    /// Check that history and catalog agree.
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.drifted_count() == 0
    }
}

/// Describe every catalog file and every orphaned history record.
pub fn status(catalog: &[MigrationFile], history: &[HistoryRecord]) -> MigrationStatus {
    let recorded: HashMap<&str, &HistoryRecord> =
        history.iter().map(|r| (r.id.as_str(), r)).collect();
    let files = index_catalog(catalog);

    let mut entries: Vec<StatusEntry> = catalog
        .iter()
        .map(|file| {
            let state = match recorded.get(file.id.as_str()) {
                None => MigrationState::Pending,
                Some(record) if record.hash == file.hash => MigrationState::Applied {
                    batch: record.batch,
                },
                Some(record) => MigrationState::Drifted {
                    batch: record.batch,
                    recorded_hash: record.hash.clone(),
                },
            };
            StatusEntry {
                id: file.id.clone(),
                file_name: file.file_name.clone(),
                state,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));

    let missing = history
        .iter()
        .filter(|r| !files.contains_key(r.id.as_str()))
        .cloned()
        .collect();

    MigrationStatus {
        entries,
        missing,
        current_batch: history.iter().map(|r| r.batch).max().unwrap_or(0),
    }
}
