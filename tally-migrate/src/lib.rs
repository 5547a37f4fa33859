//! # tally-migrate
//!
//! Batch migration engine for tally.
//!
//! This crate provides functionality for:
//! - Discovering migration files named `<hex-id>-<name>.<ext>`
//! - Fingerprinting migration contents with SHA-256
//! - Tracking applied migrations in a history table, grouped into batches
//! - Reconciling files against history and detecting drift
//! - Applying or reverting one batch inside a single transaction
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ Catalog      │────▶│ Reconciler     │────▶│ Plan        │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!                              ▲                     │
//!                              │                     ▼
//!                      ┌────────────────┐     ┌─────────────┐
//!                      │ History Table  │◀────│ Executor    │
//!                      └────────────────┘     └─────────────┘
//! ```
//!
//! Every `migrate` or `rollback` call reads, plans, executes and records
//! inside one transaction. Any failure reverts all of it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tally_migrate::{MigrationConfig, MigrationEngine};
//!
//! async fn run(conn: &impl tally_migrate::MigrationConnection) -> tally_migrate::MigrateResult<()> {
//!     let engine = MigrationEngine::new(MigrationConfig::new().migrations_dir("./migrations"));
//!
//!     let result = engine.migrate(conn, true).await?;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! Each file holds the forward and backward SQL, with optional
//! row-level-security sections:
//!
//! ```text
//! -- migrate
//! CREATE TABLE users (id uuid primary key);
//!
//! -- migrate:rls
//! ALTER TABLE users ENABLE ROW LEVEL SECURITY;
//!
//! -- rollback:rls
//! ALTER TABLE users DISABLE ROW LEVEL SECURITY;
//!
//! -- rollback
//! DROP TABLE users;
//! ```
//!
//! Migrations written in Rust implement [`Migration`] and are registered
//! by id in a [`MigrationRegistry`]; nothing is evaluated from disk.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod history;
pub mod id;
pub mod memory;
pub mod migration;
pub mod reconcile;

pub use catalog::{MigrationCatalog, MigrationFile, parse_file_name};
pub use engine::{
    MigrationConfig, MigrationEngine, MigrationHooks, MigrationResult, transactional,
};
pub use error::{MigrateResult, MigrationError};
pub use hasher::{hash_bytes, hash_file};
pub use history::{
    HistoryRecord, HistoryTable, MigrationConnection, MigrationHistoryRepository, SqlExecutor,
    quote_ident,
};
pub use id::MigrationId;
pub use memory::MemoryConnection;
pub use migration::{Direction, Migration, MigrationRegistry, SqlMigration};
pub use reconcile::{
    MigrationPlan, MigrationState, MigrationStatus, StatusEntry, plan_forward, plan_rollback,
};
