//! # Tally
//!
//! Batch database migrations with drift detection.
//!
//! Tally provides:
//! - Migration files named `<hex-id>-<name>.sql`, applied in id order
//! - A history table grouping applied migrations into batches
//! - SHA-256 fingerprints that refuse to run against edited history
//! - All-or-nothing execution: a batch applies or reverts completely
//! - Rust-defined migrations registered by id alongside SQL files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tally::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PgConfig::from_url("postgresql://localhost/mydb")?;
//!     let conn = PgMigrationConnection::connect(&config, HistoryTable::default()).await?;
//!
//!     let engine = MigrationEngine::new(MigrationConfig::new().migrations_dir("./migrations"));
//!     let result = engine.migrate(&conn, true).await?;
//!     println!("{}", result.summary());
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration engine, catalog, history and reconciliation.
pub mod migrate {
    pub use tally_migrate::*;
}

/// PostgreSQL backend.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use tally_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Direction, HistoryTable, MigrateResult, Migration, MigrationConfig, MigrationConnection,
        MigrationEngine, MigrationError, MigrationRegistry, SqlExecutor,
    };
    #[cfg(feature = "postgres")]
    pub use crate::postgres::{PgConfig, PgMigrationConnection};
}

// Re-export key types at the crate root
pub use tally_migrate::{MigrateResult, MigrationEngine, MigrationError};
