//! Error types for PostgreSQL operations.

use tally_migrate::MigrationError;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// SQLSTATE for `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for `duplicate_table`.
pub const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE for `undefined_table`.
pub const UNDEFINED_TABLE: &str = "42P01";

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Postgres(e) => e.is_closed(),
            Self::Config(_) => false,
        }
    }

    /// SQLSTATE code reported by the server, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => e.code().map(|code| code.code()),
            _ => None,
        }
    }

    /// Message to show an operator: the server's own message when there is one.
    pub fn detail(&self) -> String {
        match self {
            Self::Postgres(e) => match e.as_db_error() {
                Some(db) => db.message().to_string(),
                None => e.to_string(),
            },
            other => other.to_string(),
        }
    }

    /// Map to a migration error, giving `table` and `id` context to
    /// constraint failures.
    pub fn into_migration_error(self, table: &str, id: Option<&str>) -> MigrationError {
        match classify_sql_state(self.sql_state(), table, id) {
            Some(err) => err,
            None => self.into(),
        }
    }
}

/// Migration error for a SQLSTATE with a dedicated variant.
pub fn classify_sql_state(
    state: Option<&str>,
    table: &str,
    id: Option<&str>,
) -> Option<MigrationError> {
    match (state?, id) {
        (UNIQUE_VIOLATION, Some(id)) => Some(MigrationError::DuplicateId(id.to_string())),
        (DUPLICATE_TABLE, _) => Some(MigrationError::AlreadyInitialized(table.to_string())),
        _ => None,
    }
}

impl From<PgError> for MigrationError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Postgres(_) => MigrationError::database(err.detail()),
            PgError::Config(msg) => MigrationError::other(format!("configuration error: {}", msg)),
            PgError::Connection(msg) => MigrationError::database(format!("connection error: {}", msg)),
        }
    }
}
