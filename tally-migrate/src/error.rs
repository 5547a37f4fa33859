//! Error types for the migration engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation error.
    #[error("Database error: {0}")]
    Database(String),

    /// A file with the migration extension does not follow `<id>-<name>.<ext>`.
    #[error("Malformed migration file name \"{file_name}\": {reason}")]
    MalformedFileName {
        /// Offending file name.
        file_name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A migration recorded in history has no file in the catalog.
    #[error("Missing migration \"{file_name}\" (id: {id})")]
    MissingMigration {
        /// Recorded migration ID.
        id: String,
        /// File name recorded at execution time.
        file_name: String,
    },

    /// The file on disk differs from the one that was executed.
    #[error(
        "{prefix} \"{recorded_file}\" (id: {id}) and \"{file_name}\" (id: {id}) have the same id but their hash differs.\n(\"{recorded_hash}\" != \"{current_hash}\"){hint}",
        prefix = mismatch_prefix(.rollback),
        hint = force_hint(.rollback)
    )]
    HashMismatch {
        /// Migration ID.
        id: String,
        /// File name recorded in history.
        recorded_file: String,
        /// File name currently in the catalog.
        file_name: String,
        /// Hash recorded in history.
        recorded_hash: String,
        /// Hash of the file on disk.
        current_hash: String,
        /// Whether the mismatch was found while planning a rollback.
        rollback: bool,
    },

    /// A migration file was edited between listing and execution.
    #[error("Migration file \"{file_name}\" changed after it was listed.\n(\"{listed_hash}\" != \"{current_hash}\")")]
    ChangedOnDisk {
        /// Catalog file name.
        file_name: String,
        /// Hash computed when the catalog was listed.
        listed_hash: String,
        /// Hash of the contents read for execution.
        current_hash: String,
    },

    /// A history record with this ID already exists.
    #[error("Migration '{0}' has already been recorded")]
    DuplicateId(String),

    /// The history table already exists.
    #[error("Migration table '{0}' is already initialized")]
    AlreadyInitialized(String),

    /// Invalid migration file contents or arguments.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

const ROLLBACK_FORCE_HINT: &str = "\nIf this is intentional, you can force the rollback with \"--force\".\n\
DO NOT FORCE THE ROLLBACK IF THIS MESSAGE IS UNEXPECTED ! THIS COULD LEAD TO A BAD STATE WHERE IT'S IMPOSSIBLE TO KNOW WHICH MIGRATIONS HAVE BEEN EXECUTED OR NOT !";

fn mismatch_prefix(rollback: &bool) -> &'static str {
    if *rollback {
        "Migration"
    } else {
        "Already executed migration"
    }
}

fn force_hint(rollback: &bool) -> &'static str {
    if *rollback { ROLLBACK_FORCE_HINT } else { "" }
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a malformed file name error.
    pub fn malformed(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedFileName {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing migration error.
    pub fn missing(id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::MissingMigration {
            id: id.into(),
            file_name: file_name.into(),
        }
    }

    /// Create an invalid migration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this error reports divergence between history and the catalog.
    pub fn is_drift(&self) -> bool {
        matches!(
            self,
            Self::MissingMigration { .. } | Self::HashMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_display() {
        let err = MigrationError::missing("664c34de", "664c34de-allow-null.sql");
        let msg = err.to_string();
        assert!(msg.contains("664c34de-allow-null.sql"));
        assert!(msg.contains("id: 664c34de"));
    }

    #[test]
    fn test_changed_on_disk_display() {
        let err = MigrationError::ChangedOnDisk {
            file_name: "1-a.sql".to_string(),
            listed_hash: "abc".to_string(),
            current_hash: "xyz".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"1-a.sql\" changed after it was listed"));
        assert!(msg.contains("(\"abc\" != \"xyz\")"));
        assert!(!err.is_integrity());
    }

    #[test]
    fn test_hash_mismatch_display() {
        let err = MigrationError::HashMismatch {
            id: "a".to_string(),
            recorded_file: "a-old.sql".to_string(),
            file_name: "a-new.sql".to_string(),
            recorded_hash: "abc".to_string(),
            current_hash: "xyz".to_string(),
            rollback: false,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Already executed migration"));
        assert!(msg.contains("a-old.sql"));
        assert!(msg.contains("a-new.sql"));
        assert!(msg.contains("\"abc\" != \"xyz\""));
        assert!(!msg.contains("--force"));
    }

    #[test]
    fn test_rollback_hash_mismatch_mentions_force() {
        let err = MigrationError::HashMismatch {
            id: "a".to_string(),
            recorded_file: "a-x.sql".to_string(),
            file_name: "a-x.sql".to_string(),
            recorded_hash: "abc".to_string(),
            current_hash: "xyz".to_string(),
            rollback: true,
        };
        assert!(err.to_string().contains("--force"));
    }

    #[test]
    fn test_is_drift() {
        assert!(MigrationError::missing("a", "a-x.sql").is_drift());
        assert!(!MigrationError::DuplicateId("a".to_string()).is_drift());
        assert!(!MigrationError::database("connection").is_drift());
    }
}
