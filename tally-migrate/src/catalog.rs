//! Migration catalog: discovery and scaffolding of migration files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::hasher::hash_file;
use crate::id::MigrationId;

/// Default file extension for migration files.
pub const DEFAULT_EXTENSION: &str = "sql";

/// Contents written by [`MigrationCatalog::create`].
pub const TEMPLATE: &str = "\
-- migrate
-- SELECT 1;

-- rollback
-- SELECT 1;
";

/// A migration file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFile {
    /// Migration ID (extracted from the file name).
    pub id: MigrationId,
    /// File name, relative to the catalog directory.
    pub file_name: String,
    /// Content hash of the file.
    pub hash: String,
    /// Path to the file.
    pub path: PathBuf,
}

/// Reads and scaffolds migration files in a single directory.
#[derive(Debug, Clone)]
pub struct MigrationCatalog {
    migrations_dir: PathBuf,
    extension: String,
}

impl MigrationCatalog {
    /// Create a catalog over a directory using the default extension.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Use a different file extension (without the leading dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Get the migration file extension.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Ensure the migrations directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir).await?;
        Ok(())
    }

    /// List all migration files, ascending by numeric id.
    ///
    /// Files without the migration extension are ignored. A file with the
    /// extension whose name does not parse fails the whole listing.
    pub async fn list(&self) -> MigrateResult<Vec<MigrationFile>> {
        let mut migrations = Vec::new();

        if !self.migrations_dir.exists() {
            return Ok(migrations);
        }

        let mut seen = HashSet::new();
        for file_name in self.candidate_names().await? {
            let (id, _) = parse_file_name(&file_name, &self.extension)?;

            if !seen.insert(id.clone()) {
                return Err(MigrationError::DuplicateId(id.to_string()));
            }

            let path = self.migrations_dir.join(&file_name);
            let hash = hash_file(&path).await?;
            debug!(id = %id, file = %file_name, hash = %hash, "Found migration");

            migrations.push(MigrationFile {
                id,
                file_name,
                hash,
                path,
            });
        }

        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(migrations)
    }

    /// Write a new, empty migration and return its path.
    ///
    /// The id is the current Unix time in hex, moved forward while it collides
    /// with an existing file.
    pub async fn create(&self, name: &str) -> MigrateResult<PathBuf> {
        validate_name(name)?;
        self.ensure_dir().await?;

        let taken: HashSet<u64> = self
            .candidate_names()
            .await?
            .iter()
            .filter_map(|f| parse_file_name(f, &self.extension).ok())
            .map(|(id, _)| id.value())
            .collect();

        let mut secs = Utc::now().timestamp().max(0) as u64;
        while taken.contains(&secs) {
            secs += 1;
        }

        let id = MigrationId::from_timestamp(secs);
        let path = self
            .migrations_dir
            .join(format!("{}-{}.{}", id, name, self.extension));

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(TEMPLATE.as_bytes()).await?;
        file.flush().await?;

        debug!(id = %id, path = %path.display(), "Created migration");
        Ok(path)
    }

    /// Names of regular files carrying the migration extension.
    async fn candidate_names(&self) -> MigrateResult<Vec<String>> {
        let mut names = Vec::new();
        let suffix = format!(".{}", self.extension);

        let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };

            if name.starts_with('.') || !name.ends_with(&suffix) {
                continue;
            }

            names.push(name);
        }

        Ok(names)
    }
}

/// Parse `<id>-<name>.<ext>` into (id, name).
pub fn parse_file_name(file_name: &str, extension: &str) -> MigrateResult<(MigrationId, String)> {
    let stem = file_name
        .strip_suffix(extension)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(|| {
            MigrationError::malformed(file_name, format!("expected a .{} file", extension))
        })?;

    let (token, name) = stem.split_once('-').ok_or_else(|| {
        MigrationError::malformed(
            file_name,
            format!("expected <id>-<name>.{}", extension),
        )
    })?;

    if name.is_empty() {
        return Err(MigrationError::malformed(file_name, "missing migration name"));
    }

    let id = MigrationId::parse(token).map_err(|err| match err {
        MigrationError::MalformedFileName { reason, .. } => {
            MigrationError::malformed(file_name, reason)
        }
        other => other,
    })?;

    Ok((id, name.to_string()))
}

fn validate_name(name: &str) -> MigrateResult<()> {
    if name.trim().is_empty() {
        return Err(MigrationError::invalid("migration name must not be empty"));
    }

    if name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(MigrationError::invalid(format!(
            "migration name '{}' must be a plain file name",
            name
        )));
    }

    Ok(())
}
