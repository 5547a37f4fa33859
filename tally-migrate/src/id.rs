//! Migration identifiers.
//!
//! An identifier is the hex prefix of a migration file name. It is compared by
//! its numeric value so `a` (10) sorts before `14` (20) even though the text
//! would order them the other way.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// A hex-encoded, numerically ordered migration identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MigrationId {
    token: String,
    value: u64,
}

impl MigrationId {
    /// Parse a hex token as it appears in a file name.
    pub fn parse(token: &str) -> MigrateResult<Self> {
        if token.is_empty() {
            return Err(MigrationError::malformed(token, "empty migration id"));
        }

        if !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MigrationError::malformed(
                token,
                format!("migration id '{}' is not hexadecimal", token),
            ));
        }

        let value = u64::from_str_radix(token, 16).map_err(|_| {
            MigrationError::malformed(token, format!("migration id '{}' is too large", token))
        })?;

        Ok(Self {
            token: token.to_string(),
            value,
        })
    }

    /// Encode a creation timestamp (seconds since the epoch) as an identifier.
    pub fn from_timestamp(secs: u64) -> Self {
        Self {
            token: format!("{:x}", secs),
            value: secs,
        }
    }

    /// The identifier as written in the file name and stored in history.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Numeric value of the identifier.
    pub fn value(&self) -> u64 {
        self.value
    }
}

impl Ord for MigrationId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.token.cmp(&other.token))
    }
}

impl PartialOrd for MigrationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}
