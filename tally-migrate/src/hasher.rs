//! Content fingerprints for migration files.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::MigrateResult;

/// Hex-encoded SHA-256 of the full contents of a file.
pub async fn hash_file(path: impl AsRef<Path>) -> MigrateResult<String> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(hash_bytes(&bytes))
}

/// Hex-encoded SHA-256 of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_known_vector() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_bytes_detects_change() {
        assert_eq!(hash_bytes(b"SELECT 1;"), hash_bytes(b"SELECT 1;"));
        assert_ne!(hash_bytes(b"SELECT 1;"), hash_bytes(b"SELECT 2;"));
    }

    #[tokio::test]
    async fn test_hash_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1-test.sql");
        std::fs::write(&path, "-- migrate\n-- rollback\n").unwrap();

        let hash = hash_file(&path).await.unwrap();
        assert_eq!(hash, hash_bytes(b"-- migrate\n-- rollback\n"));
        assert_eq!(hash.len(), 64);
    }
}
