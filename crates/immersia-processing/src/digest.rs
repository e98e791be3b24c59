//! Content digest utility.
//!
//! SHA-256 over the file bytes, streamed in fixed-size reads. Used to verify
//! assembled output against an optional caller-supplied digest and for
//! dedup detection downstream.

use sha2::{Digest as Sha2Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Outcome of digesting a file.
///
/// `Fallback` is the degraded mode: the source could not be read, and the
/// value is a random token substituted so the asset still carries an
/// identifier. A fallback token is non-deterministic and must never be
/// treated as a content fingerprint; dedup and integrity verification do not
/// work for assets carrying one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Digest {
    /// Hex-encoded SHA-256 of the file content.
    Content(String),
    /// Random substitute token; not derived from the content.
    Fallback(String),
}

impl Digest {
    pub fn value(&self) -> &str {
        match self {
            Digest::Content(hash) => hash,
            Digest::Fallback(token) => token,
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Digest::Content(_))
    }
}

/// Hex-encoded SHA-256 of a byte slice.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest a file's content, streaming it from disk.
///
/// Falls back to a random token when the file cannot be opened or read; the
/// caller sees that explicitly through the `Digest::Fallback` variant.
pub async fn digest_file(path: &Path) -> Digest {
    match try_digest_file(path).await {
        Ok(hash) => Digest::Content(hash),
        Err(e) => {
            let token = Uuid::new_v4().simple().to_string();
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to digest file; substituting random token"
            );
            Digest::Fallback(token)
        }
    }
}

async fn try_digest_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_digest_bytes_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            digest_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_digest_file_matches_digest_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        let digest = digest_file(&path).await;
        assert!(digest.is_content());
        assert_eq!(digest.value(), digest_bytes(&data));
    }

    #[tokio::test]
    async fn test_digest_missing_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let digest = digest_file(&path).await;
        assert!(!digest.is_content());
        assert!(!digest.value().is_empty());

        // Fallback tokens are random, not stable
        let again = digest_file(&path).await;
        assert_ne!(digest.value(), again.value());
    }
}
