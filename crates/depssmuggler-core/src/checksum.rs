//! Streaming checksum verification for downloaded artifacts.

use crate::error::{CoreError, Result};
use crate::package::{Checksum, ChecksumKind};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Incremental digest over one of the three checksum kinds an ecosystem
/// registry might publish (pip/npm use SHA-256, Maven publishes SHA-1 and
/// MD5 sidecar files, Conda/OCI use SHA-256).
pub enum StreamingVerifier {
    Sha1(Sha1),
    Sha256(Sha256),
    Md5(Md5),
}

impl StreamingVerifier {
    pub fn new(kind: ChecksumKind) -> Self {
        match kind {
            ChecksumKind::Sha1 => Self::Sha1(Sha1::new()),
            ChecksumKind::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumKind::Md5 => Self::Md5(Md5::new()),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(chunk),
            Self::Sha256(h) => h.update(chunk),
            Self::Md5(h) => h.update(chunk),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Verifies `bytes` against `expected`, case-insensitively (registries are
/// inconsistent about hex digest casing).
pub fn verify_bytes(bytes: &[u8], expected: &Checksum) -> Result<()> {
    let mut verifier = StreamingVerifier::new(expected.kind);
    verifier.update(bytes);
    let actual = verifier.finalize_hex();
    if actual.eq_ignore_ascii_case(&expected.hex) {
        Ok(())
    } else {
        Err(CoreError::ChecksumMismatch {
            artifact: "in-memory payload".to_string(),
            expected: expected.hex.clone(),
            actual,
        })
    }
}

/// Verifies a file already written to disk, removing it on mismatch so a
/// retry never finds a half-trusted artifact sitting in the output tree.
pub fn verify_file(path: &Path, expected: &Checksum) -> Result<()> {
    let bytes = std::fs::read(path)?;
    match verify_bytes(&bytes, expected) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = std::fs::remove_file(path);
            Err(match err {
                CoreError::ChecksumMismatch { expected, actual, .. } => CoreError::ChecksumMismatch {
                    artifact: path.display().to_string(),
                    expected,
                    actual,
                },
                other => other,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_digest() {
        let mut verifier = StreamingVerifier::new(ChecksumKind::Sha256);
        verifier.update(b"hello");
        let digest = verifier.finalize_hex();
        let checksum = Checksum {
            kind: ChecksumKind::Sha256,
            hex: digest,
        };
        assert!(verify_bytes(b"hello", &checksum).is_ok());
    }

    #[test]
    fn mismatch_is_reported_with_both_digests() {
        let checksum = Checksum {
            kind: ChecksumKind::Sha256,
            hex: "0".repeat(64),
        };
        let err = verify_bytes(b"hello", &checksum).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn verify_file_removes_partial_file_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        std::fs::write(&path, b"corrupted").unwrap();

        let checksum = Checksum {
            kind: ChecksumKind::Sha256,
            hex: "0".repeat(64),
        };
        let result = verify_file(&path, &checksum);
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn hex_comparison_is_case_insensitive() {
        let mut verifier = StreamingVerifier::new(ChecksumKind::Sha256);
        verifier.update(b"hello");
        let digest = verifier.finalize_hex().to_uppercase();
        let checksum = Checksum {
            kind: ChecksumKind::Sha256,
            hex: digest,
        };
        assert!(verify_bytes(b"hello", &checksum).is_ok());
    }
}
