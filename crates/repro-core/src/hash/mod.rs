//! Content hashing for provenance fingerprints.
//!
//! Digests are computed over exact file bytes only — never over names,
//! paths, or metadata — so two files with identical content always hash
//! identically regardless of where they live.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Read buffer size for file hashing (1 MiB), so large artifacts are never
/// loaded into memory whole.
const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Errors from content hashing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HashError {
    /// The path to hash does not exist.
    #[error("file not found: {path}")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The unreadable path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Compute the SHA-256 digest of a file's content, hex-encoded lowercase.
///
/// Reads in bounded-size chunks. Deterministic with respect to content:
/// same bytes, same digest.
///
/// # Errors
///
/// Returns [`HashError::NotFound`] if the path does not exist and
/// [`HashError::Io`] on any read failure.
pub fn sha256_file(path: &Path) -> Result<String, HashError> {
    let map_io = |e: std::io::Error| {
        if e.kind() == std::io::ErrorKind::NotFound {
            HashError::NotFound {
                path: path.display().to_string(),
            }
        } else {
            HashError::Io {
                path: path.display().to_string(),
                source: e,
            }
        }
    };

    let mut file = File::open(path).map_err(map_io)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(map_io)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
