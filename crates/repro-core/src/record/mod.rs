//! Per-artifact build records.
//!
//! A build record is the provenance document written next to an artifact
//! when it is built: the command that ran, the git state of the analysis
//! tree at build time, and a content fingerprint of every declared input
//! and output. One record per artifact, one file per build; a rebuild fully
//! replaces the previous record.
//!
//! Records are YAML, human-readable and diff-friendly, written atomically
//! so a crash never leaves a torn document.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::git::{self, RepoState};
use crate::hash::{self, HashError};
use crate::persist;

/// Errors from writing or loading build records.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    /// A declared input or output does not exist. The whole write is
    /// aborted; no partial record is persisted.
    #[error("cannot fingerprint missing file: {path}")]
    MissingFile {
        /// The missing path.
        path: String,
    },

    /// No build record exists at the expected location.
    #[error("no build record at {path}")]
    MissingRecord {
        /// Where the record was expected.
        path: String,
    },

    /// A record file exists but cannot be parsed.
    #[error("malformed build record {path}: {reason}")]
    Malformed {
        /// The unparseable record file.
        path: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Content hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Filesystem failure while fingerprinting or persisting.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The record could not be serialized.
    #[error("failed to serialize build record: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Content identity of one file: hash, size, and modification time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// Absolute path at fingerprint time.
    pub path: String,
    /// Hex-encoded SHA-256 of the file bytes.
    pub sha256: String,
    /// File size in bytes.
    pub bytes: u64,
    /// Modification time, seconds since the epoch at platform resolution.
    pub mtime: f64,
}

/// Fingerprint a single file.
///
/// # Errors
///
/// [`RecordError::MissingFile`] if the path does not exist, otherwise
/// [`RecordError::Hash`] / [`RecordError::Io`] on read failures.
pub fn fingerprint(path: &Path) -> Result<FileFingerprint, RecordError> {
    let resolved = path.canonicalize().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RecordError::MissingFile {
                path: path.display().to_string(),
            }
        } else {
            RecordError::Io {
                path: path.display().to_string(),
                source: e,
            }
        }
    })?;

    let sha256 = hash::sha256_file(&resolved).map_err(|e| match e {
        HashError::NotFound { path } => RecordError::MissingFile { path },
        other => RecordError::Hash(other),
    })?;

    let metadata = std::fs::metadata(&resolved).map_err(|e| RecordError::Io {
        path: resolved.display().to_string(),
        source: e,
    })?;
    // Pre-epoch mtimes clamp to zero.
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0.0, |d| d.as_secs_f64());

    Ok(FileFingerprint {
        path: resolved.display().to_string(),
        sha256,
        bytes: metadata.len(),
        mtime,
    })
}

/// Provenance of one built artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Artifact name, unique within a build area.
    pub artifact: String,
    /// Build timestamp, ISO-8601 UTC at second precision.
    pub built_at_utc: String,
    /// The invoked command line, for audit and reproduction.
    pub command: Vec<String>,
    /// Git state of the analysis tree at build time.
    pub git: RepoState,
    /// Fingerprints of every declared input, in declaration order.
    pub inputs: Vec<FileFingerprint>,
    /// Fingerprints of every declared output, in declaration order.
    pub outputs: Vec<FileFingerprint>,
}

/// A build whose provenance has not been recorded yet.
///
/// The orchestrator constructs one per build invocation, declares the
/// inputs and outputs, and calls [`finalize`](Self::finalize) exactly once
/// after the outputs exist. Finalization consumes the handle, so a second
/// record for the same build is impossible without constructing a new one.
#[derive(Debug, Clone)]
pub struct PendingBuild {
    artifact: String,
    command: Vec<String>,
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
}

impl PendingBuild {
    /// Start a pending build for `artifact`, produced by `command`.
    #[must_use]
    pub fn new(artifact: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            artifact: artifact.into(),
            command,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Declare one input path.
    #[must_use]
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    /// Declare input paths, preserving order.
    #[must_use]
    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Declare one output path.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    /// Declare output paths, preserving order.
    #[must_use]
    pub fn outputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.outputs.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Fingerprint all declared files, snapshot git state rooted at
    /// `repo_root`, and atomically write the record to `destination`.
    ///
    /// Inputs are fingerprinted before outputs, each in declaration order.
    /// If any declared path is missing the whole operation aborts and
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// [`RecordError::MissingFile`] for an absent declared path,
    /// [`RecordError::Io`] / [`RecordError::Serialize`] on persistence
    /// failure.
    pub fn finalize(self, repo_root: &Path, destination: &Path) -> Result<BuildRecord, RecordError> {
        let git = git::read_state(repo_root);

        let mut inputs = Vec::with_capacity(self.inputs.len());
        for path in &self.inputs {
            inputs.push(fingerprint(path)?);
        }
        let mut outputs = Vec::with_capacity(self.outputs.len());
        for path in &self.outputs {
            outputs.push(fingerprint(path)?);
        }

        let record = BuildRecord {
            artifact: self.artifact,
            built_at_utc: now_utc_iso(),
            command: self.command,
            git,
            inputs,
            outputs,
        };

        let yaml = serde_yaml::to_string(&record)?;
        persist::atomic_write(destination, yaml.as_bytes()).map_err(|e| RecordError::Io {
            path: destination.display().to_string(),
            source: e,
        })?;
        tracing::debug!(
            artifact = %record.artifact,
            destination = %destination.display(),
            "wrote build record"
        );

        Ok(record)
    }
}

/// Load a build record from `path`.
///
/// # Errors
///
/// [`RecordError::MissingRecord`] if absent, [`RecordError::Malformed`] if
/// present but unparseable.
pub fn load_build_record(path: &Path) -> Result<BuildRecord, RecordError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RecordError::MissingRecord {
                path: path.display().to_string(),
            }
        } else {
            RecordError::Io {
                path: path.display().to_string(),
                source: e,
            }
        }
    })?;
    serde_yaml::from_str(&content).map_err(|e| RecordError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Current UTC time, ISO-8601 at second precision.
#[must_use]
pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
