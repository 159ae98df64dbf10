//! The publish ledger: one aggregated provenance document per publish
//! destination.
//!
//! The ledger records, for every published artifact or file, the most
//! recent publication event together with the full build record that
//! produced it. It is updated incrementally across publish invocations and
//! supports two mutually exclusive addressing modes: by logical artifact
//! name (`artifacts`) or by explicit file path (`files`). Mixing the two in
//! one ledger would produce ambiguous provenance, so switching modes clears
//! the other section entirely.
//!
//! Entries are never deleted automatically: a publish call only adds or
//! overwrites entries for what it was asked to publish. Files dropped from
//! the published set linger until cleaned manually — a known operational
//! caveat, recorded here rather than silently "fixed".
//!
//! A ledger that fails to parse is a hard error. Provenance corruption is
//! non-recoverable data loss; reinitialising the document silently would
//! hide it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::git::RepoState;
use crate::persist;
use crate::record::BuildRecord;

#[cfg(test)]
mod tests;

/// Current ledger schema version.
pub const PAPER_PROVENANCE_VERSION: u32 = 1;

/// Errors from loading or saving a publish ledger.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// The ledger file exists but cannot be parsed. Never silently
    /// reinitialised.
    #[error("corrupt publish ledger at {path}: {reason}; refusing to reset provenance history")]
    Corrupt {
        /// The unreadable ledger file.
        path: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Filesystem failure reading or writing the ledger.
    #[error("I/O error on ledger {path}: {source}")]
    Io {
        /// The ledger path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The ledger could not be serialized.
    #[error("failed to serialize publish ledger: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// One publication event for an artifact file or an explicit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// When this entry was last published, ISO-8601 UTC.
    pub published_at_utc: String,
    /// Whether bytes were actually copied. False when the destination
    /// already matched the source by hash; the entry is still refreshed.
    pub copied: bool,
    /// Absolute source path in the build area.
    pub src: String,
    /// Absolute destination path in the publish area.
    pub dst: String,
    /// Content hash of the destination after publishing.
    pub dst_sha256: String,
    /// Originating artifact name, when derivable (file-level entries).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_name: Option<String>,
    /// The build record that produced the source. Always present for
    /// artifact-level entries; present for file-level entries when the
    /// originating build could be inferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_record: Option<BuildRecord>,
}

/// Aggregated provenance document at a publish destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishLedger {
    /// Ledger schema version, for forward compatibility.
    pub paper_provenance_version: u32,
    /// Timestamp of the most recent successful publish call.
    pub last_updated_utc: String,
    /// Analysis-repo state as of the most recent publish call.
    pub analysis_git: RepoState,
    /// Artifact-level entries: name → kind → entry.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, BTreeMap<String, LedgerEntry>>,
    /// File-level entries: output-relative path → entry.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, LedgerEntry>,
}

impl PublishLedger {
    /// Fresh ledger stamped with `now` and `state`.
    #[must_use]
    pub fn new(now: String, state: RepoState) -> Self {
        Self {
            paper_provenance_version: PAPER_PROVENANCE_VERSION,
            last_updated_utc: now,
            analysis_git: state,
            artifacts: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Load the ledger at `path`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Corrupt`] when the file exists but cannot be
    /// parsed, and [`LedgerError::Io`] on read failure. Absence is
    /// `Ok(None)`, not an error.
    pub fn load(path: &Path) -> Result<Option<Self>, LedgerError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LedgerError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        let ledger = serde_yaml::from_str(&content).map_err(|e| LedgerError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(ledger))
    }

    /// Load the ledger at `path`, or start a fresh one stamped with `now`
    /// and `state`.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load); corruption is never papered over.
    pub fn load_or_new(path: &Path, now: String, state: RepoState) -> Result<Self, LedgerError> {
        Ok(Self::load(path)?.unwrap_or_else(|| Self::new(now, state)))
    }

    /// Insert or replace an artifact-level entry.
    ///
    /// Switching from file-level addressing clears the `files` section:
    /// the two modes are mutually exclusive.
    pub fn upsert_artifact(&mut self, name: &str, kind: &str, entry: LedgerEntry) {
        if !self.files.is_empty() {
            tracing::info!(
                dropped = self.files.len(),
                "switching publish ledger to artifact-level addressing"
            );
            self.files.clear();
        }
        self.artifacts
            .entry(name.to_string())
            .or_default()
            .insert(kind.to_string(), entry);
    }

    /// Insert or replace a file-level entry, keyed by output-relative path.
    ///
    /// Switching from artifact-level addressing clears the `artifacts`
    /// section: the two modes are mutually exclusive.
    pub fn upsert_file(&mut self, rel_path: &str, entry: LedgerEntry) {
        if !self.artifacts.is_empty() {
            tracing::info!(
                dropped = self.artifacts.len(),
                "switching publish ledger to file-level addressing"
            );
            self.artifacts.clear();
        }
        self.files.insert(rel_path.to_string(), entry);
    }

    /// Refresh `last_updated_utc` and `analysis_git` to the values of the
    /// current publish call. Called on every successful publish, including
    /// ones that copied nothing.
    pub fn touch(&mut self, now: String, state: RepoState) {
        self.last_updated_utc = now;
        self.analysis_git = state;
    }

    /// Atomically persist the ledger to `path`.
    ///
    /// The ledger on disk is either the previous document or this one,
    /// never a partial write.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Serialize`] or [`LedgerError::Io`].
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let yaml = serde_yaml::to_string(self)?;
        persist::atomic_write(path, yaml.as_bytes()).map_err(|e| LedgerError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }
}
