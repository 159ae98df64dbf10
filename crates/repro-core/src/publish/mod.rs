//! Promotion of built artifacts into a publish area.
//!
//! One [`publish`] call is one synchronous pass: check → copy → ledger
//! update. The safety checker runs first and a single violation stops the
//! pass before any file is touched. Copies are content-compared so an
//! unchanged destination is never rewritten, and each copy is individually
//! atomic. The ledger is saved exactly once, after every copy is known, so
//! a failed pass leaves the destination ledger exactly as it was.
//!
//! A copy failure aborts the remaining items. Files copied before the
//! failure stay in place — each was atomically complete — but none of them
//! reach the ledger until a later successful pass republishes them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::{ArtifactKind, LEDGER_FILE_NAME, ProjectLayout};
use crate::git::{self, RepoState};
use crate::hash::{self, HashError};
use crate::ledger::{LedgerEntry, LedgerError, PublishLedger};
use crate::persist;
use crate::record::{self, BuildRecord, now_utc_iso};
use crate::safety::{self, SafetyError, SafetyOptions, Violation};

#[cfg(test)]
mod tests;

/// What to publish: whole named artifacts of one kind, or explicit files
/// out of the build output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishSelection {
    /// Publish `<name>.<ext>` for each name, from the kind's build
    /// directory into the kind's destination directory.
    Artifacts {
        /// Artifact base names.
        names: Vec<String>,
        /// Which artifact kind to publish.
        kind: ArtifactKind,
    },
    /// Publish explicit output files, preserving their layout under the
    /// output directory.
    Files {
        /// Paths inside the build output directory, absolute or
        /// repo-relative.
        paths: Vec<PathBuf>,
    },
}

/// Per-item outcome of a publish pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Destination content changed; bytes were copied.
    Copied,
    /// Destination already matched the source by hash; nothing written.
    Unchanged,
}

/// One published item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedItem {
    /// Artifact name (artifact mode) or output-relative path (file mode).
    pub name: String,
    /// Source path in the build area.
    pub src: PathBuf,
    /// Destination path in the publish area.
    pub dst: PathBuf,
    /// Copied or unchanged.
    pub status: ItemStatus,
}

/// Result of a successful publish pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// Every item, in publish order.
    pub items: Vec<PublishedItem>,
    /// Analysis-repo state recorded into the ledger.
    pub state: RepoState,
}

impl PublishReport {
    /// Number of items whose bytes were actually copied.
    #[must_use]
    pub fn copied_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Copied)
            .count()
    }
}

/// Errors from a publish pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PublishError {
    /// The safety checker found violations. Nothing was touched; the full
    /// list is surfaced.
    #[error("publish blocked by {} safety violation(s)", violations.len())]
    Blocked {
        /// Every violation, in evaluation order.
        violations: Vec<Violation>,
    },

    /// The checking step itself failed (e.g. an unbuilt candidate).
    #[error(transparent)]
    Safety(#[from] SafetyError),

    /// A source artifact to publish does not exist.
    #[error("missing source artifact {path}; build it first")]
    MissingSource {
        /// The absent source path.
        path: String,
    },

    /// A file-mode path is not inside the build output directory.
    #[error("{path} is not inside the output directory {output_dir}; only build outputs can be published")]
    OutsideOutputDir {
        /// The offending path.
        path: String,
        /// The expected enclosing directory.
        output_dir: String,
    },

    /// Copying a file failed. Completed copies stay; the ledger is not
    /// updated.
    #[error("failed to copy {src} to {dst}: {source}")]
    Copy {
        /// Source path.
        src: String,
        /// Destination path.
        dst: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Hashing during content comparison failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// The destination ledger could not be loaded or saved.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Candidate resolved to concrete paths, ready for the copy phase.
struct PlannedItem {
    name: String,
    src: PathBuf,
    dst: PathBuf,
    analysis_name: Option<String>,
    build_record: Option<BuildRecord>,
}

/// Run one publish pass.
///
/// `Checking`: evaluate the safety options against the live repository
/// state and the candidates' build records; any violation aborts with
/// [`PublishError::Blocked`] before any file is touched. `Copying`: copy
/// each changed source into the publish area (unchanged destinations are
/// detected by hash and skipped). `LedgerUpdate`: upsert one entry per
/// item into the destination ledger, refresh its timestamp and repo
/// state, and save it atomically, exactly once.
///
/// # Errors
///
/// See [`PublishError`]. On any error the destination ledger is untouched.
pub fn publish(
    layout: &ProjectLayout,
    paper_root: &Path,
    selection: &PublishSelection,
    options: &SafetyOptions,
) -> Result<PublishReport, PublishError> {
    // Checking.
    let (state, violations, planned) = match selection {
        PublishSelection::Artifacts { names, kind } => {
            let outcome = safety::check_candidates(layout, names, options)?;
            let planned = plan_artifacts(layout, paper_root, names, *kind, &outcome.records)?;
            (outcome.state, outcome.violations, planned)
        }
        PublishSelection::Files { paths } => {
            let planned = plan_files(layout, paper_root, paths)?;
            // Record-level checks apply to whichever builds could be
            // inferred from the selected files.
            let records: BTreeMap<String, BuildRecord> = planned
                .iter()
                .filter_map(|item| {
                    Some((item.analysis_name.clone()?, item.build_record.clone()?))
                })
                .collect();
            let state = git::read_state(&layout.repo_root);
            let violations = safety::evaluate(&state, &records, options);
            (state, violations, planned)
        }
    };
    if !violations.is_empty() {
        return Err(PublishError::Blocked { violations });
    }

    // Copying.
    let mut items = Vec::with_capacity(planned.len());
    let mut entries = Vec::with_capacity(planned.len());
    for item in &planned {
        let copied = copy_if_changed(&item.src, &item.dst)?;
        let dst_sha256 = hash::sha256_file(&item.dst)?;
        tracing::info!(
            name = %item.name,
            dst = %item.dst.display(),
            copied,
            "published"
        );
        items.push(PublishedItem {
            name: item.name.clone(),
            src: item.src.clone(),
            dst: item.dst.clone(),
            status: if copied {
                ItemStatus::Copied
            } else {
                ItemStatus::Unchanged
            },
        });
        entries.push(LedgerEntry {
            published_at_utc: now_utc_iso(),
            copied,
            src: item.src.display().to_string(),
            dst: item.dst.display().to_string(),
            dst_sha256,
            analysis_name: item.analysis_name.clone(),
            build_record: item.build_record.clone(),
        });
    }

    // LedgerUpdate: one load, one save, after all copies are known.
    let ledger_path = paper_root.join(LEDGER_FILE_NAME);
    let now = now_utc_iso();
    let mut ledger = PublishLedger::load_or_new(&ledger_path, now.clone(), state.clone())?;
    for (item, entry) in planned.iter().zip(entries) {
        match selection {
            PublishSelection::Artifacts { kind, .. } => {
                ledger.upsert_artifact(&item.name, kind.dir_name(), entry);
            }
            PublishSelection::Files { .. } => {
                ledger.upsert_file(&item.name, entry);
            }
        }
    }
    ledger.touch(now, state.clone());
    ledger.save(&ledger_path)?;

    Ok(PublishReport { items, state })
}

/// Resolve artifact names to source/destination paths.
fn plan_artifacts(
    layout: &ProjectLayout,
    paper_root: &Path,
    names: &[String],
    kind: ArtifactKind,
    records: &BTreeMap<String, BuildRecord>,
) -> Result<Vec<PlannedItem>, PublishError> {
    let dst_dir = paper_root.join(kind.dir_name());
    names
        .iter()
        .map(|name| {
            let src = layout.artifact_source(name, kind);
            if !src.is_file() {
                return Err(PublishError::MissingSource {
                    path: src.display().to_string(),
                });
            }
            let dst = dst_dir.join(format!("{name}.{}", kind.extension()));
            Ok(PlannedItem {
                name: name.clone(),
                src,
                dst,
                analysis_name: None,
                build_record: records.get(name).cloned(),
            })
        })
        .collect()
}

/// Resolve explicit output files to destinations mirroring the output
/// tree, and infer each file's originating build record.
fn plan_files(
    layout: &ProjectLayout,
    paper_root: &Path,
    paths: &[PathBuf],
) -> Result<Vec<PlannedItem>, PublishError> {
    paths
        .iter()
        .map(|path| {
            let src = if path.is_absolute() {
                path.clone()
            } else {
                layout.repo_root.join(path)
            };
            if !src.is_file() {
                return Err(PublishError::MissingSource {
                    path: src.display().to_string(),
                });
            }
            // A source that cannot be resolved cannot be published.
            let src = src
                .canonicalize()
                .map_err(|_| PublishError::MissingSource {
                    path: src.display().to_string(),
                })?;

            let output_dir = layout
                .output_dir
                .canonicalize()
                .unwrap_or_else(|_| layout.output_dir.clone());
            let rel = src
                .strip_prefix(&output_dir)
                .map_err(|_| PublishError::OutsideOutputDir {
                    path: src.display().to_string(),
                    output_dir: output_dir.display().to_string(),
                })?
                .to_path_buf();

            let inferred = infer_analysis(layout, &src);
            Ok(PlannedItem {
                name: rel.display().to_string(),
                dst: paper_root.join(&rel),
                src,
                analysis_name: inferred.as_ref().map(|(name, _)| name.clone()),
                build_record: inferred.map(|(_, record)| record),
            })
        })
        .collect()
}

/// Find the build record whose outputs include `src`, scanning the records
/// directory. Malformed records are skipped: inference is best-effort
/// traceability, not a gate.
fn infer_analysis(layout: &ProjectLayout, src: &Path) -> Option<(String, BuildRecord)> {
    let dir = std::fs::read_dir(&layout.records_dir).ok()?;
    for dir_entry in dir.flatten() {
        let path = dir_entry.path();
        if path.extension().is_none_or(|ext| ext != "yml") {
            continue;
        }
        let Ok(record) = record::load_build_record(&path) else {
            continue;
        };
        if record
            .outputs
            .iter()
            .any(|output| Path::new(&output.path) == src)
        {
            let name = path.file_stem()?.to_string_lossy().into_owned();
            return Some((name, record));
        }
    }
    None
}

/// Copy `src` over `dst` unless the destination already has identical
/// content. Returns whether bytes were copied.
fn copy_if_changed(src: &Path, dst: &Path) -> Result<bool, PublishError> {
    if dst.exists() && hash::sha256_file(src)? == hash::sha256_file(dst)? {
        return Ok(false);
    }
    persist::atomic_copy(src, dst).map_err(|e| PublishError::Copy {
        src: src.display().to_string(),
        dst: dst.display().to_string(),
        source: e,
    })?;
    Ok(true)
}
