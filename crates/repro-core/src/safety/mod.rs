//! Publication safety checks.
//!
//! Before artifacts are promoted into a publish area, the checker reads the
//! candidates' build records plus the live repository state and evaluates
//! the enabled preconditions. All violations are collected in one pass —
//! the caller always sees the complete picture, never just the first
//! failure. Checking never mutates the build area, the repository, or any
//! ledger.
//!
//! A directory that is not under version control passes the repo-level
//! checks: degraded traceability is allowed, refusing to publish is not
//! the checker's call in that case.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::config::ProjectLayout;
use crate::git::{self, RepoState};
use crate::hash::{self, HashError};
use crate::record::{self, BuildRecord, RecordError};

/// Which preconditions to enforce before publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyOptions {
    /// Permit a dirty current tree, and candidates built from dirty trees.
    /// Default false: publishing requires a clean rebuild from a clean tree.
    pub allow_dirty: bool,
    /// Refuse to publish while the branch is behind its upstream.
    /// Default true.
    pub require_not_behind: bool,
    /// Require every candidate's build commit to match the current HEAD.
    /// Default false.
    pub require_current_head: bool,
}

impl Default for SafetyOptions {
    fn default() -> Self {
        Self {
            allow_dirty: false,
            require_not_behind: true,
            require_current_head: false,
        }
    }
}

/// One failed publication precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The current working tree has uncommitted modifications.
    DirtyWorkingTree,

    /// A candidate's build record shows it was built from a dirty tree.
    BuildFromDirtyTree {
        /// The offending artifact.
        artifact: String,
    },

    /// The current branch is behind its configured upstream.
    BehindUpstream {
        /// Number of commits behind.
        behind: u32,
    },

    /// A candidate was built from a commit other than the current HEAD.
    StaleArtifact {
        /// The offending artifact.
        artifact: String,
        /// Commit the artifact was built from.
        built_commit: String,
        /// The current HEAD commit.
        head_commit: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirtyWorkingTree => write!(
                f,
                "refusing to publish from a dirty working tree; commit or stash first, \
                 or explicitly allow dirty publishes"
            ),
            Self::BuildFromDirtyTree { artifact } => write!(
                f,
                "artifact '{artifact}' was built from a dirty working tree; \
                 rebuild it from a clean tree"
            ),
            Self::BehindUpstream { behind } => write!(
                f,
                "branch is behind upstream by {behind} commit(s); pull or rebase first"
            ),
            Self::StaleArtifact {
                artifact,
                built_commit,
                head_commit,
            } => write!(
                f,
                "artifact '{artifact}' was built from {}, but HEAD is {}; rebuild it",
                short_commit(built_commit),
                short_commit(head_commit)
            ),
        }
    }
}

fn short_commit(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

/// Hard failures of the checking process itself, distinct from policy
/// violations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SafetyError {
    /// A candidate has no build record yet. Candidates must be built before
    /// they can be checked.
    #[error("missing build record for artifact '{artifact}' at {path}; build it first")]
    MissingRecord {
        /// The unbuilt candidate.
        artifact: String,
        /// Where its record was expected.
        path: String,
    },

    /// A candidate's record exists but could not be loaded.
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Result of a safety check: the live state, the candidates' records, and
/// every violation found.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Live repository state at check time.
    pub state: RepoState,
    /// Loaded build records, keyed by artifact name.
    pub records: BTreeMap<String, BuildRecord>,
    /// All violations across all enabled checks. Empty means pass.
    pub violations: Vec<Violation>,
}

impl CheckOutcome {
    /// Whether every enabled check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check named candidates against the enabled preconditions.
///
/// Loads each candidate's build record from the layout's records
/// directory, reads the live repository state once, and evaluates every
/// enabled check over every candidate.
///
/// # Errors
///
/// Returns [`SafetyError::MissingRecord`] for a candidate that was never
/// built, or [`SafetyError::Record`] when a record exists but cannot be
/// parsed. Policy violations are not errors — they are collected in the
/// returned [`CheckOutcome`].
pub fn check_candidates(
    layout: &ProjectLayout,
    names: &[String],
    options: &SafetyOptions,
) -> Result<CheckOutcome, SafetyError> {
    let mut records = BTreeMap::new();
    for name in names {
        let path = layout.record_path(name);
        if !path.is_file() {
            return Err(SafetyError::MissingRecord {
                artifact: name.clone(),
                path: path.display().to_string(),
            });
        }
        records.insert(name.clone(), record::load_build_record(&path)?);
    }

    let state = git::read_state(&layout.repo_root);
    let violations = evaluate(&state, &records, options);
    if !violations.is_empty() {
        tracing::debug!(count = violations.len(), "safety check found violations");
    }

    Ok(CheckOutcome {
        state,
        records,
        violations,
    })
}

/// Evaluate the enabled checks against a live state and a set of loaded
/// records, collecting every violation.
#[must_use]
pub fn evaluate(
    state: &RepoState,
    records: &BTreeMap<String, BuildRecord>,
    options: &SafetyOptions,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !options.allow_dirty {
        if state.is_dirty() {
            violations.push(Violation::DirtyWorkingTree);
        }
        for (name, record) in records {
            if record.git.is_dirty() {
                violations.push(Violation::BuildFromDirtyTree {
                    artifact: name.clone(),
                });
            }
        }
    }

    if options.require_not_behind {
        let behind = state.behind_count();
        if behind > 0 {
            violations.push(Violation::BehindUpstream { behind });
        }
    }

    if options.require_current_head {
        if let Some(head) = state.head_commit() {
            for (name, record) in records {
                if let Some(built) = record.git.head_commit() {
                    if built != head {
                        violations.push(Violation::StaleArtifact {
                            artifact: name.clone(),
                            built_commit: built.to_string(),
                            head_commit: head.to_string(),
                        });
                    }
                }
            }
        }
    }

    violations
}

/// Drift between a recorded output fingerprint and the file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDrift {
    /// The recorded output path.
    pub path: String,
    /// Hash recorded at build time.
    pub recorded_sha256: String,
    /// Current hash, or `None` when the file no longer exists.
    pub actual_sha256: Option<String>,
}

/// Recompute every recorded output hash and report files that were
/// modified or deleted after the build.
///
/// # Errors
///
/// Returns [`HashError::Io`] if an existing output cannot be read. A
/// missing output is drift, not an error.
pub fn verify_outputs(record: &BuildRecord) -> Result<Vec<OutputDrift>, HashError> {
    let mut drift = Vec::new();
    for output in &record.outputs {
        match hash::sha256_file(Path::new(&output.path)) {
            Ok(actual) if actual == output.sha256 => {}
            Ok(actual) => drift.push(OutputDrift {
                path: output.path.clone(),
                recorded_sha256: output.sha256.clone(),
                actual_sha256: Some(actual),
            }),
            Err(HashError::NotFound { .. }) => drift.push(OutputDrift {
                path: output.path.clone(),
                recorded_sha256: output.sha256.clone(),
                actual_sha256: None,
            }),
            Err(e) => return Err(e),
        }
    }
    Ok(drift)
}
