//! Git working-copy state inspection.
//!
//! [`read_state`] shells out to the `git` binary and reports the enclosing
//! repository's commit, branch, dirtiness, and ahead/behind counts relative
//! to the configured upstream. A directory outside any repository — or any
//! git failure at all — degrades to `is_git_repo: false` rather than an
//! error: callers treat that as valid data with reduced traceability.
//!
//! Dirtiness covers tracked modifications and staged changes (`git diff
//! --quiet`, `git diff --cached --quiet`). Untracked files do not count.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

/// Branch sentinel reported when HEAD does not point at a branch. This is
/// what `git rev-parse --abbrev-ref HEAD` prints in detached state.
pub const DETACHED_HEAD: &str = "HEAD";

/// Version-control state of a working copy at a point in time.
///
/// Always embedded in a build record or publish ledger, never persisted on
/// its own. When `is_git_repo` is false every other field is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    /// Whether the inspected directory is inside a git work tree.
    pub is_git_repo: bool,

    /// Full commit id of `HEAD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    /// Symbolic branch name, or [`DETACHED_HEAD`] when detached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Whether the working tree has tracked or staged modifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirty: Option<bool>,

    /// Symbolic name of the configured upstream branch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,

    /// Commits the local branch is ahead of upstream. 0 without an upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ahead: Option<u32>,

    /// Commits the local branch is behind upstream. 0 without an upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behind: Option<u32>,
}

impl RepoState {
    /// State for a directory that is not under version control.
    #[must_use]
    pub fn not_a_repo() -> Self {
        Self {
            is_git_repo: false,
            commit: None,
            branch: None,
            dirty: None,
            upstream: None,
            ahead: None,
            behind: None,
        }
    }

    /// Whether the tree had uncommitted modifications. False outside a repo.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.unwrap_or(false)
    }

    /// Commits behind upstream, 0 outside a repo or without an upstream.
    #[must_use]
    pub fn behind_count(&self) -> u32 {
        self.behind.unwrap_or(0)
    }

    /// Commits ahead of upstream, 0 outside a repo or without an upstream.
    #[must_use]
    pub fn ahead_count(&self) -> u32 {
        self.ahead.unwrap_or(0)
    }

    /// Full id of `HEAD`, if inside a repository.
    #[must_use]
    pub fn head_commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }
}

/// Inspect the repository enclosing `start_path`.
///
/// `git` itself performs the upward discovery of the repository root, so
/// `start_path` may be any directory inside the work tree. Never fails:
/// a missing repository, a missing `git` binary, or a malformed repository
/// all report `is_git_repo: false`.
#[must_use]
pub fn read_state(start_path: &Path) -> RepoState {
    let Some(commit) = run_git(start_path, &["rev-parse", "HEAD"]) else {
        tracing::debug!(path = %start_path.display(), "not inside a git work tree");
        return RepoState::not_a_repo();
    };

    // Exit status 0 means no differences; any other outcome (differences,
    // or git failing outright) counts as dirty.
    let dirty = !git_succeeds(start_path, &["diff", "--quiet"])
        || !git_succeeds(start_path, &["diff", "--cached", "--quiet"]);

    let branch = run_git(start_path, &["rev-parse", "--abbrev-ref", "HEAD"])
        .unwrap_or_else(|| DETACHED_HEAD.to_string());

    let upstream = run_git(
        start_path,
        &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
    );

    let (ahead, behind) = match upstream.as_deref() {
        Some(upstream) => ahead_behind(start_path, upstream).unwrap_or((0, 0)),
        None => (0, 0),
    };

    RepoState {
        is_git_repo: true,
        commit: Some(commit),
        branch: Some(branch),
        dirty: Some(dirty),
        upstream,
        ahead: Some(ahead),
        behind: Some(behind),
    }
}

/// Run a git subcommand under `start_path`, returning trimmed stdout on
/// success and `None` on any failure (spawn error or nonzero exit).
fn run_git(start_path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(start_path)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git subcommand for its exit status alone.
fn git_succeeds(start_path: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(start_path)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Count commits only in HEAD (ahead) and only in upstream (behind).
fn ahead_behind(start_path: &Path, upstream: &str) -> Option<(u32, u32)> {
    let counts = run_git(
        start_path,
        &[
            "rev-list",
            "--left-right",
            "--count",
            &format!("HEAD...{upstream}"),
        ],
    )?;
    let (left, right) = counts.split_once('\t')?;
    Some((left.trim().parse().ok()?, right.trim().parse().ok()?))
}
