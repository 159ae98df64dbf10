//! Provenance and publishing core for reproducible-research pipelines.
//!
//! This crate tracks what produced every analysis artifact and gates
//! promotion of those artifacts into a publication area behind git
//! cleanliness checks:
//!
//! - **[`hash`]** — content digests for file fingerprints.
//! - **[`git`]** — working-copy state (commit, branch, dirty, ahead/behind).
//! - **[`record`]** — per-artifact build records: what command ran, from
//!   which tree, over which inputs, producing which outputs.
//! - **[`safety`]** — publication preconditions evaluated over build records
//!   and the live repository state.
//! - **[`ledger`]** — the aggregated provenance document kept at each
//!   publish destination.
//! - **[`publish`]** — the check → copy → ledger-update pass that promotes
//!   artifacts into the publication area.
//! - **[`config`]** — typed project layout and policy configuration.
//!
//! The core is single-threaded and synchronous: every operation runs to
//! completion in the calling process. Concurrent publishes against the same
//! destination are not coordinated here; callers are expected to serialize
//! them.

pub mod config;
pub mod git;
pub mod hash;
pub mod ledger;
mod persist;
pub mod publish;
pub mod record;
pub mod safety;

pub use config::{ArtifactKind, PolicyOverrides, ProjectConfig, ProjectLayout, resolve_policy};
pub use git::RepoState;
pub use ledger::{LedgerEntry, PublishLedger};
pub use publish::{PublishReport, PublishSelection, publish};
pub use record::{BuildRecord, FileFingerprint, PendingBuild};
pub use safety::{CheckOutcome, SafetyOptions, Violation};
