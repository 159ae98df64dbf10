//! Tests for the publish ledger document.

use std::fs;

use tempfile::TempDir;

use super::*;
use crate::git::RepoState;

fn sample_entry(src: &str) -> LedgerEntry {
    LedgerEntry {
        published_at_utc: "2026-08-06T12:00:00Z".to_string(),
        copied: true,
        src: src.to_string(),
        dst: format!("/paper/{src}"),
        dst_sha256: "ab".repeat(32),
        analysis_name: None,
        build_record: None,
    }
}

fn sample_ledger() -> PublishLedger {
    PublishLedger::new(
        "2026-08-06T12:00:00Z".to_string(),
        RepoState::not_a_repo(),
    )
}

#[test]
fn fresh_ledger_has_current_schema_version() {
    let ledger = sample_ledger();
    assert_eq!(ledger.paper_provenance_version, PAPER_PROVENANCE_VERSION);
    assert!(ledger.artifacts.is_empty());
    assert!(ledger.files.is_empty());
}

#[test]
fn save_then_load_round_trips() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("provenance.yml");

    let mut ledger = sample_ledger();
    ledger.upsert_artifact("demo", "figures", sample_entry("demo.pdf"));
    ledger.save(&path).expect("save");

    let loaded = PublishLedger::load(&path).expect("load").expect("present");
    assert_eq!(ledger, loaded);
}

#[test]
fn absent_ledger_loads_as_none() {
    let dir = TempDir::new().expect("temp dir");
    let loaded = PublishLedger::load(&dir.path().join("provenance.yml")).expect("load");
    assert!(loaded.is_none());
}

#[test]
fn corrupt_ledger_fails_loudly() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("provenance.yml");
    fs::write(&path, b"paper_provenance_version: [not: closed").expect("write");

    let err = PublishLedger::load(&path).unwrap_err();
    assert!(matches!(err, LedgerError::Corrupt { .. }));

    // load_or_new must not paper over corruption either.
    let err = PublishLedger::load_or_new(
        &path,
        "2026-08-06T12:00:00Z".to_string(),
        RepoState::not_a_repo(),
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::Corrupt { .. }));
}

#[test]
fn artifact_entries_accumulate_per_kind() {
    let mut ledger = sample_ledger();
    ledger.upsert_artifact("demo", "figures", sample_entry("demo.pdf"));
    ledger.upsert_artifact("demo", "tables", sample_entry("demo.tex"));
    ledger.upsert_artifact("other", "figures", sample_entry("other.pdf"));

    assert_eq!(ledger.artifacts.len(), 2);
    assert_eq!(ledger.artifacts["demo"].len(), 2);
}

#[test]
fn republishing_overwrites_only_named_entries() {
    let mut ledger = sample_ledger();
    ledger.upsert_artifact("a", "figures", sample_entry("a.pdf"));
    ledger.upsert_artifact("b", "figures", sample_entry("b.pdf"));

    let mut refreshed = sample_entry("a.pdf");
    refreshed.copied = false;
    ledger.upsert_artifact("a", "figures", refreshed);

    // `b` is untouched: entries are never deleted by a later publish.
    assert!(!ledger.artifacts["a"]["figures"].copied);
    assert!(ledger.artifacts["b"]["figures"].copied);
}

#[test]
fn switching_to_file_mode_clears_artifacts() {
    let mut ledger = sample_ledger();
    ledger.upsert_artifact("demo", "figures", sample_entry("demo.pdf"));
    ledger.upsert_artifact("demo", "tables", sample_entry("demo.tex"));

    ledger.upsert_file("figures/demo.pdf", sample_entry("demo.pdf"));

    assert!(ledger.artifacts.is_empty());
    assert_eq!(ledger.files.len(), 1);
}

#[test]
fn switching_to_artifact_mode_clears_files() {
    let mut ledger = sample_ledger();
    ledger.upsert_file("figures/demo.pdf", sample_entry("demo.pdf"));

    ledger.upsert_artifact("demo", "figures", sample_entry("demo.pdf"));

    assert!(ledger.files.is_empty());
    assert_eq!(ledger.artifacts.len(), 1);
}

#[test]
fn touch_refreshes_timestamp_and_state() {
    let mut ledger = sample_ledger();
    let state = RepoState {
        is_git_repo: true,
        commit: Some("c".repeat(40)),
        branch: Some("main".to_string()),
        dirty: Some(false),
        upstream: None,
        ahead: Some(0),
        behind: Some(0),
    };
    ledger.touch("2026-08-07T08:00:00Z".to_string(), state.clone());

    assert_eq!(ledger.last_updated_utc, "2026-08-07T08:00:00Z");
    assert_eq!(ledger.analysis_git, state);
}

#[test]
fn empty_sections_are_omitted_from_yaml() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("provenance.yml");

    let mut ledger = sample_ledger();
    ledger.upsert_file("figures/demo.pdf", sample_entry("demo.pdf"));
    ledger.save(&path).expect("save");

    let yaml = fs::read_to_string(&path).expect("read");
    assert!(yaml.contains("files:"));
    assert!(!yaml.contains("artifacts:"));
}
