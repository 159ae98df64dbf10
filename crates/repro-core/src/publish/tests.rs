//! Tests for the publish pass.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use super::*;
use crate::git::tests::create_test_repo;
use crate::ledger::PublishLedger;
use crate::record::PendingBuild;

/// Analysis repo with the conventional output layout and one committed
/// file.
fn fixture() -> (ProjectLayout, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    create_test_repo(dir.path());
    let layout = ProjectLayout::rooted_at(dir.path());
    fs::create_dir_all(&layout.figures_dir).expect("figures dir");
    fs::create_dir_all(&layout.tables_dir).expect("tables dir");
    fs::create_dir_all(&layout.records_dir).expect("records dir");
    (layout, dir)
}

/// Build the `demo` artifact: one input, a figure and a table output, and
/// its build record.
fn build_demo(layout: &ProjectLayout) -> BuildRecord {
    let data = layout.repo_root.join("data.csv");
    fs::write(&data, b"a,b\n1,2\n").expect("write data");
    let figure = layout.figures_dir.join("demo.pdf");
    fs::write(&figure, b"%PDF demo v1").expect("write figure");
    let table = layout.tables_dir.join("demo.tex");
    fs::write(&table, b"\\begin{tabular}\\end{tabular}").expect("write table");

    PendingBuild::new("demo", vec!["make".into(), "demo".into()])
        .input(&data)
        .output(&figure)
        .output(&table)
        .finalize(&layout.repo_root, &layout.record_path("demo"))
        .expect("finalize")
}

fn demo_selection() -> PublishSelection {
    PublishSelection::Artifacts {
        names: vec!["demo".to_string()],
        kind: ArtifactKind::Figures,
    }
}

#[test]
fn publish_copies_then_reports_unchanged() {
    let (layout, dir) = fixture();
    build_demo(&layout);
    let paper_root = dir.path().join("paper");

    let first = publish(
        &layout,
        &paper_root,
        &demo_selection(),
        &SafetyOptions::default(),
    )
    .expect("first publish");
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].status, ItemStatus::Copied);
    assert_eq!(first.copied_count(), 1);
    assert!(paper_root.join("figures/demo.pdf").is_file());

    let second = publish(
        &layout,
        &paper_root,
        &demo_selection(),
        &SafetyOptions::default(),
    )
    .expect("second publish");
    assert_eq!(second.items[0].status, ItemStatus::Unchanged);
    assert_eq!(second.copied_count(), 0);

    // The entry is refreshed even when nothing was copied.
    let ledger = PublishLedger::load(&paper_root.join(LEDGER_FILE_NAME))
        .expect("load")
        .expect("present");
    let entry = &ledger.artifacts["demo"]["figures"];
    assert!(!entry.copied);
    assert!(entry.build_record.is_some());
    assert_eq!(
        entry.dst_sha256,
        crate::hash::sha256_file(&paper_root.join("figures/demo.pdf")).expect("hash")
    );
}

#[test]
fn changed_source_is_republished() {
    let (layout, dir) = fixture();
    build_demo(&layout);
    let paper_root = dir.path().join("paper");

    publish(
        &layout,
        &paper_root,
        &demo_selection(),
        &SafetyOptions::default(),
    )
    .expect("first publish");

    // Rebuild with different content.
    fs::write(layout.figures_dir.join("demo.pdf"), b"%PDF demo v2").expect("write");
    build_demo_record_only(&layout);

    let report = publish(
        &layout,
        &paper_root,
        &demo_selection(),
        &SafetyOptions::default(),
    )
    .expect("republish");
    assert_eq!(report.items[0].status, ItemStatus::Copied);
    assert_eq!(
        fs::read(paper_root.join("figures/demo.pdf")).expect("read"),
        b"%PDF demo v2"
    );
}

/// Re-record the demo build over the current output bytes.
fn build_demo_record_only(layout: &ProjectLayout) {
    PendingBuild::new("demo", vec!["make".into(), "demo".into()])
        .input(layout.repo_root.join("data.csv"))
        .output(layout.figures_dir.join("demo.pdf"))
        .output(layout.tables_dir.join("demo.tex"))
        .finalize(&layout.repo_root, &layout.record_path("demo"))
        .expect("finalize");
}

#[test]
fn blocked_publish_touches_nothing() {
    let (layout, dir) = fixture();
    build_demo(&layout);
    fs::write(layout.repo_root.join("README.md"), b"edited").expect("dirty the tree");
    let paper_root = dir.path().join("paper");

    let err = publish(
        &layout,
        &paper_root,
        &demo_selection(),
        &SafetyOptions::default(),
    )
    .unwrap_err();
    match err {
        PublishError::Blocked { violations } => {
            assert_eq!(violations, vec![Violation::DirtyWorkingTree]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!paper_root.join("figures/demo.pdf").exists());
    assert!(!paper_root.join(LEDGER_FILE_NAME).exists());
}

#[test]
fn unbuilt_candidate_fails_before_copying() {
    let (layout, dir) = fixture();
    let paper_root = dir.path().join("paper");

    let err = publish(
        &layout,
        &paper_root,
        &PublishSelection::Artifacts {
            names: vec!["ghost".to_string()],
            kind: ArtifactKind::Figures,
        },
        &SafetyOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PublishError::Safety(SafetyError::MissingRecord { .. })
    ));
    assert!(!paper_root.exists());
}

#[test]
fn missing_source_artifact_is_reported() {
    let (layout, dir) = fixture();
    build_demo(&layout);
    fs::remove_file(layout.figures_dir.join("demo.pdf")).expect("remove");
    let paper_root = dir.path().join("paper");

    let err = publish(
        &layout,
        &paper_root,
        &demo_selection(),
        &SafetyOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PublishError::MissingSource { .. }));
    assert!(!paper_root.join(LEDGER_FILE_NAME).exists());
}

#[test]
fn file_mode_publishes_with_inferred_analysis() {
    let (layout, dir) = fixture();
    build_demo(&layout);
    let paper_root = dir.path().join("paper");

    let report = publish(
        &layout,
        &paper_root,
        &PublishSelection::Files {
            paths: vec![PathBuf::from("output/figures/demo.pdf")],
        },
        &SafetyOptions::default(),
    )
    .expect("publish files");
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].name, "figures/demo.pdf");
    assert!(paper_root.join("figures/demo.pdf").is_file());

    let ledger = PublishLedger::load(&paper_root.join(LEDGER_FILE_NAME))
        .expect("load")
        .expect("present");
    assert!(ledger.artifacts.is_empty());
    let entry = &ledger.files["figures/demo.pdf"];
    assert_eq!(entry.analysis_name.as_deref(), Some("demo"));
    assert!(entry.build_record.is_some());
}

#[test]
fn file_mode_gates_on_inferred_record() {
    let (layout, dir) = fixture();
    // Build from a dirty tree, then restore it: the inferred record is
    // tainted even though the current tree is clean.
    fs::write(layout.repo_root.join("README.md"), b"edited").expect("write");
    build_demo(&layout);
    crate::git::tests::git(&layout.repo_root, &["checkout", "--", "README.md"]);
    let paper_root = dir.path().join("paper");

    let err = publish(
        &layout,
        &paper_root,
        &PublishSelection::Files {
            paths: vec![PathBuf::from("output/figures/demo.pdf")],
        },
        &SafetyOptions::default(),
    )
    .unwrap_err();
    match err {
        PublishError::Blocked { violations } => {
            assert_eq!(
                violations,
                vec![Violation::BuildFromDirtyTree {
                    artifact: "demo".to_string()
                }]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn switching_modes_clears_the_other_section() {
    let (layout, dir) = fixture();
    build_demo(&layout);
    let paper_root = dir.path().join("paper");

    publish(
        &layout,
        &paper_root,
        &demo_selection(),
        &SafetyOptions::default(),
    )
    .expect("artifact publish");
    publish(
        &layout,
        &paper_root,
        &PublishSelection::Files {
            paths: vec![PathBuf::from("output/tables/demo.tex")],
        },
        &SafetyOptions::default(),
    )
    .expect("file publish");

    let ledger = PublishLedger::load(&paper_root.join(LEDGER_FILE_NAME))
        .expect("load")
        .expect("present");
    assert!(ledger.artifacts.is_empty());
    assert_eq!(ledger.files.len(), 1);
}

#[test]
fn file_outside_output_dir_is_rejected() {
    let (layout, dir) = fixture();
    build_demo(&layout);
    let paper_root = dir.path().join("paper");

    let err = publish(
        &layout,
        &paper_root,
        &PublishSelection::Files {
            paths: vec![PathBuf::from("data.csv")],
        },
        &SafetyOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PublishError::OutsideOutputDir { .. }));
}

#[test]
fn corrupt_destination_ledger_blocks_publishing() {
    let (layout, dir) = fixture();
    build_demo(&layout);
    let paper_root = dir.path().join("paper");
    fs::create_dir_all(&paper_root).expect("paper dir");
    fs::write(paper_root.join(LEDGER_FILE_NAME), b"{{not yaml").expect("write");

    let err = publish(
        &layout,
        &paper_root,
        &demo_selection(),
        &SafetyOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PublishError::Ledger(LedgerError::Corrupt { .. })
    ));
    // The corrupt document is preserved for inspection, not overwritten.
    assert_eq!(
        fs::read(paper_root.join(LEDGER_FILE_NAME)).expect("read"),
        b"{{not yaml"
    );
}
