//! `repro publish` / `repro publish-files` — promote built artifacts into
//! the paper repository.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use repro_core::config::{ArtifactKind, PolicyOverrides};
use repro_core::publish::{ItemStatus, PublishError, PublishSelection, publish};

use super::{Context, split_names};

pub fn run(
    ctx: &Context,
    paper_root: &Path,
    kind: &str,
    names: &str,
    call: PolicyOverrides,
) -> Result<()> {
    let kind: ArtifactKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let names = split_names(names);
    if names.is_empty() {
        bail!("no artifact names provided");
    }
    run_selection(
        ctx,
        paper_root,
        &PublishSelection::Artifacts { names, kind },
        call,
    )
}

pub fn run_files(
    ctx: &Context,
    paper_root: &Path,
    files: &str,
    call: PolicyOverrides,
) -> Result<()> {
    let paths: Vec<PathBuf> = split_names(files).into_iter().map(PathBuf::from).collect();
    if paths.is_empty() {
        bail!("no files provided");
    }
    run_selection(ctx, paper_root, &PublishSelection::Files { paths }, call)
}

fn run_selection(
    ctx: &Context,
    paper_root: &Path,
    selection: &PublishSelection,
    call: PolicyOverrides,
) -> Result<()> {
    let options = ctx.policy(call);

    match publish(&ctx.layout, paper_root, selection, &options) {
        Ok(report) => {
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for item in &report.items {
                    let status = match item.status {
                        ItemStatus::Copied => "Published",
                        ItemStatus::Unchanged => "Up-to-date",
                    };
                    println!("  {:40}  {status}", item.name);
                }
                println!(
                    "{} of {} item(s) copied",
                    report.copied_count(),
                    report.items.len()
                );
            }
            Ok(())
        }
        Err(PublishError::Blocked { violations }) => {
            for violation in &violations {
                eprintln!("error: {violation}");
            }
            bail!("refusing to publish: {} gate(s) failed", violations.len());
        }
        Err(other) => Err(other.into()),
    }
}
