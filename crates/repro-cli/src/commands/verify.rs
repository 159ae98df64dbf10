//! `repro verify` — recompute recorded output checksums and report drift.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result, bail};
use repro_core::record;
use repro_core::safety::{self, OutputDrift};

use super::{Context, split_names};

pub fn run(ctx: &Context, names: Option<&str>) -> Result<()> {
    let names = match names {
        Some(raw) => split_names(raw),
        None => all_recorded_artifacts(ctx)?,
    };
    if names.is_empty() {
        bail!(
            "no build records under {}; build something first",
            ctx.layout.records_dir.display()
        );
    }

    let mut drift_by_artifact: BTreeMap<String, Vec<OutputDrift>> = BTreeMap::new();
    for name in &names {
        let record = record::load_build_record(&ctx.layout.record_path(name))?;
        let drift = safety::verify_outputs(&record)
            .with_context(|| format!("verifying outputs of '{name}'"))?;
        if !drift.is_empty() {
            drift_by_artifact.insert(name.clone(), drift);
        }
    }

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&drift_by_artifact)?);
    } else if drift_by_artifact.is_empty() {
        println!("all {} artifact(s) match their recorded checksums", names.len());
    } else {
        for (name, drift) in &drift_by_artifact {
            for entry in drift {
                let status = if entry.actual_sha256.is_some() {
                    "modified after build"
                } else {
                    "missing"
                };
                eprintln!("  {name}: {} {status}", entry.path);
            }
        }
    }

    if !drift_by_artifact.is_empty() {
        bail!(
            "{} artifact(s) have outputs that no longer match their build records",
            drift_by_artifact.len()
        );
    }
    Ok(())
}

/// Every artifact with a record in the records directory, sorted.
fn all_recorded_artifacts(ctx: &Context) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let dir = match std::fs::read_dir(&ctx.layout.records_dir) {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("listing records in {}", ctx.layout.records_dir.display())
            });
        }
    };
    for entry in dir {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "yml") {
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    names.sort();
    Ok(names)
}
