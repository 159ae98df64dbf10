//! `repro record` — write the build record for a configured artifact.

use anyhow::{Context as _, Result};
use repro_core::record::PendingBuild;

use super::Context;

pub fn run(ctx: &Context, name: &str) -> Result<()> {
    let artifact = ctx.config.artifact(name)?;
    let command = if artifact.command.is_empty() {
        vec!["make".to_string(), name.to_string()]
    } else {
        artifact.command.clone()
    };

    let destination = ctx.layout.record_path(name);
    let record = PendingBuild::new(name, command)
        .inputs(artifact.inputs.iter().map(|p| ctx.layout.repo_root.join(p)))
        .outputs(artifact.outputs.iter().map(|p| ctx.layout.repo_root.join(p)))
        .finalize(&ctx.layout.repo_root, &destination)
        .with_context(|| format!("recording provenance for '{name}'"))?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "recorded provenance for '{name}' ({} inputs, {} outputs) at {}",
            record.inputs.len(),
            record.outputs.len(),
            destination.display()
        );
    }
    Ok(())
}
