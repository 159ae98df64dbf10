//! `repro check` — evaluate git publication gates without publishing.

use anyhow::{Result, bail};
use repro_core::config::PolicyOverrides;
use repro_core::safety::{self, Violation};
use serde::Serialize;

use super::{Context, split_names};

#[derive(Serialize)]
struct CheckReport<'a> {
    passed: bool,
    violations: &'a [Violation],
}

pub fn run(ctx: &Context, names: Option<&str>, call: PolicyOverrides) -> Result<()> {
    let options = ctx.policy(call);
    let names = names.map(split_names).unwrap_or_default();

    let outcome = safety::check_candidates(&ctx.layout, &names, &options)?;

    if ctx.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&CheckReport {
                passed: outcome.passed(),
                violations: &outcome.violations,
            })?
        );
    } else {
        for violation in &outcome.violations {
            eprintln!("error: {violation}");
        }
        if outcome.passed() {
            println!("all publication gates passed");
        }
    }

    if !outcome.passed() {
        bail!(
            "refusing to publish: {} gate(s) failed",
            outcome.violations.len()
        );
    }
    Ok(())
}
