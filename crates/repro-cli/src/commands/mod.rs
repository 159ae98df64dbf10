//! Subcommand implementations.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use repro_core::config::{PolicyOverrides, ProjectConfig, ProjectLayout, resolve_policy};
use repro_core::safety::SafetyOptions;

pub mod check;
pub mod publish;
pub mod record;
pub mod verify;

/// Resolved invocation context shared by every subcommand.
pub struct Context {
    /// Build-area layout rooted at the analysis repository.
    pub layout: ProjectLayout,
    /// Project configuration, default when no file exists.
    pub config: ProjectConfig,
    /// Emit JSON instead of text reports.
    pub json: bool,
}

impl Context {
    /// Resolve the repository root, load the project configuration if one
    /// exists, and derive the build-area layout.
    pub fn resolve(repo_root: Option<PathBuf>, config: PathBuf, json: bool) -> Result<Self> {
        let repo_root = match repo_root {
            Some(root) => root,
            None => std::env::current_dir().context("failed to resolve current directory")?,
        };
        let config_path = if config.is_absolute() {
            config
        } else {
            repo_root.join(config)
        };
        let config = if config_path.is_file() {
            ProjectConfig::from_file(&config_path)
                .with_context(|| format!("loading {}", config_path.display()))?
        } else {
            ProjectConfig::default()
        };
        let layout = ProjectLayout::rooted_at(repo_root);
        tracing::debug!(
            repo_root = %layout.repo_root.display(),
            artifacts = config.artifacts.len(),
            "resolved project context"
        );
        Ok(Self {
            layout,
            config,
            json,
        })
    }

    /// Merge the policy layers: built-in defaults, then the project
    /// configuration, then call-time flags.
    pub fn policy(&self, call: PolicyOverrides) -> SafetyOptions {
        resolve_policy(&[&self.config.policy, &call])
    }
}

/// Split a space-separated name list, as the original Make-driven
/// interface passes it.
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_names_drops_blank_segments() {
        assert_eq!(split_names("a  b \n c"), vec!["a", "b", "c"]);
        assert!(split_names("   ").is_empty());
    }
}
