//! Project configuration: build-area layout, artifact registry, and
//! publication policy.
//!
//! Replaces ad-hoc per-script configuration with explicit typed structs.
//! The policy merge is layered with documented precedence, lowest to
//! highest: built-in defaults, the project configuration file, then
//! call-time overrides. Each layer overrides only the fields it actually
//! sets.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::safety::SafetyOptions;

/// Default publish-ledger file name at a publish destination.
pub const LEDGER_FILE_NAME: &str = "provenance.yml";

/// Errors from loading or querying project configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A requested artifact is not declared in the configuration.
    #[error("unknown artifact '{name}'; known artifacts: {known}")]
    UnknownArtifact {
        /// The unknown name.
        name: String,
        /// Comma-separated declared names.
        known: String,
    },

    /// The configuration parsed but is semantically invalid.
    #[error("config validation failed: {0}")]
    Validation(String),
}

/// The kind of a published artifact file, which determines its source
/// directory, destination directory, and file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Figure outputs (`figures/<name>.pdf`).
    Figures,
    /// Table outputs (`tables/<name>.tex`).
    Tables,
}

impl ArtifactKind {
    /// Directory name used under both the build and publish areas.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Figures => "figures",
            Self::Tables => "tables",
        }
    }

    /// File extension of artifacts of this kind.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Figures => "pdf",
            Self::Tables => "tex",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "figures" => Ok(Self::Figures),
            "tables" => Ok(Self::Tables),
            other => Err(format!(
                "unknown artifact kind '{other}' (expected 'figures' or 'tables')"
            )),
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// On-disk layout of the analysis build area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Root of the analysis repository.
    pub repo_root: PathBuf,
    /// Build output root.
    pub output_dir: PathBuf,
    /// Figure outputs.
    pub figures_dir: PathBuf,
    /// Table outputs.
    pub tables_dir: PathBuf,
    /// Per-artifact build records.
    pub records_dir: PathBuf,
}

impl ProjectLayout {
    /// Conventional layout under `repo_root`:
    /// `output/{figures,tables,provenance}`.
    #[must_use]
    pub fn rooted_at(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let output_dir = repo_root.join("output");
        Self {
            figures_dir: output_dir.join("figures"),
            tables_dir: output_dir.join("tables"),
            records_dir: output_dir.join("provenance"),
            output_dir,
            repo_root,
        }
    }

    /// Build-record location for `artifact`.
    #[must_use]
    pub fn record_path(&self, artifact: &str) -> PathBuf {
        self.records_dir.join(format!("{artifact}.yml"))
    }

    /// Source path of `artifact` for the given kind.
    #[must_use]
    pub fn artifact_source(&self, artifact: &str, kind: ArtifactKind) -> PathBuf {
        self.kind_dir(kind)
            .join(format!("{artifact}.{}", kind.extension()))
    }

    /// Build-area directory holding artifacts of `kind`.
    #[must_use]
    pub fn kind_dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Figures => &self.figures_dir,
            ArtifactKind::Tables => &self.tables_dir,
        }
    }
}

/// Partial publication policy: only the fields a layer wants to change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyOverrides {
    /// Permit publishing from (or records built from) a dirty tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_dirty: Option<bool>,
    /// Refuse publishing while behind the configured upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_not_behind: Option<bool>,
    /// Require every candidate to be built from the current HEAD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_current_head: Option<bool>,
}

impl PolicyOverrides {
    /// Apply this layer on top of `base`, overriding only set fields.
    #[must_use]
    pub fn apply(&self, base: SafetyOptions) -> SafetyOptions {
        SafetyOptions {
            allow_dirty: self.allow_dirty.unwrap_or(base.allow_dirty),
            require_not_behind: self.require_not_behind.unwrap_or(base.require_not_behind),
            require_current_head: self
                .require_current_head
                .unwrap_or(base.require_current_head),
        }
    }
}

/// Merge override layers onto the built-in defaults.
///
/// Layers are applied in order, so later entries take precedence. The
/// conventional order is: project configuration file, then call-time
/// overrides.
#[must_use]
pub fn resolve_policy(layers: &[&PolicyOverrides]) -> SafetyOptions {
    layers
        .iter()
        .fold(SafetyOptions::default(), |base, layer| layer.apply(base))
}

/// One artifact declared in the project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Artifact name, unique within the project.
    pub name: String,
    /// Command line that builds the artifact, for the build record.
    #[serde(default)]
    pub command: Vec<String>,
    /// Declared input paths, relative to the repository root.
    pub inputs: Vec<PathBuf>,
    /// Declared output paths, relative to the repository root.
    pub outputs: Vec<PathBuf>,
}

/// Project configuration file (`repro.toml`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProjectConfig {
    /// Default publication policy for this project.
    #[serde(default)]
    pub policy: PolicyOverrides,

    /// Declared artifacts.
    #[serde(default, rename = "artifact", skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactConfig>,
}

impl ProjectConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] / [`ConfigError::Validation`] if it cannot be
    /// parsed or is semantically invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on syntax errors and
    /// [`ConfigError::Validation`] when an artifact is declared without a
    /// name, inputs, or outputs, or when two artifacts share a name.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;

        let mut seen = BTreeSet::new();
        for artifact in &config.artifacts {
            if artifact.name.is_empty() {
                return Err(ConfigError::Validation(
                    "artifact with empty name".to_string(),
                ));
            }
            if !seen.insert(artifact.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate artifact '{}'",
                    artifact.name
                )));
            }
            if artifact.inputs.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "artifact '{}' declares no inputs",
                    artifact.name
                )));
            }
            if artifact.outputs.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "artifact '{}' declares no outputs",
                    artifact.name
                )));
            }
        }

        Ok(config)
    }

    /// Look up a declared artifact by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownArtifact`] listing the declared names.
    pub fn artifact(&self, name: &str) -> Result<&ArtifactConfig, ConfigError> {
        self.artifacts
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| ConfigError::UnknownArtifact {
                name: name.to_string(),
                known: self
                    .artifacts
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[policy]
allow_dirty = false
require_not_behind = true

[[artifact]]
name = "demo"
command = ["make", "demo"]
inputs = ["data/demo.csv"]
outputs = ["output/figures/demo.pdf", "output/tables/demo.tex"]
"#;

    #[test]
    fn parses_sample_config() {
        let config = ProjectConfig::from_toml(SAMPLE).expect("parse");
        assert_eq!(config.policy.allow_dirty, Some(false));
        assert_eq!(config.policy.require_current_head, None);

        let demo = config.artifact("demo").expect("artifact");
        assert_eq!(demo.command, vec!["make", "demo"]);
        assert_eq!(demo.inputs.len(), 1);
        assert_eq!(demo.outputs.len(), 2);
    }

    #[test]
    fn unknown_artifact_lists_known_names() {
        let config = ProjectConfig::from_toml(SAMPLE).expect("parse");
        let err = config.artifact("nope").unwrap_err();
        match err {
            ConfigError::UnknownArtifact { name, known } => {
                assert_eq!(name, "nope");
                assert_eq!(known, "demo");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_duplicate_and_empty_artifacts() {
        let dup = r#"
[[artifact]]
name = "a"
inputs = ["x"]
outputs = ["y"]

[[artifact]]
name = "a"
inputs = ["x"]
outputs = ["y"]
"#;
        assert!(matches!(
            ProjectConfig::from_toml(dup),
            Err(ConfigError::Validation(_))
        ));

        let no_outputs = r#"
[[artifact]]
name = "a"
inputs = ["x"]
outputs = []
"#;
        assert!(matches!(
            ProjectConfig::from_toml(no_outputs),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn policy_layers_merge_with_documented_precedence() {
        let file_layer = PolicyOverrides {
            allow_dirty: Some(true),
            require_not_behind: None,
            require_current_head: Some(true),
        };
        let call_layer = PolicyOverrides {
            allow_dirty: Some(false),
            require_not_behind: None,
            require_current_head: None,
        };

        let resolved = resolve_policy(&[&file_layer, &call_layer]);
        // Call-time wins where set, file layer where not, builtin otherwise.
        assert!(!resolved.allow_dirty);
        assert!(resolved.require_not_behind);
        assert!(resolved.require_current_head);

        // No layers: built-in defaults.
        let defaults = resolve_policy(&[]);
        assert!(!defaults.allow_dirty);
        assert!(defaults.require_not_behind);
        assert!(!defaults.require_current_head);
    }

    #[test]
    fn layout_resolves_artifact_paths() {
        let layout = ProjectLayout::rooted_at("/work/study");
        assert_eq!(
            layout.record_path("demo"),
            PathBuf::from("/work/study/output/provenance/demo.yml")
        );
        assert_eq!(
            layout.artifact_source("demo", ArtifactKind::Figures),
            PathBuf::from("/work/study/output/figures/demo.pdf")
        );
        assert_eq!(
            layout.artifact_source("demo", ArtifactKind::Tables),
            PathBuf::from("/work/study/output/tables/demo.tex")
        );
    }

    #[test]
    fn artifact_kind_parses_and_displays() {
        assert_eq!("figures".parse::<ArtifactKind>(), Ok(ArtifactKind::Figures));
        assert_eq!("tables".parse::<ArtifactKind>(), Ok(ArtifactKind::Tables));
        assert!("charts".parse::<ArtifactKind>().is_err());
        assert_eq!(ArtifactKind::Figures.to_string(), "figures");
    }
}
