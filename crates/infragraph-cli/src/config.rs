//! `infragraph.toml` configuration.
//!
//! ```toml
//! outdir = "{assembly}/infragraph"
//! presets = ["compact"]
//! root = "App"
//! hoist-root = false
//! ignored-paths = ["Dev/Monitoring"]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use infragraph_error::{Error, Result};
use infragraph_filter::FilterPreset;
use serde::Deserialize;
use tracing::debug;

use crate::options::GraphOptions;

pub const CONFIG_FILE_NAME: &str = "infragraph.toml";

/// Replaced by the directory of the construct tree file.
pub const ASSEMBLY_PLACEHOLDER: &str = "{assembly}";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GraphConfig {
    pub outdir: String,
    pub presets: Vec<FilterPreset>,
    pub root: Option<String>,
    pub hoist_root: bool,
    pub ignored_paths: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            outdir: format!("{ASSEMBLY_PLACEHOLDER}/infragraph"),
            presets: Vec::new(),
            root: None,
            hoist_root: false,
            ignored_paths: Vec::new(),
        }
    }
}

impl GraphConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::from(e).with_context("path", path.display().to_string()))?;
        toml::from_str(&text).map_err(|e| {
            Error::config_invalid(format!("invalid TOML in {}", path.display()))
                .with_context("path", path.display().to_string())
                .set_source(e)
        })
    }

    /// Nearest `infragraph.toml` in `start` or one of its ancestors.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Explicit file, else the discovered one, else the defaults.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        match explicit.map(Path::to_path_buf).or_else(|| Self::discover(cwd)) {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::from_path(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Command-line values take precedence over the file.
    pub fn merge_options(mut self, opts: &GraphOptions) -> Self {
        if let Some(outdir) = &opts.outdir {
            self.outdir = outdir.display().to_string();
        }
        if !opts.presets.is_empty() {
            self.presets = opts.presets.clone();
        }
        if opts.root.is_some() {
            self.root = opts.root.clone();
            self.hoist_root = opts.hoist_root;
        }
        self.ignored_paths.extend(opts.ignored_paths.iter().cloned());
        let mut seen = HashSet::new();
        self.presets.retain(|preset| seen.insert(*preset));
        self
    }

    pub fn resolve_outdir(&self, assembly: &Path) -> PathBuf {
        PathBuf::from(
            self.outdir
                .replace(ASSEMBLY_PLACEHOLDER, &assembly.display().to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_when_file_is_empty() {
        let config: GraphConfig = toml::from_str("").unwrap();
        assert_eq!(config, GraphConfig::default());
        assert_eq!(
            config.resolve_outdir(Path::new("cdk.out")),
            PathBuf::from("cdk.out/infragraph")
        );
    }

    #[test]
    fn test_parse_full_config() {
        let config: GraphConfig = toml::from_str(
            r#"
            outdir = "graphs"
            presets = ["compact", "non-extraneous"]
            root = "App"
            hoist-root = true
            ignored-paths = ["Dev/Monitoring"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.presets,
            vec![FilterPreset::Compact, FilterPreset::NonExtraneous]
        );
        assert_eq!(config.root.as_deref(), Some("App"));
        assert!(config.hoist_root);
        assert_eq!(config.resolve_outdir(Path::new("cdk.out")), PathBuf::from("graphs"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<GraphConfig>("colour = true").is_err());
        assert!(toml::from_str::<GraphConfig>("presets = [\"verbose\"]").is_err());
    }

    #[test]
    fn test_options_override_file() {
        let config = GraphConfig {
            presets: vec![FilterPreset::Compact],
            root: Some("A".to_string()),
            ..Default::default()
        };
        let opts = GraphOptions::new("tree.json")
            .with_outdir("out")
            .with_preset(FilterPreset::None)
            .with_root("B", true);

        let merged = config.merge_options(&opts);
        assert_eq!(merged.outdir, "out");
        assert_eq!(merged.presets, vec![FilterPreset::None]);
        assert_eq!(merged.root.as_deref(), Some("B"));
        assert!(merged.hoist_root);
    }
}
