use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::metadata::WatermarkFormat;

pub const DEFAULT_BRANCH_PREFIX: &str = "docsync";
pub const DEFAULT_LABEL: &str = "content-update";

/// Everything the sync engine needs to know, passed in explicitly.
///
/// Secrets are not part of this value: they belong to the concrete clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Identifier of the remote root whose child folders are the units.
    pub root_id: String,
    /// Directory the generated documents are written to.
    pub docs_dir: PathBuf,
    /// Directory staged images are written to, one subdirectory per unit.
    pub assets_dir: PathBuf,
    /// Prefix of image paths as seen from the rendered site.
    pub assets_url_prefix: String,
    #[serde(default)]
    pub watermark_format: WatermarkFormat,
    /// Emit a deterministic fallback document when the transformer fails.
    #[serde(default = "default_true")]
    pub fallback_on_transform_error: bool,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    /// Target of the merge proposal. Defaults to the branch the run started on.
    #[serde(default)]
    pub target_branch: Option<String>,
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_branch_prefix() -> String {
    DEFAULT_BRANCH_PREFIX.to_string()
}

fn default_labels() -> Vec<String> {
    vec![DEFAULT_LABEL.to_string()]
}

impl SyncConfig {
    pub fn new(
        root_id: impl Into<String>,
        docs_dir: impl Into<PathBuf>,
        assets_dir: impl Into<PathBuf>,
        assets_url_prefix: impl Into<String>,
    ) -> Self {
        SyncConfig {
            root_id: root_id.into(),
            docs_dir: docs_dir.into(),
            assets_dir: assets_dir.into(),
            assets_url_prefix: assets_url_prefix.into(),
            watermark_format: WatermarkFormat::default(),
            fallback_on_transform_error: true,
            branch_prefix: default_branch_prefix(),
            target_branch: None,
            labels: default_labels(),
        }
    }

    /// Pre-flight check: every required value must be present before any unit is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.root_id.trim().is_empty() {
            missing.push("root_id".to_string());
        }
        if self.docs_dir.as_os_str().is_empty() {
            missing.push("docs_dir".to_string());
        }
        if self.assets_dir.as_os_str().is_empty() {
            missing.push("assets_dir".to_string());
        }
        if self.branch_prefix.trim().is_empty() {
            missing.push("branch_prefix".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if let Some(target) = &self.target_branch {
            if target.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "target_branch".into(),
                    reason: "must not be empty when set".into(),
                });
            }
        }
        Ok(())
    }

    /// Paths whose uncommitted changes mean a previous run did not finish publishing.
    pub fn generated_paths(&self) -> Vec<PathBuf> {
        vec![self.docs_dir.clone(), self.assets_dir.clone()]
    }

    pub fn trace_loaded(&self) {
        info!(
            root_id = %self.root_id,
            docs_dir = %self.docs_dir.display(),
            assets_dir = %self.assets_dir.display(),
            format = ?self.watermark_format,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_collects_every_missing_value() {
        let config = SyncConfig::new("", "", "static/img", "/img");
        match config.validate() {
            Err(ConfigError::Missing(keys)) => {
                assert_eq!(keys, vec!["root_id".to_string(), "docs_dir".to_string()])
            }
            other => panic!("expected missing keys, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_blank_target_branch() {
        let mut config = SyncConfig::new("root", "docs", "static/img", "/img");
        config.target_branch = Some("  ".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn defaults_are_applied() {
        let config = SyncConfig::new("root", "docs", "static/img", "/img");
        assert!(config.validate().is_ok());
        assert!(config.fallback_on_transform_error);
        assert_eq!(config.branch_prefix, "docsync");
        assert_eq!(config.labels, vec!["content-update".to_string()]);
    }
}
