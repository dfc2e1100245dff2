/// `load_config`: reads the static YAML file, injects secrets from the environment
/// and produces everything the CLI needs to build its collaborators.
///
/// The YAML file never holds secrets. Tokens come from:
///
/// | Variable               | Used by                      |
/// |------------------------|------------------------------|
/// | `DOCSYNC_SOURCE_TOKEN` | content source (bearer auth) |
/// | `DOCSYNC_LLM_API_KEY`  | transformer                  |
/// | `DOCSYNC_FORGE_TOKEN`  | merge-proposal API           |
///
/// # Errors
/// Every missing required value, whether a YAML key or an environment secret,
/// is gathered into a single [`ConfigError::Missing`] so one run reports them all.
/// Read and parse failures surface as `anyhow::Error` with the file path attached.
///
/// Relative `output.docs_dir` and `output.assets_dir` are resolved against
/// `git.repo_dir`, since generated files must live inside the working tree.
use anyhow::{Context, Result};
use docsync_core::config::SyncConfig;
use docsync_core::error::ConfigError;
use docsync_core::forge::ForgeKind;
use docsync_core::git::DEFAULT_REMOTE;
use docsync_core::metadata::WatermarkFormat;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const ENV_SOURCE_TOKEN: &str = "DOCSYNC_SOURCE_TOKEN";
pub const ENV_LLM_API_KEY: &str = "DOCSYNC_LLM_API_KEY";
pub const ENV_FORGE_TOKEN: &str = "DOCSYNC_FORGE_TOKEN";

pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ASSETS_URL_PREFIX: &str = "/img";

#[derive(Debug, Default, Deserialize)]
struct SourceSection {
    root_folder_id: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSection {
    docs_dir: Option<PathBuf>,
    assets_dir: Option<PathBuf>,
    assets_url_prefix: Option<String>,
    #[serde(default)]
    watermark_format: WatermarkFormat,
}

#[derive(Debug, Default, Deserialize)]
struct TransformSection {
    api_url: Option<String>,
    model: Option<String>,
    fallback_on_error: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct GitSection {
    repo_dir: Option<PathBuf>,
    remote: Option<String>,
    branch_prefix: Option<String>,
    target_branch: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ForgeSection {
    kind: Option<ForgeKind>,
    api_url: Option<String>,
    project: Option<String>,
    labels: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    source: SourceSection,
    #[serde(default)]
    output: OutputSection,
    #[serde(default)]
    transform: TransformSection,
    #[serde(default)]
    git: GitSection,
    #[serde(default)]
    forge: ForgeSection,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub api_url: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct TransformSettings {
    pub api_url: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct GitSettings {
    pub repo_dir: PathBuf,
    pub remote: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ForgeSettings {
    pub kind: ForgeKind,
    pub api_url: Option<String>,
    pub project: String,
    pub token: String,
}

/// Fully resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub sync: SyncConfig,
    pub source: SourceSettings,
    pub transform: TransformSettings,
    pub git: GitSettings,
    pub forge: ForgeSettings,
}

fn required<T>(value: Option<T>, key: &str, missing: &mut Vec<String>) -> Option<T> {
    if value.is_none() {
        missing.push(key.to_string());
    }
    value
}

fn required_str(value: Option<String>, key: &str, missing: &mut Vec<String>) -> String {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => {
            missing.push(key.to_string());
            String::new()
        }
    }
}

fn secret(name: &str, missing: &mut Vec<String>) -> String {
    required_str(env::var(name).ok(), name, missing)
}

fn resolve(base: &Path, dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        dir
    } else {
        base.join(dir)
    }
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        e
    })
    .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    let raw: RawConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        e
    })
    .with_context(|| format!("Failed to parse config YAML {path_ref:?}"))?;

    let config = from_raw(raw)?;
    config.sync.trace_loaded();
    info!(
        forge = ?config.forge.kind,
        project = %config.forge.project,
        repo_dir = %config.git.repo_dir.display(),
        "Configuration loaded"
    );
    Ok(config)
}

fn from_raw(raw: RawConfig) -> Result<CliConfig> {
    let mut missing = Vec::new();

    let root_id = required_str(raw.source.root_folder_id, "source.root_folder_id", &mut missing);
    let docs_dir = required(raw.output.docs_dir, "output.docs_dir", &mut missing);
    let assets_dir = required(raw.output.assets_dir, "output.assets_dir", &mut missing);
    let model = required_str(raw.transform.model, "transform.model", &mut missing);
    let forge_kind = required(raw.forge.kind, "forge.kind", &mut missing);
    let project = required_str(raw.forge.project, "forge.project", &mut missing);

    let source_token = secret(ENV_SOURCE_TOKEN, &mut missing);
    let llm_api_key = secret(ENV_LLM_API_KEY, &mut missing);
    let forge_token = secret(ENV_FORGE_TOKEN, &mut missing);

    let (docs_dir, assets_dir, forge_kind) = match (docs_dir, assets_dir, forge_kind) {
        (Some(d), Some(a), Some(k)) if missing.is_empty() => (d, a, k),
        _ => {
            error!(missing = ?missing, "Configuration is incomplete");
            return Err(ConfigError::Missing(missing).into());
        }
    };

    let repo_dir = raw.git.repo_dir.unwrap_or_else(|| PathBuf::from("."));
    let mut sync = SyncConfig::new(
        root_id,
        resolve(&repo_dir, docs_dir),
        resolve(&repo_dir, assets_dir),
        raw.output
            .assets_url_prefix
            .unwrap_or_else(|| DEFAULT_ASSETS_URL_PREFIX.to_string()),
    );
    sync.watermark_format = raw.output.watermark_format;
    if let Some(fallback) = raw.transform.fallback_on_error {
        sync.fallback_on_transform_error = fallback;
    }
    if let Some(prefix) = raw.git.branch_prefix {
        sync.branch_prefix = prefix;
    }
    sync.target_branch = raw.git.target_branch;
    if let Some(labels) = raw.forge.labels {
        sync.labels = labels;
    }
    sync.validate()?;

    Ok(CliConfig {
        sync,
        source: SourceSettings {
            api_url: raw.source.api_url,
            token: source_token,
        },
        transform: TransformSettings {
            api_url: raw
                .transform
                .api_url
                .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            model,
            api_key: llm_api_key,
        },
        git: GitSettings {
            repo_dir,
            remote: raw.git.remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            author_name: raw.git.author_name,
            author_email: raw.git.author_email,
        },
        forge: ForgeSettings {
            kind: forge_kind,
            api_url: raw.forge.api_url,
            project,
            token: forge_token,
        },
    })
}
