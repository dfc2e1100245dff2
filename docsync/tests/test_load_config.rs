use docsync::load_config::{load_config, ENV_FORGE_TOKEN, ENV_LLM_API_KEY, ENV_SOURCE_TOKEN};
use docsync_core::error::ConfigError;
use docsync_core::forge::ForgeKind;
use docsync_core::metadata::WatermarkFormat;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

fn set_secrets() {
    env::set_var(ENV_SOURCE_TOKEN, "drive-token");
    env::set_var(ENV_LLM_API_KEY, "llm-key");
    env::set_var(ENV_FORGE_TOKEN, "forge-token");
}

fn clear_secrets() {
    env::remove_var(ENV_SOURCE_TOKEN);
    env::remove_var(ENV_LLM_API_KEY);
    env::remove_var(ENV_FORGE_TOKEN);
}

#[test]
#[serial]
fn test_full_config_with_secrets_from_env() {
    let file = config_file(
        r#"
source:
  root_folder_id: "1AbCdEf"
output:
  docs_dir: docs/generated
  assets_dir: /srv/site/static/img
  assets_url_prefix: /img
  watermark_format: lines
transform:
  api_url: http://localhost:11434/v1
  model: llama3
  fallback_on_error: false
git:
  repo_dir: /srv/site
  remote: upstream
  branch_prefix: content
  target_branch: develop
  author_name: Docs Bot
  author_email: docs-bot@example.com
forge:
  kind: github
  project: acme/site
  labels: [docs, automated]
"#,
    );
    set_secrets();

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.sync.root_id, "1AbCdEf");
    assert_eq!(config.sync.docs_dir, PathBuf::from("/srv/site/docs/generated"));
    assert_eq!(config.sync.assets_dir, PathBuf::from("/srv/site/static/img"));
    assert_eq!(config.sync.watermark_format, WatermarkFormat::Lines);
    assert!(!config.sync.fallback_on_transform_error);
    assert_eq!(config.sync.branch_prefix, "content");
    assert_eq!(config.sync.target_branch.as_deref(), Some("develop"));
    assert_eq!(config.sync.labels, vec!["docs".to_string(), "automated".to_string()]);
    assert_eq!(config.source.token, "drive-token");
    assert_eq!(config.transform.api_url, "http://localhost:11434/v1");
    assert_eq!(config.transform.api_key, "llm-key");
    assert_eq!(config.git.remote, "upstream");
    assert_eq!(config.git.author_name.as_deref(), Some("Docs Bot"));
    assert_eq!(config.forge.kind, ForgeKind::GitHub);
    assert_eq!(config.forge.project, "acme/site");
    assert_eq!(config.forge.token, "forge-token");

    clear_secrets();
}

#[test]
#[serial]
fn test_minimal_config_uses_defaults() {
    let file = config_file(
        r#"
source:
  root_folder_id: root
output:
  docs_dir: docs
  assets_dir: static/img
transform:
  model: gpt-4o-mini
forge:
  kind: gitlab
  project: team/site
"#,
    );
    set_secrets();

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.sync.docs_dir, PathBuf::from("./docs"));
    assert_eq!(config.sync.assets_url_prefix, "/img");
    assert_eq!(config.sync.watermark_format, WatermarkFormat::Json);
    assert!(config.sync.fallback_on_transform_error);
    assert_eq!(config.sync.branch_prefix, "docsync");
    assert_eq!(config.sync.target_branch, None);
    assert_eq!(config.sync.labels, vec!["content-update".to_string()]);
    assert_eq!(config.transform.api_url, "https://api.openai.com/v1");
    assert_eq!(config.git.repo_dir, PathBuf::from("."));
    assert_eq!(config.git.remote, "origin");
    assert_eq!(config.forge.kind, ForgeKind::GitLab);
    assert_eq!(config.forge.api_url, None);

    clear_secrets();
}

#[test]
#[serial]
fn test_missing_keys_and_secrets_are_reported_together() {
    let file = config_file("output:\n  docs_dir: docs\n");
    clear_secrets();
    env::set_var(ENV_LLM_API_KEY, "   ");

    let err = load_config(file.path()).expect_err("Config is incomplete");
    let missing = match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::Missing(missing)) => missing.clone(),
        other => panic!("expected ConfigError::Missing, got {other:?}"),
    };
    assert_eq!(
        missing,
        vec![
            "source.root_folder_id",
            "output.assets_dir",
            "transform.model",
            "forge.kind",
            "forge.project",
            ENV_SOURCE_TOKEN,
            ENV_LLM_API_KEY,
            ENV_FORGE_TOKEN,
        ]
    );

    clear_secrets();
}

#[test]
#[serial]
fn test_unknown_forge_kind_is_a_parse_error() {
    let file = config_file("forge:\n  kind: bitbucket\n");
    set_secrets();

    let err = load_config(file.path()).expect_err("bitbucket is not supported");
    assert!(format!("{err:#}").contains("Failed to parse config YAML"));

    clear_secrets();
}

#[test]
#[serial]
fn test_blank_target_branch_is_rejected() {
    let file = config_file(
        r#"
source: { root_folder_id: root }
output: { docs_dir: docs, assets_dir: img }
transform: { model: m }
git: { target_branch: " " }
forge: { kind: gitlab, project: "42" }
"#,
    );
    set_secrets();

    let err = load_config(file.path()).expect_err("blank target branch");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::Invalid { .. })
    ));

    clear_secrets();
}
