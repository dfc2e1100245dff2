#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};
use docsync_core::config::SyncConfig;
use docsync_core::contract::{ItemKind, MockContentSource, SourceItem, SourceUnit};
use docsync_core::git::{GitCli, DEFAULT_REMOTE};
use tempfile::{tempdir, TempDir};

pub const ROOT: &str = "root";

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid RFC3339 timestamp")
        .with_timezone(&Utc)
}

pub fn unit(id: &str, name: &str) -> SourceUnit {
    SourceUnit {
        id: id.to_string(),
        name: name.to_string(),
        modified_at: None,
    }
}

pub fn item(id: &str, name: &str, kind: ItemKind, modified: &str) -> SourceItem {
    SourceItem {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        modified_at: ts(modified),
        mime_type: match kind {
            ItemKind::Image => Some("image/png".to_string()),
            _ => None,
        },
    }
}

pub fn config_in(dir: &Path) -> SyncConfig {
    SyncConfig::new(ROOT, dir.join("docs"), dir.join("static/img"), "/img")
}

/// A content source serving a fixed tree. Ids listed in `failing` error on export.
pub fn fixture_source(
    units: Vec<SourceUnit>,
    items: HashMap<String, Vec<SourceItem>>,
    failing: Vec<String>,
) -> MockContentSource {
    let mut source = MockContentSource::new();
    source
        .expect_list_units()
        .returning(move |_| Ok(units.clone()));
    source.expect_list_items().returning(move |parent| {
        Ok(items.get(parent).cloned().unwrap_or_default())
    });
    let failing_docs = failing.clone();
    source.expect_export_document_text().returning(move |id| {
        if failing_docs.iter().any(|f| f == id) {
            Err(format!("export of {id} failed").into())
        } else {
            Ok(format!("text of {id}"))
        }
    });
    source
        .expect_export_spreadsheet_csv()
        .returning(|id| Ok(format!("col_a,col_b\n{id},1")));
    source
        .expect_download_bytes()
        .returning(|_| Ok(vec![0x89, 0x50, 0x4e, 0x47]));
    source
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Setup", "-c", "user.email=setup@example.com"])
        .args(args)
        .output()
        .expect("git is installed");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A working copy on `main` with one commit, tracking a bare `origin`.
pub fn git_fixture() -> (TempDir, GitCli) {
    let root = tempdir().unwrap();
    let remote = root.path().join("remote.git");
    let work = root.path().join("work");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&work).unwrap();

    git(&remote, &["init", "--bare", "-b", "main"]);
    git(&work, &["init", "-b", "main"]);
    std::fs::write(work.join("README.md"), "site\n").unwrap();
    git(&work, &["add", "README.md"]);
    git(&work, &["commit", "-m", "initial"]);
    git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&work, &["push", "-u", "origin", "main"]);

    let cli = GitCli::new(&work, DEFAULT_REMOTE).with_author(
        Some("Docs Bot".to_string()),
        Some("docs-bot@example.com".to_string()),
    );
    (root, cli)
}
