mod common;

use common::{git, git_fixture as fixture};
use docsync_core::contract::Repository;
use docsync_core::error::VcsError;

#[test]
fn test_reports_current_branch() {
    let (_root, cli) = fixture();
    assert_eq!(cli.current_branch().unwrap(), "main");
}

#[test]
fn test_detached_head_is_not_a_branch() {
    let (_root, cli) = fixture();
    git(cli.repo_dir(), &["checkout", "--detach"]);
    assert!(matches!(cli.current_branch(), Err(VcsError::Output { .. })));
}

#[test]
fn test_uncommitted_changes_are_scoped_to_paths() {
    let (_root, cli) = fixture();
    let docs = cli.repo_dir().join("docs");
    let assets = cli.repo_dir().join("static/img");
    let scoped = vec![docs.clone(), assets.clone()];

    assert!(!cli.has_uncommitted_changes(&scoped).unwrap());

    std::fs::write(cli.repo_dir().join("notes.txt"), "unrelated").unwrap();
    assert!(!cli.has_uncommitted_changes(&scoped).unwrap());

    std::fs::create_dir_all(assets.join("alpha")).unwrap();
    std::fs::write(assets.join("alpha/chart.png"), [0x89, 0x50]).unwrap();
    assert!(cli.has_uncommitted_changes(&scoped).unwrap());
}

#[test]
fn test_branch_commit_push_round_trip() {
    let (root, cli) = fixture();
    cli.pull("main").unwrap();
    cli.create_branch("docsync/20250101-000000").unwrap();
    assert_eq!(cli.current_branch().unwrap(), "docsync/20250101-000000");

    cli.stage_all().unwrap();
    assert!(!cli.has_staged_changes().unwrap());

    std::fs::create_dir_all(cli.repo_dir().join("docs")).unwrap();
    std::fs::write(cli.repo_dir().join("docs/beta.md"), "# Beta\n").unwrap();
    cli.stage_all().unwrap();
    assert!(cli.has_staged_changes().unwrap());
    cli.commit("docs: sync Beta").unwrap();
    assert!(!cli.has_staged_changes().unwrap());

    let author = git(cli.repo_dir(), &["log", "-1", "--format=%an <%ae>"]);
    assert_eq!(author, "Docs Bot <docs-bot@example.com>");

    cli.push("docsync/20250101-000000").unwrap();
    let remote = root.path().join("remote.git");
    let subject = git(&remote, &["log", "-1", "--format=%s", "docsync/20250101-000000"]);
    assert_eq!(subject, "docs: sync Beta");

    cli.checkout("main").unwrap();
    assert_eq!(cli.current_branch().unwrap(), "main");
    assert!(!cli.repo_dir().join("docs/beta.md").exists());
}

#[test]
fn test_failed_command_carries_stderr() {
    let (_root, cli) = fixture();
    match cli.checkout("does-not-exist") {
        Err(VcsError::Command { command, stderr, .. }) => {
            assert_eq!(command, "checkout does-not-exist");
            assert!(!stderr.is_empty());
        }
        other => panic!("expected a command error, got {other:?}"),
    }
}
