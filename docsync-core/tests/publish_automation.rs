mod common;

use common::config_in;
use docsync_core::contract::{MockForge, MockRepository};
use docsync_core::error::{SyncError, VcsError};
use docsync_core::publish::{ChangeSet, PublishOutcome, Publisher};
use mockall::Sequence;
use tempfile::tempdir;

fn changes(units: &[&str]) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for unit in units {
        changes.record(*unit);
    }
    changes
}

fn command_failed(command: &str) -> VcsError {
    VcsError::Command {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
        stderr: "rejected".to_string(),
    }
}

#[tokio::test]
async fn test_steps_run_in_order_and_leave_the_sync_branch_checked_out() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.target_branch = Some("develop".to_string());
    config.labels = vec!["docs".to_string(), "automated".to_string()];

    let mut seq = Sequence::new();
    let mut repo = MockRepository::new();
    repo.expect_current_branch()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok("release".to_string()));
    repo.expect_pull()
        .withf(|b: &str| b == "release")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    repo.expect_create_branch()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    repo.expect_stage_all()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    repo.expect_has_staged_changes()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(true));
    repo.expect_commit()
        .withf(|msg: &str| msg == "docs: sync Alpha, Beta")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    repo.expect_push()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let mut forge = MockForge::new();
    forge
        .expect_create_merge_proposal()
        .withf(|p| {
            p.target_branch == "develop"
                && p.labels == vec!["docs".to_string(), "automated".to_string()]
                && p.description.contains("- Alpha\n- Beta\n")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok("https://github.com/acme/docs/pull/3".to_string()));

    // The proposal's branch stays checked out.
    repo.expect_checkout().never();

    let outcome = Publisher::new(&config, &repo, &forge)
        .publish(&changes(&["Alpha", "Beta"]))
        .await
        .expect("publication succeeds");

    match outcome {
        PublishOutcome::Proposed { branch, base_ref, url } => {
            assert!(branch.starts_with("docsync/"));
            assert_eq!(base_ref, "release");
            assert_eq!(url, "https://github.com/acme/docs/pull/3");
        }
        other => panic!("expected a proposal, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nothing_staged_skips_commit_push_and_proposal() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());

    let mut repo = MockRepository::new();
    repo.expect_current_branch()
        .returning(|| Ok("main".to_string()));
    repo.expect_pull().returning(|_| Ok(()));
    repo.expect_create_branch().returning(|_| Ok(()));
    repo.expect_stage_all().returning(|| Ok(()));
    repo.expect_has_staged_changes().returning(|| Ok(false));
    repo.expect_commit().never();
    repo.expect_push().never();
    repo.expect_checkout()
        .withf(|b: &str| b == "main")
        .times(1)
        .returning(|_| Ok(()));
    let mut forge = MockForge::new();
    forge.expect_create_merge_proposal().never();

    let outcome = Publisher::new(&config, &repo, &forge)
        .publish(&changes(&["Alpha"]))
        .await
        .expect("nothing to commit is not an error");

    assert_eq!(
        outcome,
        PublishOutcome::NothingToCommit {
            base_ref: "main".to_string()
        }
    );
}

#[tokio::test]
async fn test_push_failure_aborts_and_returns_to_base() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());

    let mut repo = MockRepository::new();
    repo.expect_current_branch()
        .returning(|| Ok("main".to_string()));
    repo.expect_pull().returning(|_| Ok(()));
    repo.expect_create_branch().returning(|_| Ok(()));
    repo.expect_stage_all().returning(|| Ok(()));
    repo.expect_has_staged_changes().returning(|| Ok(true));
    repo.expect_commit().returning(|_| Ok(()));
    repo.expect_push()
        .times(1)
        .returning(|_| Err(command_failed("push --set-upstream origin docsync/x")));
    repo.expect_checkout()
        .withf(|b: &str| b == "main")
        .times(1)
        .returning(|_| Ok(()));
    let mut forge = MockForge::new();
    forge.expect_create_merge_proposal().never();

    let result = Publisher::new(&config, &repo, &forge)
        .publish(&changes(&["Alpha"]))
        .await;

    assert!(matches!(result, Err(SyncError::Vcs(VcsError::Command { .. }))));
}

#[tokio::test]
async fn test_failed_pull_happens_before_any_branch_exists() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());

    let mut repo = MockRepository::new();
    repo.expect_current_branch()
        .returning(|| Ok("main".to_string()));
    repo.expect_pull()
        .returning(|_| Err(command_failed("pull --ff-only origin main")));
    repo.expect_create_branch().never();
    repo.expect_checkout().never();

    let result = Publisher::new(&config, &repo, &MockForge::new())
        .publish(&changes(&["Alpha"]))
        .await;

    assert!(matches!(result, Err(SyncError::Vcs(_))));
}

#[test]
fn test_return_to_branch_swallows_checkout_errors() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    let mut repo = MockRepository::new();
    repo.expect_checkout()
        .times(1)
        .returning(|_| Err(command_failed("checkout main")));
    let forge = MockForge::new();

    Publisher::new(&config, &repo, &forge).return_to_branch("main");
}
