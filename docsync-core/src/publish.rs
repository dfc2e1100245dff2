//! Version-control automation: one branch, one commit, one merge proposal per run.
//!
//! Ordering is fixed: branch → commit → push → proposal. A commit with nothing
//! staged short-circuits back to the base branch without pushing, and any
//! failure after the branch exists also returns to the base branch. A
//! successful proposal leaves the sync branch checked out: the freshly stamped
//! documents only exist there, and the next run must see them.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::contract::{Forge, MergeProposal, Repository};
use crate::error::{ForgeError, SyncError, VcsError};

/// Label recorded in the change set when a run resumes pending work.
pub const RESUME_SENTINEL: &str = "pending changes from a previous run";

const TITLE_UNIT_LIMIT: usize = 3;

/// Units whose documents were rewritten during the run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    units: Vec<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change set standing in for work left behind by an earlier run.
    pub fn resumed() -> Self {
        ChangeSet {
            units: vec![RESUME_SENTINEL.to_string()],
        }
    }

    pub fn record(&mut self, unit: impl Into<String>) {
        self.units.push(unit.into());
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn title(&self) -> String {
        let shown = self.units.iter().take(TITLE_UNIT_LIMIT).cloned().collect::<Vec<_>>();
        let mut title = format!("docs: sync {}", shown.join(", "));
        if self.units.len() > TITLE_UNIT_LIMIT {
            title.push_str(&format!(" and {} more", self.units.len() - TITLE_UNIT_LIMIT));
        }
        title
    }

    pub fn description(&self) -> String {
        let mut body = String::from("Automated content sync.\n\nUpdated units:\n");
        for unit in &self.units {
            body.push_str(&format!("- {unit}\n"));
        }
        body
    }
}

/// Disposable branch holding one run's commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncBranch {
    pub name: String,
    pub base_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing was staged; no commit, push or proposal happened.
    NothingToCommit { base_ref: String },
    Proposed {
        branch: String,
        base_ref: String,
        url: String,
    },
}

/// Branch name derived from wall-clock time.
pub fn branch_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), now.format("%Y%m%d-%H%M%S"))
}

pub struct Publisher<'a, R: ?Sized, F: ?Sized> {
    config: &'a SyncConfig,
    repo: &'a R,
    forge: &'a F,
}

impl<'a, R, F> Publisher<'a, R, F>
where
    R: Repository + ?Sized,
    F: Forge + ?Sized,
{
    pub fn new(config: &'a SyncConfig, repo: &'a R, forge: &'a F) -> Self {
        Publisher {
            config,
            repo,
            forge,
        }
    }

    /// Record the current branch as base, update it, then create and check out a fresh branch.
    pub fn create_branch(&self) -> Result<SyncBranch, VcsError> {
        let base_ref = self.repo.current_branch()?;
        info!(base = %base_ref, "[PUBLISH] Updating base branch");
        self.repo.pull(&base_ref)?;
        let name = branch_name(&self.config.branch_prefix, Utc::now());
        self.repo.create_branch(&name)?;
        info!(branch = %name, base = %base_ref, "[PUBLISH] Created sync branch");
        Ok(SyncBranch { name, base_ref })
    }

    /// Stage everything and commit. `Ok(false)` when nothing was staged.
    pub fn commit(&self, message: &str) -> Result<bool, VcsError> {
        self.repo.stage_all()?;
        if !self.repo.has_staged_changes()? {
            info!("[PUBLISH] Nothing staged, skipping commit");
            return Ok(false);
        }
        self.repo.commit(message)?;
        info!(commit_message = message, "[PUBLISH] Committed changes");
        Ok(true)
    }

    pub fn push(&self, branch: &str) -> Result<(), VcsError> {
        self.repo.push(branch)?;
        info!(branch, "[PUBLISH] Pushed branch");
        Ok(())
    }

    pub async fn create_merge_proposal(
        &self,
        source: &str,
        target: &str,
        title: &str,
        description: &str,
    ) -> Result<String, ForgeError> {
        let proposal = MergeProposal {
            source_branch: source.to_string(),
            target_branch: target.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            labels: self.config.labels.clone(),
        };
        let url = self.forge.create_merge_proposal(&proposal).await?;
        info!(source, target, url = %url, "[PUBLISH] Merge proposal opened");
        Ok(url)
    }

    /// Best effort: failures are logged, never returned, so they cannot mask
    /// the error that triggered the recovery.
    pub fn return_to_branch(&self, base_ref: &str) {
        match self.repo.checkout(base_ref) {
            Ok(()) => info!(base = base_ref, "[PUBLISH] Returned to base branch"),
            Err(e) => error!(base = base_ref, error = %e, "[PUBLISH] Failed to return to base branch"),
        }
    }

    /// Run the whole branch → commit → push → proposal sequence for `changes`.
    ///
    /// Returns to the base branch unless a proposal was opened.
    pub async fn publish(&self, changes: &ChangeSet) -> Result<PublishOutcome, SyncError> {
        let branch = self.create_branch()?;
        let outcome = self.commit_push_propose(&branch, changes).await;
        match &outcome {
            Ok(PublishOutcome::Proposed { .. }) => {
                info!(branch = %branch.name, "[PUBLISH] Staying on sync branch")
            }
            Ok(PublishOutcome::NothingToCommit { .. }) => self.return_to_branch(&branch.base_ref),
            Err(e) => {
                warn!(branch = %branch.name, error = %e, "[PUBLISH] Publishing failed");
                self.return_to_branch(&branch.base_ref);
            }
        }
        outcome
    }

    async fn commit_push_propose(
        &self,
        branch: &SyncBranch,
        changes: &ChangeSet,
    ) -> Result<PublishOutcome, SyncError> {
        let title = changes.title();
        if !self.commit(&title)? {
            return Ok(PublishOutcome::NothingToCommit {
                base_ref: branch.base_ref.clone(),
            });
        }
        self.push(&branch.name)?;

        let target = self
            .config
            .target_branch
            .clone()
            .unwrap_or_else(|| branch.base_ref.clone());
        let url = self
            .create_merge_proposal(&branch.name, &target, &title, &changes.description())
            .await
            .map_err(|source| SyncError::MergeProposal {
                branch: branch.name.clone(),
                source,
            })?;
        Ok(PublishOutcome::Proposed {
            branch: branch.name.clone(),
            base_ref: branch.base_ref.clone(),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn branch_name_uses_prefix_and_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(branch_name("docsync/", now), "docsync/20250304-050607");
    }

    #[test]
    fn title_is_capped() {
        let mut changes = ChangeSet::new();
        for unit in ["A", "B", "C", "D", "E"] {
            changes.record(unit);
        }
        assert_eq!(changes.title(), "docs: sync A, B, C and 2 more");
        assert!(changes.description().contains("- E\n"));
    }

    #[test]
    fn resumed_change_set_is_not_empty() {
        let changes = ChangeSet::resumed();
        assert!(!changes.is_empty());
        assert_eq!(changes.units(), &[RESUME_SENTINEL.to_string()]);
    }
}
