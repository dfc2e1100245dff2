//! # contract: collaborator interfaces and the shared data model
//!
//! Every external collaborator of the sync engine sits behind a trait defined
//! here, so the orchestrator can run against real clients or generated mocks:
//!
//! - [`ContentSource`]: the remote tree of units (folders) and items (files).
//! - [`Transformer`]: turns raw material into finished document text.
//! - [`Repository`]: version-control primitives in one local working directory.
//! - [`Forge`]: opens merge proposals.
//!
//! ## Mocking & Testing
//! - Each trait is annotated for `mockall` so consumers can generate deterministic
//!   mocks for unit/integration tests (`MockContentSource`, `MockTransformer`, ...).
//!   The `test-export-mocks` feature (on by default) exports them to `tests/`.
//!
//! ## Errors
//! - Content source and transformer return boxed errors ([`ClientError`]); the
//!   orchestrator attaches the unit and stage before logging them.
//! - Repository and forge return typed errors because their failures are fatal.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::error::{ClientError, ForgeError, VcsError};

/// A logical content grouping at the remote source. Maps to one generated document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub id: String,
    pub name: String,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Kind of a remote item, decided by the source client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Document,
    Spreadsheet,
    Image,
    Other,
}

/// One file inside a [`SourceUnit`]. Fetched fresh every run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub modified_at: DateTime<Utc>,
    /// MIME type as reported by the source, used to pick image extensions.
    pub mime_type: Option<String>,
}

/// A root-level document handed to every transformation as background material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDoc {
    pub name: String,
    pub content: String,
}

/// Input for one transformation call.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    pub unit_name: String,
    /// Concatenated text fragments assembled from the unit's items.
    pub raw_text: String,
    /// Site-relative paths of the images staged for this unit.
    pub image_paths: Vec<String>,
    /// The previous document body with its watermark stripped.
    pub existing_body: Option<String>,
    pub references: Vec<ReferenceDoc>,
}

/// A request to open a draft merge proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeProposal {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
    pub labels: Vec<String>,
}

/// Read access to the remote content source.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List the units (folders) directly under `root_id`.
    async fn list_units(&self, root_id: &str) -> Result<Vec<SourceUnit>, ClientError>;

    /// List the items directly inside `parent_id` (a unit, or the root itself).
    async fn list_items(&self, parent_id: &str) -> Result<Vec<SourceItem>, ClientError>;

    /// Export a document item as plain text.
    async fn export_document_text(&self, item_id: &str) -> Result<String, ClientError>;

    /// Export a spreadsheet item as CSV.
    async fn export_spreadsheet_csv(&self, item_id: &str) -> Result<String, ClientError>;

    /// Download the raw bytes of an item.
    async fn download_bytes(&self, item_id: &str) -> Result<Vec<u8>, ClientError>;
}

/// The generative step: raw material in, finished document text out.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, request: &TransformRequest) -> Result<String, ClientError>;
}

/// Version-control primitives, scoped to one local working directory.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Repository: Send + Sync {
    /// Name of the currently checked out branch.
    fn current_branch(&self) -> Result<String, VcsError>;

    /// Bring `branch` up to date with its remote.
    fn pull(&self, branch: &str) -> Result<(), VcsError>;

    /// Create `name` from the current HEAD and check it out.
    fn create_branch(&self, name: &str) -> Result<(), VcsError>;

    fn checkout(&self, name: &str) -> Result<(), VcsError>;

    /// Stage every working-tree change.
    fn stage_all(&self) -> Result<(), VcsError>;

    fn has_staged_changes(&self) -> Result<bool, VcsError>;

    fn commit(&self, message: &str) -> Result<(), VcsError>;

    /// Publish `branch` and set up upstream tracking.
    fn push(&self, branch: &str) -> Result<(), VcsError>;

    /// Whether any of `paths` has staged, unstaged or untracked changes.
    fn has_uncommitted_changes(&self, paths: &[PathBuf]) -> Result<bool, VcsError>;
}

/// Merge-proposal capability of a forge (GitLab merge request, GitHub pull request).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Forge: Send + Sync {
    /// Open a draft proposal and return its web URL.
    async fn create_merge_proposal(&self, proposal: &MergeProposal) -> Result<String, ForgeError>;
}
