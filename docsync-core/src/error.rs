//! Error taxonomy for docsync-core.
//!
//! Only [`SyncError`] ever escapes [`crate::synchronise::synchronise`]. Unit
//! and reference-load errors are recovered inside the run and only surface in
//! logs and in the run report.

use std::fmt;

use thiserror::Error;

/// Boxed error returned by the collaborator traits (content source, transformer).
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal, pre-flight configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Pipeline stage a unit was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStage {
    Checking,
    Listing,
    Fetching,
    Assembling,
    Transforming,
    Persisting,
}

impl fmt::Display for UnitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitStage::Checking => "checking",
            UnitStage::Listing => "listing",
            UnitStage::Fetching => "fetching",
            UnitStage::Assembling => "assembling",
            UnitStage::Transforming => "transforming",
            UnitStage::Persisting => "persisting",
        };
        f.write_str(s)
    }
}

/// Failure while handling one unit. Recovered by the orchestrator.
#[derive(Debug, Error)]
#[error("unit {unit:?} failed while {stage}: {source}")]
pub struct UnitError {
    pub unit: String,
    pub stage: UnitStage,
    #[source]
    pub source: ClientError,
}

impl UnitError {
    pub fn new(unit: impl Into<String>, stage: UnitStage, source: impl Into<ClientError>) -> Self {
        UnitError {
            unit: unit.into(),
            stage,
            source: source.into(),
        }
    }
}

/// Failure loading one root-level reference document.
#[derive(Debug, Error)]
#[error("reference document {name:?} could not be loaded: {source}")]
pub struct ReferenceLoadError {
    pub name: String,
    #[source]
    pub source: ClientError,
}

/// Failure of a version-control primitive.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to launch `git {command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected git output for `{command}`: {output:?}")]
    Output { command: String, output: String },
}

/// Failure talking to the forge (GitLab/GitHub).
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("forge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("forge API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("forge response did not contain {0}")]
    MissingField(&'static str),

    #[error("invalid forge project {0:?}")]
    InvalidProject(String),
}

/// Fatal, run-level errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to list units under root {root}: {source}")]
    ListUnits {
        root: String,
        #[source]
        source: ClientError,
    },

    #[error("version control error: {0}")]
    Vcs(#[from] VcsError),

    /// The branch has already been pushed; it stays on the remote without a proposal.
    #[error("merge proposal for pushed branch {branch} failed: {source}")]
    MergeProposal {
        branch: String,
        #[source]
        source: ForgeError,
    },
}
