//! `Repository` backed by the `git` binary.
//!
//! Every command runs with `-C <repo_dir>`, so the process working directory
//! does not matter. Pathspecs may be absolute as long as they point inside the
//! working tree.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, error};

use crate::contract::Repository;
use crate::error::VcsError;

pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
    remote: String,
    author_name: Option<String>,
    author_email: Option<String>,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        GitCli {
            repo_dir: repo_dir.into(),
            remote: remote.into(),
            author_name: None,
            author_email: None,
        }
    }

    /// Commit identity passed as `-c user.name=… -c user.email=…`.
    pub fn with_author(mut self, name: Option<String>, email: Option<String>) -> Self {
        self.author_name = name;
        self.author_email = email;
        self
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo_dir);
        if let Some(name) = &self.author_name {
            cmd.arg("-c").arg(format!("user.name={name}"));
        }
        if let Some(email) = &self.author_email {
            cmd.arg("-c").arg(format!("user.email={email}"));
        }
        cmd.args(args);
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output, VcsError> {
        let command = args.join(" ");
        debug!(repo = %self.repo_dir.display(), command = %command, "[GIT] Running");
        self.command(args).output().map_err(|source| {
            error!(error = ?source, command = %command, "[GIT] Failed to launch git");
            VcsError::Spawn { command, source }
        })
    }

    /// Run `git <args>` and return trimmed stdout, failing on a non-zero exit.
    fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.output(args)?;
        if !output.status.success() {
            let command = args.join(" ");
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(command = %command, status = %output.status, stderr = %stderr, "[GIT] Command failed");
            return Err(VcsError::Command {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Repository for GitCli {
    fn current_branch(&self) -> Result<String, VcsError> {
        let branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch.is_empty() || branch == "HEAD" {
            return Err(VcsError::Output {
                command: "rev-parse --abbrev-ref HEAD".into(),
                output: branch,
            });
        }
        Ok(branch)
    }

    fn pull(&self, branch: &str) -> Result<(), VcsError> {
        self.run(&["pull", "--ff-only", &self.remote, branch]).map(|_| ())
    }

    fn create_branch(&self, name: &str) -> Result<(), VcsError> {
        self.run(&["checkout", "-b", name]).map(|_| ())
    }

    fn checkout(&self, name: &str) -> Result<(), VcsError> {
        self.run(&["checkout", name]).map(|_| ())
    }

    fn stage_all(&self) -> Result<(), VcsError> {
        self.run(&["add", "--all"]).map(|_| ())
    }

    fn has_staged_changes(&self) -> Result<bool, VcsError> {
        // `--quiet` exits 1 when the index differs from HEAD.
        let args = ["diff", "--cached", "--quiet"];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(VcsError::Command {
                command: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    fn commit(&self, message: &str) -> Result<(), VcsError> {
        self.run(&["commit", "-m", message]).map(|_| ())
    }

    fn push(&self, branch: &str) -> Result<(), VcsError> {
        // Single-branch clones only fetch their own branch unless told otherwise.
        self.run(&["remote", "set-branches", "--add", &self.remote, branch])?;
        self.run(&["push", "--set-upstream", &self.remote, branch])
            .map(|_| ())
    }

    fn has_uncommitted_changes(&self, paths: &[PathBuf]) -> Result<bool, VcsError> {
        let paths: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let mut args = vec!["status", "--porcelain", "--untracked-files=all", "--"];
        args.extend(paths.iter().map(String::as_str));
        Ok(!self.run(&args)?.is_empty())
    }
}
