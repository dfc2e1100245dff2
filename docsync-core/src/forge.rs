//! Merge-proposal clients for GitLab and GitHub.
//!
//! Both expose the same capability ([`Forge::create_merge_proposal`]) and differ
//! only in endpoint, auth header and payload field names:
//!
//! | Forge  | Endpoint                                  | Auth header      | URL field  |
//! |--------|-------------------------------------------|------------------|------------|
//! | GitLab | `POST /projects/{id}/merge_requests`      | `PRIVATE-TOKEN`  | `web_url`  |
//! | GitHub | `POST /repos/{owner}/{repo}/pulls`        | `Authorization`  | `html_url` |
//!
//! GitHub pull requests take labels through the issues API in a second call.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::contract::{Forge, MergeProposal};
use crate::error::ForgeError;

pub const GITLAB_API_URL: &str = "https://gitlab.com/api/v4";
pub const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("docsync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeKind {
    GitLab,
    GitHub,
}

impl ForgeKind {
    pub fn default_api_url(&self) -> &'static str {
        match self {
            ForgeKind::GitLab => GITLAB_API_URL,
            ForgeKind::GitHub => GITHUB_API_URL,
        }
    }
}

/// Build the forge client for `kind`, selected once at startup.
pub fn forge_for(
    kind: ForgeKind,
    api_url: Option<&str>,
    project: &str,
    token: &str,
) -> Result<Box<dyn Forge>, ForgeError> {
    let api_url = api_url.unwrap_or(kind.default_api_url());
    Ok(match kind {
        ForgeKind::GitLab => Box::new(GitLabClient::new(api_url, project, token)),
        ForgeKind::GitHub => Box::new(GitHubClient::new(api_url, project, token)?),
    })
}

async fn send_json(request: RequestBuilder) -> Result<Value, ForgeError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
        error!(status = %status, body = %body, "[FORGE] API returned error");
        return Err(ForgeError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<Value>().await?)
}

pub struct GitLabClient {
    client: Client,
    api_url: String,
    project: String,
    token: String,
}

impl GitLabClient {
    pub fn new(api_url: &str, project: &str, token: &str) -> Self {
        GitLabClient {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            token: token.to_string(),
        }
    }

    /// Project ids may be numeric or a `group/project` path, which must be URL-encoded.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/projects/{}/merge_requests",
            self.api_url,
            self.project.replace('/', "%2F")
        )
    }

    pub fn payload(proposal: &MergeProposal) -> Value {
        json!({
            "source_branch": proposal.source_branch,
            "target_branch": proposal.target_branch,
            "title": proposal.title,
            "description": proposal.description,
            "labels": proposal.labels.join(","),
            "draft": true,
        })
    }
}

#[async_trait]
impl Forge for GitLabClient {
    async fn create_merge_proposal(&self, proposal: &MergeProposal) -> Result<String, ForgeError> {
        info!(
            project = %self.project,
            source = %proposal.source_branch,
            target = %proposal.target_branch,
            "[FORGE] Creating GitLab merge request"
        );
        let request = self
            .client
            .post(self.endpoint())
            .header("PRIVATE-TOKEN", &self.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&Self::payload(proposal));
        let body = send_json(request).await?;
        body.get("web_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ForgeError::MissingField("web_url"))
    }
}

pub struct GitHubClient {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubClient {
    /// `project` is `owner/repo`.
    pub fn new(api_url: &str, project: &str, token: &str) -> Result<Self, ForgeError> {
        let (owner, repo) = project
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| ForgeError::InvalidProject(project.to_string()))?;
        Ok(GitHubClient {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }

    pub fn pulls_endpoint(&self) -> String {
        format!("{}/repos/{}/{}/pulls", self.api_url, self.owner, self.repo)
    }

    pub fn labels_endpoint(&self, number: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/labels",
            self.api_url, self.owner, self.repo, number
        )
    }

    pub fn payload(proposal: &MergeProposal) -> Value {
        json!({
            "head": proposal.source_branch,
            "base": proposal.target_branch,
            "title": proposal.title,
            "body": proposal.description,
            "draft": true,
        })
    }

    fn post(&self, url: String) -> RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
    }
}

#[async_trait]
impl Forge for GitHubClient {
    async fn create_merge_proposal(&self, proposal: &MergeProposal) -> Result<String, ForgeError> {
        info!(
            owner = %self.owner,
            repo = %self.repo,
            source = %proposal.source_branch,
            target = %proposal.target_branch,
            "[FORGE] Creating GitHub pull request"
        );
        let body = send_json(self.post(self.pulls_endpoint()).json(&Self::payload(proposal))).await?;
        let url = body
            .get("html_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ForgeError::MissingField("html_url"))?;

        if !proposal.labels.is_empty() {
            match body.get("number").and_then(Value::as_u64) {
                Some(number) => {
                    let labels = json!({ "labels": proposal.labels });
                    if let Err(e) = send_json(self.post(self.labels_endpoint(number)).json(&labels)).await {
                        warn!(error = %e, number, "[FORGE] Pull request opened but labels were not applied");
                    }
                }
                None => warn!("[FORGE] Pull request response had no number, labels not applied"),
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> MergeProposal {
        MergeProposal {
            source_branch: "docsync/20250101-000000".into(),
            target_branch: "main".into(),
            title: "docs: sync Beta".into(),
            description: "- Beta\n".into(),
            labels: vec!["content-update".into(), "docs".into()],
        }
    }

    #[test]
    fn gitlab_payload_uses_merge_request_fields() {
        let payload = GitLabClient::payload(&proposal());
        assert_eq!(payload["source_branch"], "docsync/20250101-000000");
        assert_eq!(payload["target_branch"], "main");
        assert_eq!(payload["labels"], "content-update,docs");
        assert_eq!(payload["draft"], true);
    }

    #[test]
    fn gitlab_endpoint_encodes_project_path() {
        let client = GitLabClient::new("https://gitlab.example.com/api/v4/", "team/site", "t");
        assert_eq!(
            client.endpoint(),
            "https://gitlab.example.com/api/v4/projects/team%2Fsite/merge_requests"
        );
    }

    #[test]
    fn github_payload_uses_pull_request_fields() {
        let payload = GitHubClient::payload(&proposal());
        assert_eq!(payload["head"], "docsync/20250101-000000");
        assert_eq!(payload["base"], "main");
        assert_eq!(payload["body"], "- Beta\n");
        assert!(payload.get("labels").is_none());
    }

    #[test]
    fn github_requires_owner_and_repo() {
        assert!(GitHubClient::new(GITHUB_API_URL, "just-a-name", "t").is_err());
        assert!(GitHubClient::new(GITHUB_API_URL, "a/b/c", "t").is_err());
        let client = GitHubClient::new(GITHUB_API_URL, "acme/docs", "t").expect("valid");
        assert_eq!(client.pulls_endpoint(), "https://api.github.com/repos/acme/docs/pulls");
        assert_eq!(client.labels_endpoint(7), "https://api.github.com/repos/acme/docs/issues/7/labels");
    }
}
