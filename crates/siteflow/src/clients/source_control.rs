use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::http::{build_client, ensure_success, parse_response};
use super::{ClientError, Repository, SourceControlHost};

/// GitHub REST client. Site repositories are generated from a template repository.
pub struct GitHubHost {
    client: reqwest::Client,
    api_url: String,
    token: String,
    owner: String,
    template_owner: String,
    template_repo: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    html_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    owner: OwnerResponse,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: CommitResponse,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

impl GitHubHost {
    pub fn new(
        api_url: String,
        token: String,
        owner: String,
        template_owner: String,
        template_repo: String,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url,
            token,
            owner,
            template_owner,
            template_repo,
        })
    }
}

#[async_trait]
impl SourceControlHost for GitHubHost {
    async fn create_repository(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Repository, ClientError> {
        let response = self
            .client
            .post(format!(
                "{}/repos/{}/{}/generate",
                self.api_url, self.template_owner, self.template_repo
            ))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&json!({
                "owner": self.owner,
                "name": name,
                "description": description,
                "private": true,
                "include_all_branches": false,
            }))
            .send()
            .await?;

        let repo: RepoResponse = parse_response(response).await?;
        Ok(Repository {
            owner: repo.owner.login,
            name: repo.name,
            html_url: repo.html_url,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
        })
    }

    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<Option<String>, ClientError> {
        let response = self
            .client
            .get(format!("{}/repos/{}/branches/{}", self.api_url, repo, branch))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        // 404 (no such branch) and 409 (empty repository) both mean "not there yet".
        if matches!(response.status().as_u16(), 404 | 409) {
            return Ok(None);
        }

        let branch: BranchResponse = ensure_success(response).await?.json().await?;
        Ok(Some(branch.commit.sha))
    }
}
