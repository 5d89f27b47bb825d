use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::http::{build_client, check_status, parse_response};
use super::{
    BuildSettings, ClientError, Deployment, DeploymentPlatform, DeploymentState, Project, RepoRef,
};

/// Vercel REST API client.
pub struct VercelPlatform {
    client: reqwest::Client,
    api_url: String,
    token: String,
    team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentResponse {
    id: String,
    url: String,
    #[serde(default)]
    alias: Vec<String>,
    #[serde(default, rename = "readyState", alias = "status")]
    ready_state: DeploymentState,
}

#[derive(Debug, Deserialize)]
struct DeploymentStatusResponse {
    #[serde(default, rename = "readyState", alias = "status")]
    ready_state: DeploymentState,
}

impl VercelPlatform {
    pub fn new(
        api_url: String,
        token: String,
        team_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url,
            token,
            team_id,
        })
    }

    fn url(&self, path: &str) -> String {
        match &self.team_id {
            Some(team) => format!("{}{}?teamId={}", self.api_url, path, team),
            None => format!("{}{}", self.api_url, path),
        }
    }
}

#[async_trait]
impl DeploymentPlatform for VercelPlatform {
    async fn create_project(
        &self,
        name: &str,
        repo: &RepoRef,
        build: &BuildSettings,
    ) -> Result<Project, ClientError> {
        let env: Vec<_> = build
            .environment
            .iter()
            .map(|(key, value)| {
                json!({
                    "key": key,
                    "value": value,
                    "type": "plain",
                    "target": ["production", "preview"],
                })
            })
            .collect();

        let response = self
            .client
            .post(self.url("/v10/projects"))
            .bearer_auth(&self.token)
            .json(&json!({
                "name": name,
                "framework": build.framework,
                "buildCommand": build.build_command,
                "outputDirectory": build.output_directory,
                "gitRepository": { "type": "github", "repo": repo.full_name() },
                "environmentVariables": env,
            }))
            .send()
            .await?;

        let project: ProjectResponse = parse_response(response).await?;
        Ok(Project {
            id: project.id,
            name: project.name,
        })
    }

    async fn create_deployment(
        &self,
        project_name: &str,
        repo: &RepoRef,
    ) -> Result<Deployment, ClientError> {
        let response = self
            .client
            .post(self.url("/v13/deployments"))
            .bearer_auth(&self.token)
            .json(&json!({
                "name": project_name,
                "project": project_name,
                "target": "production",
                "gitSource": {
                    "type": "github",
                    "org": repo.owner,
                    "repo": repo.name,
                    "ref": repo.branch,
                },
            }))
            .send()
            .await?;

        let d: DeploymentResponse = parse_response(response).await?;
        Ok(Deployment {
            id: d.id,
            url: d.url,
            alias: d.alias.into_iter().next(),
            state: d.ready_state,
        })
    }

    async fn add_domain_to_project(
        &self,
        project_name: &str,
        domain: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url(&format!("/v10/projects/{project_name}/domains")))
            .bearer_auth(&self.token)
            .json(&json!({ "name": domain }))
            .send()
            .await?;

        check_status(response).await
    }

    async fn get_deployment_status(
        &self,
        deployment_id: &str,
    ) -> Result<DeploymentState, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/v13/deployments/{deployment_id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status: DeploymentStatusResponse = parse_response(response).await?;
        Ok(status.ready_state)
    }
}
