//! Contracts for the external collaborators the orchestrator drives.
//!
//! Each collaborator is an async trait so the workflow can run against the HTTP
//! implementations in production and against the fakes in [`crate::testing`] in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

pub mod analytics;
pub mod http;
pub mod platform;
pub mod records;
pub mod registrar;
pub mod source_control;

pub use analytics::HttpAnalyticsProvider;
pub use platform::VercelPlatform;
pub use records::HttpSiteRecordStore;
pub use registrar::HttpDomainRegistrar;
pub use source_control::GitHubHost;

/// Response fragments collaborators use to say the thing already exists.
const ALREADY_DONE_MARKERS: &[&str] = &[
    "already exists",
    "already in use",
    "already registered",
    "already attached",
    "already assigned",
    "domain_already_in_use",
    "domain_already_exists",
];

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{0}")]
    Rejected(String),
}

impl ClientError {
    /// True when the collaborator refused because the work was done before.
    pub fn is_already_done(&self) -> bool {
        match self {
            Self::Api { body, .. } => says_already_done(body),
            Self::Rejected(msg) => says_already_done(msg),
            Self::Request(_) | Self::Timeout { .. } => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Request(_) => "DEPENDENCY_DOWN",
            Self::Api { status: 429, .. } => "RATE_LIMIT",
            Self::Api { .. } => "COLLABORATOR_REJECTED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Rejected(_) => "COLLABORATOR_REJECTED",
        }
    }
}

/// True when a collaborator message says the work was done before.
pub fn says_already_done(text: &str) -> bool {
    let text = text.to_lowercase();
    ALREADY_DONE_MARKERS.iter().any(|m| text.contains(m))
}

/// Bound a collaborator call by an explicit deadline.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(ClientError::Timeout { operation, after }),
    }
}

/// Treat an "already done" rejection as success.
pub fn tolerate_already_done(res: Result<(), ClientError>) -> Result<bool, ClientError> {
    match res {
        Ok(()) => Ok(false),
        Err(e) if e.is_already_done() => Ok(true),
        Err(e) => Err(e),
    }
}

// ----------------------------
// Domain registrar
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainAvailability {
    pub domain: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrantInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub success: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub host: String,
    pub value: String,
    pub ttl: u32,
}

impl DnsRecord {
    pub fn new(record_type: &str, host: &str, value: &str) -> Self {
        Self {
            record_type: record_type.to_string(),
            host: host.to_string(),
            value: value.to_string(),
            ttl: 1800,
        }
    }
}

#[async_trait]
pub trait DomainRegistrar: Send + Sync {
    async fn check_availability(&self, domain: &str) -> Result<DomainAvailability, ClientError>;

    async fn register(
        &self,
        domain: &str,
        years: u32,
        registrant: &RegistrantInfo,
    ) -> Result<Registration, ClientError>;

    async fn set_dns_records(&self, domain: &str, records: &[DnsRecord]) -> Result<(), ClientError>;
}

// ----------------------------
// Deployment platform
// ----------------------------

/// Repository reference understood by the deployment platform's git integration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub branch: String,
}

impl RepoRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildSettings {
    pub framework: String,
    pub build_command: Option<String>,
    pub output_directory: Option<String>,
    pub environment: Vec<(String, String)>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            framework: "nextjs".to_string(),
            build_command: None,
            output_directory: None,
            environment: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeploymentState {
    Queued,
    Building,
    Initializing,
    Ready,
    Error,
    Canceled,
    /// A state this client does not know yet; treated as still building.
    #[default]
    #[serde(other)]
    Unknown,
}

impl DeploymentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Error | Self::Canceled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    /// Platform-assigned hostname, without scheme.
    pub url: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub state: DeploymentState,
}

#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    async fn create_project(
        &self,
        name: &str,
        repo: &RepoRef,
        build: &BuildSettings,
    ) -> Result<Project, ClientError>;

    async fn create_deployment(
        &self,
        project_name: &str,
        repo: &RepoRef,
    ) -> Result<Deployment, ClientError>;

    async fn add_domain_to_project(
        &self,
        project_name: &str,
        domain: &str,
    ) -> Result<(), ClientError>;

    async fn get_deployment_status(
        &self,
        deployment_id: &str,
    ) -> Result<DeploymentState, ClientError>;
}

// ----------------------------
// Source-control host
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub html_url: String,
    pub default_branch: String,
}

#[async_trait]
pub trait SourceControlHost: Send + Sync {
    /// Creates the site repository from the configured template.
    async fn create_repository(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Repository, ClientError>;

    /// Head commit sha of `branch`, or `None` while the branch is not visible yet.
    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<Option<String>, ClientError>;
}

// ----------------------------
// Site record store
// ----------------------------

/// Field-path keyed update, e.g. `"deployment.status" -> "completed"`.
pub type FieldUpdates = Map<String, Value>;

#[async_trait]
pub trait SiteRecordStore: Send + Sync {
    async fn create_record(&self, fields: FieldUpdates) -> Result<String, ClientError>;

    async fn update_fields(&self, record_id: &str, fields: FieldUpdates)
        -> Result<(), ClientError>;
}

// ----------------------------
// Analytics
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsIds {
    pub measurement_id: String,
    pub property_id: String,
}

#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    async fn create_property(
        &self,
        site_name: &str,
        site_url: &str,
    ) -> Result<AnalyticsIds, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_done_is_detected_from_response_text() {
        let attached = ClientError::Api {
            status: 409,
            body: r#"{"error":{"code":"domain_already_in_use","message":"Domain is already in use"}}"#
                .into(),
        };
        assert!(attached.is_already_done());

        let registered = ClientError::Rejected("Domain acme.com is Already Registered".into());
        assert!(registered.is_already_done());

        let other = ClientError::Api {
            status: 400,
            body: "invalid domain".into(),
        };
        assert!(!other.is_already_done());
    }

    #[test]
    fn tolerate_already_done_maps_to_flag() {
        assert!(!tolerate_already_done(Ok(())).unwrap());
        assert!(tolerate_already_done(Err(ClientError::Rejected("already exists".into()))).unwrap());
        assert!(tolerate_already_done(Err(ClientError::Rejected("boom".into()))).is_err());
    }

    #[tokio::test]
    async fn deadline_turns_slow_calls_into_timeouts() {
        let res: Result<(), ClientError> = with_deadline(
            "slow call",
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        match res {
            Err(ClientError::Timeout { operation, .. }) => assert_eq!(operation, "slow call"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
