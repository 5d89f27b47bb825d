use crate::clients::ClientError;

/// Failure taxonomy for provisioning.
///
/// Only `Validation` is surfaced synchronously by the start endpoint. Everything else is
/// reported through the job record, except for the domain endpoints which answer directly.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: ClientError,
    },

    #[error(
        "repository {repository} not ready after {attempts} attempt(s) (branches tried: {})",
        branches.join(", ")
    )]
    RepositoryNotReady {
        repository: String,
        branches: Vec<String>,
        attempts: u32,
    },

    #[error("job store error: {0}")]
    JobStore(String),

    #[error("domain {0} is not available for registration")]
    DomainUnavailable(String),

    #[error("domain registration failed: {0}")]
    RegistrationFailed(String),
}

impl ProvisionError {
    pub fn collaborator(operation: &'static str, source: ClientError) -> Self {
        Self::Collaborator { operation, source }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Collaborator { source, .. } => source.code(),
            Self::RepositoryNotReady { .. } => "REPOSITORY_NOT_READY",
            Self::JobStore(_) => "JOB_STORE",
            Self::DomainUnavailable(_) => "DOMAIN_UNAVAILABLE",
            Self::RegistrationFailed(_) => "REGISTRATION_FAILED",
        }
    }

    /// Message written to the job record and shown to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::RepositoryNotReady { repository, .. } => format!(
                "The website repository {repository} was created but never became visible to \
                 the deployment platform (no commits on its default branch). \
                 Check the template repository and try again."
            ),
            Self::DomainUnavailable(domain) => {
                format!("Domain {domain} is no longer available. Please choose another domain.")
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job store unavailable: {0}")]
    Unavailable(String),

    #[error("job record could not be encoded: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<sqlx::Error> for JobStoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<JobStoreError> for ProvisionError {
    fn from(e: JobStoreError) -> Self {
        Self::JobStore(e.to_string())
    }
}
