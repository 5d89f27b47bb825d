//! Waits for a freshly created repository to become visible.
//!
//! Branch visibility on the source-control host is eventually consistent. The
//! deployment step only proceeds once the default branch (or its fallback)
//! resolves to a commit, so an empty repository fails here with a precise error
//! instead of as an opaque deployment failure later.

use std::sync::Arc;
use std::time::Duration;

use crate::clients::{with_deadline, SourceControlHost};
use crate::error::ProvisionError;

#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    /// Constant delay between attempts (no backoff, no jitter).
    pub delay: Duration,
    pub primary_branch: String,
    pub fallback_branch: String,
    /// Deadline applied to each branch lookup.
    pub call_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(2),
            primary_branch: "main".to_string(),
            fallback_branch: "master".to_string(),
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReady {
    pub branch: String,
    pub commit: String,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct ReadinessPoller {
    host: Arc<dyn SourceControlHost>,
    cfg: ReadinessConfig,
}

impl ReadinessPoller {
    pub fn new(host: Arc<dyn SourceControlHost>, cfg: ReadinessConfig) -> Self {
        Self { host, cfg }
    }

    pub fn config(&self) -> &ReadinessConfig {
        &self.cfg
    }

    pub async fn wait_until_ready(&self, repo: &str) -> Result<RepositoryReady, ProvisionError> {
        let max_attempts = self.cfg.max_attempts.max(1);
        let branches = [&self.cfg.primary_branch, &self.cfg.fallback_branch];

        for attempt in 1..=max_attempts {
            for branch in branches {
                let lookup = with_deadline(
                    "branch lookup",
                    self.cfg.call_timeout,
                    self.host.branch_exists(repo, branch),
                )
                .await;

                match lookup {
                    Ok(Some(commit)) => {
                        tracing::debug!(repo, branch = %branch, attempt, "repository is ready");
                        return Ok(RepositoryReady {
                            branch: branch.to_string(),
                            commit,
                            attempts: attempt,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(repo, branch = %branch, attempt, error = %e, "branch lookup failed");
                    }
                }
            }

            if attempt < max_attempts {
                tracing::debug!(repo, attempt, max_attempts, "repository not visible yet, waiting");
                tokio::time::sleep(self.cfg.delay).await;
            }
        }

        Err(ProvisionError::RepositoryNotReady {
            repository: repo.to_string(),
            branches: branches.iter().map(|b| b.to_string()).collect(),
            attempts: max_attempts,
        })
    }
}
