//! Provisioning workflow: accepts a request, hands back a job id, and runs the
//! six steps on a detached task.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::clients::{
    AnalyticsProvider, DeploymentPlatform, DomainRegistrar, SiteRecordStore, SourceControlHost,
};
use crate::error::ProvisionError;
use crate::jobs::{ActiveJobs, JobIdGenerator, JobStep, JobStore, JobWriter, NewJob, WorkflowResult};

pub mod executor;
pub mod input;

pub use executor::{classify_failure, FailureClass, StepExecutor, WorkflowSettings};
pub use input::{normalize_domain, TemplateConfig, WorkflowInput};

/// The external systems one workflow talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub registrar: Arc<dyn DomainRegistrar>,
    pub platform: Arc<dyn DeploymentPlatform>,
    pub source: Arc<dyn SourceControlHost>,
    pub records: Arc<dyn SiteRecordStore>,
    pub analytics: Arc<dyn AnalyticsProvider>,
}

pub struct StartedJob {
    pub job_id: String,
    /// Resolves with the workflow outcome. Dropping it does not cancel the job.
    pub handle: JoinHandle<WorkflowResult>,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    executor: Arc<StepExecutor>,
    ids: Arc<JobIdGenerator>,
    active: ActiveJobs,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        collaborators: Collaborators,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            executor: Arc::new(StepExecutor::new(collaborators, settings)),
            ids: Arc::new(JobIdGenerator::new()),
            active: ActiveJobs::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn active_jobs(&self) -> &ActiveJobs {
        &self.active
    }

    /// Validates the request, records a pending job and starts the workflow
    /// without waiting for it.
    pub async fn start(&self, input: WorkflowInput) -> Result<StartedJob, ProvisionError> {
        input.validate()?;

        let job_id = self.ids.next_id(&input.website_name);
        let lease = self.active.claim(&job_id).ok_or_else(|| {
            ProvisionError::JobStore(format!("job {job_id} already has a running workflow"))
        })?;
        let writer = JobWriter::new(self.store.clone(), lease);

        writer
            .create(NewJob {
                website_name: input.website_name.trim().to_string(),
                message: Some("Website creation queued".to_string()),
                steps: JobStep::all_pending(),
            })
            .await;

        let executor = self.executor.clone();
        let handle = tokio::spawn(executor.run(writer, input));

        Ok(StartedJob { job_id, handle })
    }
}
