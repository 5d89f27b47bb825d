use std::sync::Arc;
use std::time::Duration;

use siteflow::jobs::{InMemoryJobStore, Job, JobStore};
use siteflow::poller::ReadinessConfig;
use siteflow::testing::FakeWorld;
use siteflow::workflow::{Orchestrator, WorkflowInput, WorkflowSettings};

#[allow(dead_code)]
pub fn acme_input() -> WorkflowInput {
    WorkflowInput {
        website_name: "acme".into(),
        company_name: "Acme Homes".into(),
        domain_name: "acme-homes.com".into(),
        user_email: "a@b.com".into(),
        ..Default::default()
    }
}

/// Readiness polling in milliseconds instead of seconds.
#[allow(dead_code)]
pub fn fast_settings() -> WorkflowSettings {
    WorkflowSettings {
        readiness: ReadinessConfig {
            max_attempts: 3,
            delay: Duration::from_millis(5),
            call_timeout: Duration::from_millis(500),
            ..ReadinessConfig::default()
        },
        call_timeout: Duration::from_millis(500),
        ..WorkflowSettings::default()
    }
}

#[allow(dead_code)]
pub fn orchestrator(world: &FakeWorld) -> (Orchestrator, Arc<InMemoryJobStore>) {
    let store = Arc::new(InMemoryJobStore::new());
    let orch = Orchestrator::new(store.clone(), world.collaborators(), fast_settings());
    (orch, store)
}

#[allow(dead_code)]
pub async fn load(store: &dyn JobStore, job_id: &str) -> Job {
    store
        .get_job(job_id)
        .await
        .expect("store read")
        .expect("job exists")
}
