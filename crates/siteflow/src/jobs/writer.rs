use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::jobs::model::{JobUpdate, NewJob};
use crate::jobs::store::JobStore;

/// Job ids that currently have a running workflow in this process.
#[derive(Clone, Default)]
pub struct ActiveJobs {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ActiveJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims write ownership of `job_id`. `None` if another workflow owns it.
    pub fn claim(&self, job_id: &str) -> Option<JobLease> {
        let mut set = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(job_id.to_string()) {
            return None;
        }
        Some(JobLease {
            job_id: job_id.to_string(),
            active: self.clone(),
        })
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(job_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, job_id: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(job_id);
    }
}

/// Ownership token; released when dropped.
#[derive(Debug)]
pub struct JobLease {
    job_id: String,
    active: ActiveJobs,
}

impl JobLease {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.active.release(&self.job_id);
    }
}

impl std::fmt::Debug for ActiveJobs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveJobs").field("len", &self.len()).finish()
    }
}

/// The only handle that writes a given job record.
///
/// Store failures are logged and swallowed: job visibility never decides
/// the provisioning outcome.
pub struct JobWriter {
    store: Arc<dyn JobStore>,
    lease: JobLease,
}

impl JobWriter {
    pub fn new(store: Arc<dyn JobStore>, lease: JobLease) -> Self {
        Self { store, lease }
    }

    pub fn job_id(&self) -> &str {
        self.lease.job_id()
    }

    pub async fn create(&self, fields: NewJob) {
        if let Err(e) = self.store.create_job(self.job_id(), fields).await {
            tracing::warn!(job_id = %self.job_id(), error = %e, "job store create failed");
        }
    }

    pub async fn update(&self, update: JobUpdate) {
        if let Err(e) = self.store.update_job(self.job_id(), update).await {
            tracing::warn!(job_id = %self.job_id(), error = %e, "job store update failed");
        }
    }
}
