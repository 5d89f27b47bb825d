use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::JobStoreError;
use crate::jobs::model::{Job, JobUpdate, NewJob};

pub const DEFAULT_JOB_TTL: Duration = Duration::from_secs(3600);

/// Storage key for a job record.
pub fn job_key(job_id: &str) -> String {
    format!("job:{job_id}")
}

/// TTL-bounded record of job progress.
///
/// Every write refreshes the TTL. An expired record behaves exactly like a
/// missing one. Implementations connect lazily on first use; `connect` and
/// `disconnect` exist so the owner controls the lifecycle explicitly.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn connect(&self) -> Result<(), JobStoreError>;

    async fn disconnect(&self);

    /// Connectivity probe for health reporting.
    async fn ping(&self) -> bool;

    /// Writes a fresh pending record, replacing any existing one.
    async fn create_job(&self, job_id: &str, fields: NewJob) -> Result<Job, JobStoreError>;

    async fn update_job(&self, job_id: &str, update: JobUpdate) -> Result<Job, JobStoreError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, JobStoreError>;

    /// Live records, newest `started_at` first.
    async fn get_all_jobs(&self) -> Result<Vec<Job>, JobStoreError>;

    async fn delete_job(&self, job_id: &str) -> Result<(), JobStoreError>;

    /// Drops expired records; returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, JobStoreError>;
}

struct Entry {
    job: Job,
    expires_at: Instant,
}

/// Process-local store. Used by tests and when no database is configured.
#[derive(Clone)]
pub struct InMemoryJobStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    connected: Arc<AtomicBool>,
    ttl: Duration,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_JOB_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            ttl,
        }
    }

    fn touch(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn connect(&self) -> Result<(), JobStoreError> {
        self.touch();
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn ping(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn create_job(&self, job_id: &str, fields: NewJob) -> Result<Job, JobStoreError> {
        self.touch();
        let job = Job::new(job_id, fields, Utc::now());
        let mut entries = self.entries.write().await;
        entries.insert(
            job_key(job_id),
            Entry {
                job: job.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(job)
    }

    async fn update_job(&self, job_id: &str, update: JobUpdate) -> Result<Job, JobStoreError> {
        self.touch();
        let key = job_key(job_id);
        let mut entries = self.entries.write().await;

        let live = entries
            .get(&key)
            .map(|e| e.expires_at > Instant::now())
            .unwrap_or(false);
        if !live {
            entries.remove(&key);
            return Err(JobStoreError::NotFound(job_id.to_string()));
        }

        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))?;
        entry.job.apply(update, Utc::now());
        entry.expires_at = Instant::now() + self.ttl;
        Ok(entry.job.clone())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, JobStoreError> {
        self.touch();
        let entries = self.entries.read().await;
        Ok(entries
            .get(&job_key(job_id))
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.job.clone()))
    }

    async fn get_all_jobs(&self) -> Result<Vec<Job>, JobStoreError> {
        self.touch();
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut jobs: Vec<Job> = entries
            .values()
            .filter(|e| e.expires_at > now)
            .map(|e| e.job.clone())
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(jobs)
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), JobStoreError> {
        self.touch();
        self.entries.write().await.remove(&job_key(job_id));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, JobStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}
