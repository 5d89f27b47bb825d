// crates/siteflow/src/jobs/repo.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;

use crate::error::JobStoreError;
use crate::jobs::model::{Job, JobUpdate, NewJob};
use crate::jobs::store::{job_key, JobStore, DEFAULT_JOB_TTL};

/// Postgres-backed job store.
///
/// Rows live in `provision_jobs`, keyed `job:<jobId>`, with the job serialized
/// as JSONB. `expires_at` is pushed forward on every write; reads ignore expired
/// rows and [`JobStore::purge_expired`] deletes them.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_ttl(pool, DEFAULT_JOB_TTL)
    }

    pub fn with_ttl(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Builds the store over a pool that connects on first use.
    pub fn connect_lazy(database_url: &str, ttl: Duration) -> anyhow::Result<Self> {
        let pool = crate::db::make_lazy_pool(database_url)?;
        Ok(Self::with_ttl(pool, ttl))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn ttl_secs(&self) -> i64 {
        self.ttl.as_secs().max(1) as i64
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn connect(&self) -> Result<(), JobStoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn disconnect(&self) {
        self.pool.close().await;
    }

    async fn ping(&self) -> bool {
        if self.pool.is_closed() {
            return false;
        }
        matches!(
            tokio::time::timeout(
                Duration::from_secs(2),
                sqlx::query("SELECT 1").execute(&self.pool),
            )
            .await,
            Ok(Ok(_))
        )
    }

    async fn create_job(&self, job_id: &str, fields: NewJob) -> Result<Job, JobStoreError> {
        let job = Job::new(job_id, fields, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO provision_jobs (key, job_json, started_at, updated_at, expires_at)
            VALUES ($1, $2, $3, now(), now() + ($4::bigint * interval '1 second'))
            ON CONFLICT (key) DO UPDATE
            SET job_json   = EXCLUDED.job_json,
                started_at = EXCLUDED.started_at,
                updated_at = EXCLUDED.updated_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(job_key(job_id))
        .bind(Json(&job))
        .bind(job.started_at)
        .bind(self.ttl_secs())
        .execute(&self.pool)
        .await?;

        Ok(job)
    }

    async fn update_job(&self, job_id: &str, update: JobUpdate) -> Result<Job, JobStoreError> {
        let key = job_key(job_id);
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent writers for the same key.
        let current = sqlx::query_scalar::<_, Json<Job>>(
            r#"
            SELECT job_json
            FROM provision_jobs
            WHERE key = $1 AND expires_at > now()
            FOR UPDATE
            "#,
        )
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(Json(mut job)) = current else {
            tx.commit().await?;
            return Err(JobStoreError::NotFound(job_id.to_string()));
        };

        job.apply(update, Utc::now());

        sqlx::query(
            r#"
            UPDATE provision_jobs
            SET job_json = $2,
                updated_at = now(),
                expires_at = now() + ($3::bigint * interval '1 second')
            WHERE key = $1
            "#,
        )
        .bind(&key)
        .bind(Json(&job))
        .bind(self.ttl_secs())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(job)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, JobStoreError> {
        let job = sqlx::query_scalar::<_, Json<Job>>(
            "SELECT job_json FROM provision_jobs WHERE key = $1 AND expires_at > now()",
        )
        .bind(job_key(job_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(job.map(|Json(j)| j))
    }

    async fn get_all_jobs(&self) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query_scalar::<_, Json<Job>>(
            r#"
            SELECT job_json
            FROM provision_jobs
            WHERE expires_at > now()
            ORDER BY started_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|Json(j)| j).collect())
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), JobStoreError> {
        sqlx::query("DELETE FROM provision_jobs WHERE key = $1")
            .bind(job_key(job_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, JobStoreError> {
        let deleted = sqlx::query("DELETE FROM provision_jobs WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }
}
