use std::time::Duration;

use siteflow::jobs::{
    InMemoryJobStore, JobStatus, JobStep, JobStore, JobUpdate, NewJob, StepStatus,
};

fn new_job(name: &str) -> NewJob {
    NewJob {
        website_name: name.into(),
        message: None,
        steps: JobStep::all_pending(),
    }
}

#[tokio::test]
async fn created_job_reads_back_pending() {
    let store = InMemoryJobStore::new();
    store.create_job("acme_1", new_job("acme")).await.unwrap();

    let job = store.get_job("acme_1").await.unwrap().expect("job");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.website_name, "acme");
    assert!(job.completed_at.is_none());
    assert_eq!(job.steps.len(), 6);
    assert!(job.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn missing_job_is_none_not_error() {
    let store = InMemoryJobStore::new();
    assert!(store.get_job("nope_1").await.unwrap().is_none());
}

#[tokio::test]
async fn update_of_missing_job_is_not_found() {
    let store = InMemoryJobStore::new();
    let err = store
        .update_job("nope_1", JobUpdate::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn completed_at_is_set_once_and_kept() {
    let store = InMemoryJobStore::new();
    store.create_job("acme_1", new_job("acme")).await.unwrap();

    let failed = store
        .update_job(
            "acme_1",
            JobUpdate {
                status: Some(JobStatus::Failed),
                error: Some("boom".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let stamped = failed.completed_at.expect("completed_at on failure");

    tokio::time::sleep(Duration::from_millis(5)).await;
    let later = store
        .update_job(
            "acme_1",
            JobUpdate {
                message: Some("late write".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(later.completed_at, Some(stamped));
    assert_eq!(later.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn create_overwrites_existing_record() {
    let store = InMemoryJobStore::new();
    store.create_job("acme_1", new_job("acme")).await.unwrap();
    store
        .update_job(
            "acme_1",
            JobUpdate {
                status: Some(JobStatus::Processing),
                progress: Some(40),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    store.create_job("acme_1", new_job("acme")).await.unwrap();
    let job = store.get_job("acme_1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0);
}

#[tokio::test]
async fn list_is_newest_first() {
    let store = InMemoryJobStore::new();
    store.create_job("a_1", new_job("a")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    store.create_job("b_2", new_job("b")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    store.create_job("c_3", new_job("c")).await.unwrap();

    let ids: Vec<_> = store
        .get_all_jobs()
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.job_id)
        .collect();
    assert_eq!(ids, vec!["c_3", "b_2", "a_1"]);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = InMemoryJobStore::new();
    store.create_job("acme_1", new_job("acme")).await.unwrap();

    store.delete_job("acme_1").await.unwrap();
    store.delete_job("acme_1").await.unwrap();
    assert!(store.get_job("acme_1").await.unwrap().is_none());
}

#[tokio::test]
async fn expired_job_looks_like_not_found() {
    let store = InMemoryJobStore::with_ttl(Duration::from_millis(20));
    store.create_job("acme_1", new_job("acme")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert!(store.get_job("acme_1").await.unwrap().is_none());
    assert!(store.get_all_jobs().await.unwrap().is_empty());
    assert!(store
        .update_job("acme_1", JobUpdate::default())
        .await
        .is_err());
}

#[tokio::test]
async fn writes_refresh_the_ttl() {
    let store = InMemoryJobStore::with_ttl(Duration::from_millis(200));
    store.create_job("acme_1", new_job("acme")).await.unwrap();

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(120)).await;
        store
            .update_job(
                "acme_1",
                JobUpdate {
                    message: Some("still going".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    assert!(store.get_job("acme_1").await.unwrap().is_some());
}

#[tokio::test]
async fn purge_removes_only_expired() {
    let store = InMemoryJobStore::with_ttl(Duration::from_millis(20));
    store.create_job("old_1", new_job("old")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    store.create_job("new_2", new_job("new")).await.unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert_eq!(store.get_all_jobs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_connects_lazily() {
    let store = InMemoryJobStore::new();
    assert!(!store.ping().await);

    store.get_job("any_1").await.unwrap();
    assert!(store.ping().await);

    store.disconnect().await;
    assert!(!store.ping().await);
}
