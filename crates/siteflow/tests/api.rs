mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::fast_settings;
use siteflow::api::{self, ApiState, API_KEY_HEADER};
use siteflow::domain::DomainService;
use siteflow::jobs::{InMemoryJobStore, JobStore};
use siteflow::testing::FakeWorld;
use siteflow::workflow::Orchestrator;

const SECRET: &str = "test-secret";

fn app(world: &FakeWorld) -> (Router, Arc<InMemoryJobStore>) {
    let store = Arc::new(InMemoryJobStore::new());
    let orchestrator = Orchestrator::new(store.clone(), world.collaborators(), fast_settings());
    let domains = DomainService::new(
        world.registrar.clone(),
        world.platform.clone(),
        Duration::from_millis(500),
    );
    let router = api::router(ApiState {
        orchestrator,
        domains,
        api_secret: Arc::from(SECRET),
    });
    (router, store)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(API_KEY_HEADER, SECRET);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(req.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn start_then_poll_until_completed() {
    let world = FakeWorld::new();
    // Slow platform calls keep the job visibly in flight between polls.
    world.platform.set_latency(Duration::from_millis(20));
    let (app, _store) = app(&world);

    let (status, body) = send(
        &app,
        Method::POST,
        "/process-website-creation",
        Some(json!({
            "websiteName": "acme",
            "domainName": "acme-homes.com",
            "userEmail": "a@b.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let job_id = body["jobId"].as_str().unwrap().to_string();
    let (name, ts) = job_id.split_once('_').unwrap();
    assert_eq!(name, "acme");
    assert!(ts.parse::<i64>().is_ok());

    let mut last_progress = 0;
    let mut seen = Vec::new();
    let mut final_job = Value::Null;
    for _ in 0..200 {
        let (status, job) = send(&app, Method::GET, &format!("/job-status/{job_id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let progress = job["progress"].as_u64().unwrap();
        assert!(progress >= last_progress, "progress went backwards");
        last_progress = progress;

        let state = job["status"].as_str().unwrap().to_string();
        if seen.last() != Some(&state) {
            seen.push(state.clone());
        }
        if state == "completed" || state == "failed" {
            final_job = job;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(final_job["status"], "completed");
    assert_eq!(final_job["progress"], 100);
    assert_eq!(final_job["result"]["websiteUrl"], "https://acme-homes.com");
    assert!(final_job["completedAt"].is_string());
    assert!(seen.iter().any(|s| s == "processing"), "statuses seen: {seen:?}");
    assert_eq!(seen.last().map(String::as_str), Some("completed"));
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
    let world = FakeWorld::new();
    let (app, _store) = app(&world);

    let response = app
        .clone()
        .oneshot(Request::get("/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::get("/jobs")
                .header(API_KEY_HEADER, "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_needs_no_key() {
    let world = FakeWorld::new();
    let (app, _store) = app(&world);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["storeConnected"].is_boolean());
}

#[tokio::test]
async fn invalid_input_is_400_and_creates_nothing() {
    let world = FakeWorld::new();
    let (app, store) = app(&world);

    let (status, body) = send(
        &app,
        Method::POST,
        "/process-website-creation",
        Some(json!({ "websiteName": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("domainName"));
    assert!(store.get_all_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_job_is_404() {
    let world = FakeWorld::new();
    let (app, _store) = app(&world);

    let (status, body) = send(&app, Method::GET, "/job-status/ghost_1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn list_and_delete_jobs() {
    let world = FakeWorld::new();
    let (app, store) = app(&world);
    store
        .create_job("acme_1", siteflow::jobs::NewJob {
            website_name: "acme".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let (status, body) = send(&app, Method::GET, "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["jobs"][0]["jobId"], "acme_1");

    for _ in 0..2 {
        let (status, body) = send(&app, Method::DELETE, "/job/acme_1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    let (status, _) = send(&app, Method::GET, "/job-status/acme_1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn domain_endpoints_map_errors() {
    let world = FakeWorld::new();
    let (app, _store) = app(&world);

    let (status, body) = send(
        &app,
        Method::POST,
        "/domain/check",
        Some(json!({ "domain": "acme-homes.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);

    let (status, _) = send(&app, Method::POST, "/domain/check", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    world.registrar.set_available(false);
    let (status, body) = send(
        &app,
        Method::POST,
        "/domain/purchase",
        Some(json!({
            "domain": "acme-homes.com",
            "userId": "u1",
            "siteId": "rec_1",
            "websiteUrl": "https://acme.vercel.app",
            "userInfo": { "firstName": "Ada", "lastName": "Lovelace", "email": "a@b.com" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("no longer available"));
}
