use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;

use crate::domain::{DomainService, PurchaseOutcome, PurchaseRequest};
use crate::error::ProvisionError;
use crate::jobs::Job;
use crate::workflow::{Orchestrator, WorkflowInput};

pub mod models;

use models::{
    DeleteResponse, DomainCheckRequest, DomainCheckResponse, ErrorBody, HealthResponse,
    JobListResponse, StartResponse,
};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Orchestrator,
    pub domains: DomainService,
    pub api_secret: Arc<str>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(state: ApiState) -> Router {
    let protected = Router::new()
        // Provisioning
        .route("/process-website-creation", post(start_workflow))
        .route("/job-status/:job_id", get(job_status))
        .route("/jobs", get(list_jobs))
        .route("/job/:job_id", delete(delete_job))
        // Domain sub-flow
        .route("/domain/check", post(check_domain))
        .route("/domain/purchase", post(purchase_domain))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn require_api_key(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if key == &*state.api_secret => next.run(req).await,
        _ => {
            tracing::debug!(path = %req.uri().path(), "rejected request without valid api key");
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody::new("missing or invalid api key")),
            )
                .into_response()
        }
    }
}

fn status_for(err: &ProvisionError) -> StatusCode {
    match err {
        ProvisionError::Validation(_) => StatusCode::BAD_REQUEST,
        ProvisionError::DomainUnavailable(_) => StatusCode::CONFLICT,
        ProvisionError::Collaborator { .. }
        | ProvisionError::RegistrationFailed(_)
        | ProvisionError::RepositoryNotReady { .. } => StatusCode::BAD_GATEWAY,
        ProvisionError::JobStore(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn api_err(err: ProvisionError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::warn!(code = err.code(), error = %err, "request failed");
    }
    (status, Json(ErrorBody::new(err.user_message())))
}

fn store_err(e: crate::error::JobStoreError) -> ApiError {
    api_err(e.into())
}

pub async fn start_workflow(
    State(state): State<ApiState>,
    Json(input): Json<WorkflowInput>,
) -> Result<Json<StartResponse>, ApiError> {
    let started = state.orchestrator.start(input).await.map_err(api_err)?;

    // The caller polls /job-status; the outcome is never awaited here.
    drop(started.handle);

    Ok(Json(StartResponse {
        success: true,
        job_id: started.job_id,
        message: "Website creation started".to_string(),
    }))
}

pub async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    match state.orchestrator.store().get_job(&job_id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(format!("job {job_id} not found"))),
        )),
        Err(e) => Err(store_err(e)),
    }
}

pub async fn list_jobs(State(state): State<ApiState>) -> Result<Json<JobListResponse>, ApiError> {
    let jobs = state
        .orchestrator
        .store()
        .get_all_jobs()
        .await
        .map_err(store_err)?;

    Ok(Json(JobListResponse {
        success: true,
        count: jobs.len(),
        jobs,
    }))
}

pub async fn delete_job(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state
        .orchestrator
        .store()
        .delete_job(&job_id)
        .await
        .map_err(store_err)?;

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("job {job_id} deleted"),
    }))
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let store_connected = state.orchestrator.store().ping().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        store_connected,
        active_jobs: state.orchestrator.active_jobs().len(),
        timestamp: Utc::now(),
    })
}

pub async fn check_domain(
    State(state): State<ApiState>,
    Json(body): Json<DomainCheckRequest>,
) -> Result<Json<DomainCheckResponse>, ApiError> {
    let availability = state.domains.check(&body.domain).await.map_err(api_err)?;
    Ok(Json(DomainCheckResponse {
        success: true,
        domain: availability.domain,
        available: availability.available,
        premium: availability.premium,
        price: availability.price,
    }))
}

pub async fn purchase_domain(
    State(state): State<ApiState>,
    Json(body): Json<PurchaseRequest>,
) -> Result<Json<PurchaseOutcome>, ApiError> {
    let outcome = state.domains.purchase(body).await.map_err(api_err)?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;

    #[test]
    fn errors_map_to_http_statuses() {
        assert_eq!(
            status_for(&ProvisionError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ProvisionError::DomainUnavailable("acme.com".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ProvisionError::collaborator(
                "register domain",
                ClientError::Rejected("nope".into())
            )),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ProvisionError::JobStore("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
