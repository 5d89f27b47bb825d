use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::Job;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub success: bool,
    pub job_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub success: bool,
    pub count: usize,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
    pub active_jobs: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DomainCheckRequest {
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCheckResponse {
    pub success: bool,
    pub domain: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}
