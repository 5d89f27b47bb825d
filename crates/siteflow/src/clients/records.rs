use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::http::{build_client, check_status, parse_response};
use super::{ClientError, FieldUpdates, SiteRecordStore};

/// Document-store gateway holding one record per website.
pub struct HttpSiteRecordStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
}

impl HttpSiteRecordStore {
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl SiteRecordStore for HttpSiteRecordStore {
    async fn create_record(&self, fields: FieldUpdates) -> Result<String, ClientError> {
        let response = self
            .client
            .post(format!("{}/websites", self.base_url))
            .bearer_auth(&self.token)
            .json(&Value::Object(fields))
            .send()
            .await?;

        let created: CreatedRecord = parse_response(response).await?;
        Ok(created.id)
    }

    async fn update_fields(
        &self,
        record_id: &str,
        fields: FieldUpdates,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .patch(format!("{}/websites/{}", self.base_url, record_id))
            .bearer_auth(&self.token)
            .json(&json!({ "updates": fields }))
            .send()
            .await?;

        check_status(response).await
    }
}
