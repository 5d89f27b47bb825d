use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::http::{build_client, parse_response};
use super::{AnalyticsIds, AnalyticsProvider, ClientError};

pub struct HttpAnalyticsProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpAnalyticsProvider {
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl AnalyticsProvider for HttpAnalyticsProvider {
    async fn create_property(
        &self,
        site_name: &str,
        site_url: &str,
    ) -> Result<AnalyticsIds, ClientError> {
        let response = self
            .client
            .post(format!("{}/properties", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({
                "displayName": site_name,
                "defaultUri": site_url,
            }))
            .send()
            .await?;

        parse_response(response).await
    }
}
