use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::http::{build_client, check_status, parse_response};
use super::{
    ClientError, DnsRecord, DomainAvailability, DomainRegistrar, RegistrantInfo, Registration,
};

/// JSON registrar API client (availability, registration, host records).
pub struct HttpDomainRegistrar {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityResponse {
    available: bool,
    #[serde(default)]
    premium: Option<bool>,
    #[serde(default)]
    price: Option<f64>,
}

impl HttpDomainRegistrar {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl DomainRegistrar for HttpDomainRegistrar {
    async fn check_availability(&self, domain: &str) -> Result<DomainAvailability, ClientError> {
        let response = self
            .client
            .get(format!("{}/domains/check", self.base_url))
            .query(&[("domain", domain)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let parsed: AvailabilityResponse = parse_response(response).await?;
        Ok(DomainAvailability {
            domain: domain.to_string(),
            available: parsed.available,
            premium: parsed.premium,
            price: parsed.price,
        })
    }

    async fn register(
        &self,
        domain: &str,
        years: u32,
        registrant: &RegistrantInfo,
    ) -> Result<Registration, ClientError> {
        let response = self
            .client
            .post(format!("{}/domains/register", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "domain": domain,
                "years": years,
                "registrant": registrant,
            }))
            .send()
            .await?;

        // The registrar answers 4xx with a reason for refusals; keep those as data.
        match parse_response::<Registration>(response).await {
            Ok(reg) => Ok(reg),
            Err(ClientError::Api { status, body }) if (400..500).contains(&status) => {
                Ok(Registration {
                    success: false,
                    order_id: None,
                    reason: Some(body),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn set_dns_records(&self, domain: &str, records: &[DnsRecord]) -> Result<(), ClientError> {
        let response = self
            .client
            .put(format!("{}/domains/{}/dns", self.base_url, domain))
            .bearer_auth(&self.api_key)
            .json(&json!({ "records": records }))
            .send()
            .await?;

        check_status(response).await
    }
}
