//! Response handling shared by the HTTP collaborator clients.

use std::time::Duration;

use super::ClientError;

pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("siteflow/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Returns the response unchanged on 2xx, otherwise an [`ClientError::Api`]
/// carrying the status and raw body.
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ClientError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

pub async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

pub async fn check_status(response: reqwest::Response) -> Result<(), ClientError> {
    ensure_success(response).await?;
    Ok(())
}
