use std::time::Duration;

use reqwest::StatusCode;

use crate::error::ClientError;
use crate::gateway::http::ErrorResponse;
use crate::gateway::{JobStatus, SubmitReceipt};
use crate::job::JobRequest;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for an ingestion gateway, used by `job` commands and the load generator.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn submit(&self, request: &JobRequest) -> Result<SubmitReceipt, ClientError> {
        let response = self
            .client
            .post(format!("{}/jobs", self.base_url))
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<SubmitReceipt>().await?)
        } else {
            Err(rejected(response).await)
        }
    }

    /// `Ok(None)` when this gateway instance does not know the id.
    pub async fn status(&self, job_id: &str) -> Result<Option<JobStatus>, ClientError> {
        let response = self
            .client
            .get(format!("{}/jobs/{}", self.base_url, job_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<JobStatus>().await?)),
            _ => Err(rejected(response).await),
        }
    }
}

async fn rejected(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let error = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    ClientError::Rejected {
        status: status.as_u16(),
        error,
    }
}
