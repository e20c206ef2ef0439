//! Suno generation API client
//!
//! This module provides the one client that talks to the third-party
//! generation service: task submission and status queries. The API wraps
//! every reply in a `{code, msg, data}` envelope and signals failure through
//! the envelope code, usually under an HTTP 200.

use crate::config::SunoConfig;
use crate::error::{AppError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::types::*;

/// Suno API client
#[derive(Clone)]
pub struct SunoClient {
    config: SunoConfig,
    http_client: Client,
}

impl SunoClient {
    /// Create a new Suno client
    pub fn new(config: SunoConfig) -> Self {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    /// Get the configured API base URL
    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }

    /// Submit a generation task and return the remote task id.
    ///
    /// The request is validated before any network call; a request that
    /// fails validation never leaves the process.
    pub async fn create_task(&self, request: &GenerateTaskRequest) -> Result<String> {
        request.validate().map_err(AppError::from)?;
        request.validate_mode_fields()?;

        let url = format!("{}/generate", self.config.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                AppError::RemoteUnavailable(format!("Failed to submit generation task: {}", e))
            })?;

        let envelope: SunoEnvelope<CreatedTask> = decode_envelope(response).await?;

        if envelope.code != SUNO_SUCCESS_CODE {
            return Err(AppError::RemoteService(format!(
                "{} - {}",
                envelope.code, envelope.msg
            )));
        }

        envelope
            .data
            .map(|d| d.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::RemoteService("Task accepted without a task id".to_string())
            })
    }

    /// Fetch the remote service's current view of one task
    pub async fn query_task(&self, remote_task_id: &str) -> Result<RemoteTaskSnapshot> {
        let url = format!("{}/generate/record-info", self.config.api_base_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(&[("taskId", remote_task_id)])
            .send()
            .await
            .map_err(|e| {
                AppError::RemoteUnavailable(format!("Failed to query task status: {}", e))
            })?;

        let envelope: SunoEnvelope<TaskStatusData> = decode_envelope(response).await?;

        match envelope.code {
            SUNO_SUCCESS_CODE => Ok(RemoteTaskSnapshot::from_status(
                remote_task_id,
                envelope.data.unwrap_or_default(),
            )),
            404 => Err(AppError::NotFound(format!(
                "Remote task {} not found",
                remote_task_id
            ))),
            code => Err(AppError::RemoteService(format!("{} - {}", code, envelope.msg))),
        }
    }
}

/// Decode a reply into its envelope. The API reports failures inside an
/// HTTP 200, but proxies in front of it can still answer with bare HTTP
/// errors and non-JSON bodies.
async fn decode_envelope<T: DeserializeOwned + Default>(
    response: reqwest::Response,
) -> Result<SunoEnvelope<T>> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::RemoteUnavailable(format!("Failed to read response body: {}", e)))?;

    match serde_json::from_str(&body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => {
            Err(AppError::RemoteUnavailable(format!("{} - {}", status, body)))
        }
        Err(e) => Err(AppError::RemoteUnavailable(format!(
            "Failed to parse response: {}",
            e
        ))),
    }
}
