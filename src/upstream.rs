//! Client for the form generation workflow
//!
//! The workflow takes a natural language prompt and answers, in blocking
//! mode, with an envelope that [`crate::adapter`] knows how to unwrap.

use async_trait::async_trait;
use serde_json::json;

use crate::error::AppError;
use crate::model::generate_id;

/// Something that turns a prompt into a raw generation reply
#[async_trait]
pub trait FormGenerator: Send + Sync {
    /// Sends `prompt` upstream and returns the reply body untouched
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

/// [`FormGenerator`] backed by the workflow HTTP API
pub struct WorkflowClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl WorkflowClient {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl FormGenerator for WorkflowClient {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("WORKFLOW_API_KEY is not set".to_string()))?;

        let preview: String = prompt.chars().take(100).collect();
        tracing::info!(prompt = %preview, "calling generation workflow");

        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&json!({
                "inputs": { "prompt": prompt },
                "response_mode": "blocking",
                "user": generate_id("user_", 8),
            }))
            .send()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "generation workflow unreachable"))?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %body, "generation workflow failed");
            return Err(AppError::UpstreamUnavailable {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(bytes = body.len(), "generation workflow replied");
        Ok(body)
    }
}
