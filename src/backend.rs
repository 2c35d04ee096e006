//! HTTP client for the upstream OpenAI-compatible backend.
//!
//! Covers the three calls the router makes: model listing (registry
//! refresh), one-shot completions (classifier escalation and non-streaming
//! proxying), and streaming completions relayed byte-for-byte.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::ConnectionConfig;
use crate::error::BackendError;

/// Model listing requests time out quickly; a refresh must not stall
/// request handling.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);
/// Non-streaming proxy calls allow a full generation.
const PROXY_TIMEOUT: Duration = Duration::from_secs(120);
/// Streaming calls use the same bound for the whole stream lifetime.
const STREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Lists model ids available on a backend.
///
/// Split out from [`BackendClient`] so the registry refresh can be tested
/// against a canned list.
#[async_trait]
pub trait ModelListFetcher: Send + Sync {
    async fn fetch_model_ids(&self) -> Result<Vec<String>, BackendError>;
}

/// Client for one OpenAI-compatible upstream.
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// Base URL including the `/v1` prefix.
    base_url: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl BackendClient {
    pub fn new(connection: &ConnectionConfig) -> Self {
        Self {
            base_url: connection.base_url.trim_end_matches('/').to_string(),
            api_key: connection.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key.expose_secret()),
            None => req,
        }
    }

    /// POST a chat completion and return the parsed response body.
    ///
    /// Used by the classifier escalation (15s bound) and the non-streaming
    /// proxy path (120s bound). Error statuses are preserved with their
    /// bodies so callers can relay them.
    pub async fn chat_completion(
        &self,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .authed(self.client.post(&url).timeout(timeout).json(body))
            .send()
            .await
            .map_err(BackendError::request)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    /// Forward a non-streaming chat completion.
    pub async fn proxy_completion(
        &self,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        self.chat_completion(body, PROXY_TIMEOUT).await
    }

    /// Open a streaming chat completion. The returned response's byte
    /// stream is relayed to the caller unchanged; dropping it releases the
    /// upstream connection.
    pub async fn stream_completion(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .authed(self.client.post(&url).timeout(STREAM_TIMEOUT).json(body))
            .send()
            .await
            .map_err(BackendError::request)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp)
    }
}

#[async_trait]
impl ModelListFetcher for BackendClient {
    async fn fetch_model_ids(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/models", self.base_url);
        let resp = self
            .authed(self.client.get(&url).timeout(LIST_TIMEOUT))
            .send()
            .await
            .map_err(BackendError::request)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ModelsResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }
}
