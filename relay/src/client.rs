//! HTTP client for the local inference backend (`/api/tags`, `/api/pull`,
//! `/api/generate`).

use std::time::Duration;

use bytes::Bytes;
use common::config::AppConfig;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::ndjson::split_lines;

/// Lines of a streaming generation, one JSON object per item.
pub type LineStream = BoxStream<'static, Result<Bytes, BackendError>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BackendStatus {
    fn up() -> Self {
        BackendStatus {
            available: true,
            detail: None,
        }
    }

    fn down(detail: impl Into<String>) -> Self {
        BackendStatus {
            available: false,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
    status_timeout: Duration,
    warmup_prompt: String,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(BackendClient {
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            http,
            status_timeout: config.status_timeout(),
            warmup_prompt: config.warmup_prompt.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Lightweight existence check. Never fails: every problem becomes
    /// `available = false` with a readable detail.
    pub async fn check_status(&self) -> BackendStatus {
        match self
            .http
            .get(self.url("/api/tags"))
            .timeout(self.status_timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => BackendStatus::up(),
            Ok(resp) => BackendStatus::down(format!("Backend returned {}", resp.status())),
            Err(e) if e.is_timeout() => BackendStatus::down(format!(
                "Backend at {} did not answer within {}s",
                self.base_url,
                self.status_timeout.as_secs()
            )),
            Err(e) if e.is_connect() => {
                BackendStatus::down(format!("Cannot connect to backend at {}", self.base_url))
            }
            Err(e) => BackendStatus::down(format!("Backend request failed: {}", e)),
        }
    }

    /// Names of the models the backend has locally.
    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let resp = self.http.get(self.url("/api/tags")).send().await?;
        let body = success_body(resp).await?;
        let tags: TagsResponse = serde_json::from_slice(&body)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Download a model; returns once the backend reports the pull finished.
    pub async fn pull_model(&self, name: &str) -> Result<(), BackendError> {
        let body = serde_json::to_vec(&PullRequest {
            name,
            stream: false,
        })?;
        let resp = self
            .http
            .post(self.url("/api/pull"))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        success_body(resp).await?;
        Ok(())
    }

    /// Single, non-streaming generation.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: Option<&serde_json::Value>,
    ) -> Result<String, BackendError> {
        let resp = self.post_generate(model, prompt, false, options).await?;
        let body = success_body(resp).await?;
        let parsed: GenerateResponse = serde_json::from_slice(&body)?;
        Ok(parsed.response)
    }

    /// Make sure `name` is downloaded and loaded into memory. Pulls the model
    /// when the backend does not list it, then runs one throwaway generation.
    /// May take minutes on first use.
    pub async fn ensure_model_ready(&self, name: &str) -> Result<(), BackendError> {
        let models = self.list_models().await.map_err(init_error)?;
        if !models.iter().any(|m| model_matches(m, name)) {
            log::info!("Model {} not present on backend, pulling", name);
            self.pull_model(name).await.map_err(init_error)?;
            log::info!("Model {} pulled", name);
        }

        self.generate(name, &self.warmup_prompt, None)
            .await
            .map_err(init_error)?;
        log::info!("Model {} warmed up", name);
        Ok(())
    }

    /// Open a streaming generation. The returned lines are forward-only and
    /// cannot be restarted; a retry needs a new call.
    pub async fn stream_generate(
        &self,
        model: &str,
        prompt: &str,
        options: Option<&serde_json::Value>,
    ) -> Result<LineStream, BackendError> {
        let resp = self.post_generate(model, prompt, true, options).await?;
        let resp = check_status(resp).await?;
        let chunks = resp.bytes_stream().map_err(BackendError::from).boxed();
        Ok(split_lines(chunks).boxed())
    }

    async fn post_generate(
        &self,
        model: &str,
        prompt: &str,
        stream: bool,
        options: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, BackendError> {
        let body = serde_json::to_vec(&GenerateRequest {
            model,
            prompt,
            stream,
            options,
        })?;
        Ok(self
            .http
            .post(self.url("/api/generate"))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?)
    }
}

/// The backend lists untagged models as `name:latest`.
fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || (!wanted.contains(':') && listed == format!("{}:latest", wanted))
}

fn init_error(e: BackendError) -> BackendError {
    match e {
        BackendError::Init(_) => e,
        BackendError::Status { body, .. } => BackendError::Init(backend_message(&body)),
        other => BackendError::Init(other.to_string()),
    }
}

/// Pull the human-readable message out of a `{"error": "..."}` body.
fn backend_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: backend_message(&body),
    })
}

async fn success_body(resp: reqwest::Response) -> Result<Bytes, BackendError> {
    let resp = check_status(resp).await?;
    Ok(resp.bytes().await?)
}
