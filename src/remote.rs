//! External service boundaries.
//!
//! Both boundaries are opaque request/response calls. They sit behind
//! object-safe traits so the coordinator and export pipeline can be driven
//! by in-process fakes in tests.

use crate::error::AnalysisError;
use crate::model::{AnalysisConfig, AnalysisResult, Dataset};
use async_trait::async_trait;
use base64::Engine as _;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The statistical computation service.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// Run one analysis. The response payload is returned as raw JSON;
    /// schema validation happens at the coordinator.
    async fn analyze(
        &self,
        kind: &str,
        config: &AnalysisConfig,
        dataset: &Dataset,
    ) -> Result<serde_json::Value, AnalysisError>;
}

/// The document-rendering service.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render a result (plus the rasterized chart, when available) into a
    /// binary document.
    async fn render(
        &self,
        result: &AnalysisResult,
        image_png: Option<&[u8]>,
    ) -> Result<Vec<u8>, AnalysisError>;
}

/// Extract the upstream error description from a non-2xx body, falling back
/// to the raw body or the bare status.
fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        format!("service returned {status}")
    } else {
        format!("service returned {status}: {detail}")
    }
}

/// HTTP client for the computation boundary.
pub struct HttpComputeBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpComputeBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ComputeBackend for HttpComputeBackend {
    async fn analyze(
        &self,
        kind: &str,
        config: &AnalysisConfig,
        dataset: &Dataset,
    ) -> Result<serde_json::Value, AnalysisError> {
        let url = format!("{}/analyses/{kind}", self.base_url.trim_end_matches('/'));
        let body = json!({
            "config": config,
            "columns": dataset.column_map(),
        });
        tracing::debug!(%url, "submitting analysis request");
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::network(describe_failure(status, &body)));
        }
        let text = resp.text().await?;
        // A 2xx with an unparseable body is a shape problem, not a network one.
        let payload = serde_json::from_str(&text)?;
        Ok(payload)
    }
}

/// HTTP client for the document boundary.
pub struct HttpDocumentRenderer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentRenderer {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl DocumentRenderer for HttpDocumentRenderer {
    async fn render(
        &self,
        result: &AnalysisResult,
        image_png: Option<&[u8]>,
    ) -> Result<Vec<u8>, AnalysisError> {
        let url = format!("{}/render", self.base_url.trim_end_matches('/'));
        let body = json!({
            "analysis": result.analysis,
            "result": result.payload,
            "config": result.config,
            "image_png_base64": image_png
                .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes)),
        });
        tracing::debug!(%url, "submitting document render request");
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::network(describe_failure(status, &body)));
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(AnalysisError::schema("document service returned an empty body"));
        }
        Ok(bytes.to_vec())
    }
}
