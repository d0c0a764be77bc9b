//! Multipart submission to the processing endpoints.
//!
//! The two endpoints disagree on both the upload field name and the success
//! body. [`HttpTransport::submit`] hides that: callers get a
//! [`NormalizedImageResult`] or a [`TransportError`] regardless of which
//! endpoint served the request.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{settings::Settings, source::SourceFile};

/// Media type tag for inline results.
pub const INLINE_MEDIA_TYPE: &str = "image/png";

/// Which remote contract an endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointKind {
    /// `{processed_url}` responses.
    RemoveBackground,
    /// `{imageBase64, session_id}` responses.
    Dewatermark,
}

/// Path and upload field for one processing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub kind: EndpointKind,
    pub path: String,
    pub field_name: String,
}

impl EndpointConfig {
    pub fn remove_background() -> Self {
        Self {
            kind: EndpointKind::RemoveBackground,
            path: "/api/remove-background".into(),
            field_name: "image_file".into(),
        }
    }

    pub fn dewatermark() -> Self {
        Self {
            kind: EndpointKind::Dewatermark,
            path: "/api/dewatermark".into(),
            field_name: "image".into(),
        }
    }
}

/// A successful result, whatever shape the endpoint returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedImageResult {
    /// Server-hosted image.
    RemoteReference { url: String },
    /// Image bytes carried in the response body.
    InlinePayload {
        media_type: String,
        data: Bytes,
        session_id: Option<String>,
    },
}

impl NormalizedImageResult {
    /// A URL a renderer can show directly.
    pub fn display_url(&self) -> String {
        match self {
            Self::RemoteReference { url } => url.clone(),
            Self::InlinePayload {
                media_type, data, ..
            } => format!("data:{};base64,{}", media_type, STANDARD.encode(data)),
        }
    }
}

/// Failure talking to a processing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Non-success status. `message` is what the error body said.
    #[error("HTTP {status}: {message}")]
    HttpError {
        status: u16,
        message: String,
        body: String,
    },

    /// The request never produced a response.
    #[error("{0}")]
    NetworkFailure(String),

    /// A success status with a body we could not use.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Submits a file to an endpoint. The seam the session depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(
        &self,
        file: &SourceFile,
        endpoint: &EndpointConfig,
    ) -> Result<NormalizedImageResult, TransportError>;
}

/// Backend health report from `GET /api/health`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct RemoveBackgroundResp {
    processed_url: String,
}

#[derive(Debug, Deserialize)]
struct DewatermarkResp {
    #[serde(rename = "imageBase64")]
    image_base64: String,
    #[serde(default)]
    session_id: Option<String>,
}

/// reqwest-backed transport. No timeout and no retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    settings: Settings,
}

impl HttpTransport {
    pub fn new(http: Client, settings: Settings) -> Self {
        Self { http, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Query the backend health endpoint.
    pub async fn health_check(&self) -> Result<HealthStatus, TransportError> {
        let url = self.settings.endpoint_url("/api/health");
        let resp = self.http.get(&url).send().await.map_err(network_failure)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network_failure)?;
        if !status.is_success() {
            return Err(http_error(status.as_u16(), body));
        }
        serde_json::from_str(&body).map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }

    /// Bytes of a result, fetching remote references.
    pub async fn download(&self, result: &NormalizedImageResult) -> Result<Bytes, TransportError> {
        match result {
            NormalizedImageResult::InlinePayload { data, .. } => Ok(data.clone()),
            NormalizedImageResult::RemoteReference { url } => {
                let resp = self.http.get(url).send().await.map_err(network_failure)?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(http_error(status.as_u16(), body));
                }
                resp.bytes().await.map_err(network_failure)
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(
        &self,
        file: &SourceFile,
        endpoint: &EndpointConfig,
    ) -> Result<NormalizedImageResult, TransportError> {
        let url = self.settings.endpoint_url(&endpoint.path);
        tracing::info!(
            %url,
            field = %endpoint.field_name,
            file = file.name(),
            size = file.size(),
            "submitting image"
        );

        let form = Form::new().part(endpoint.field_name.clone(), file_part(file));
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(network_failure)?;

        let status = resp.status();
        tracing::info!(status = status.as_u16(), "processing response");
        let body = resp.text().await.map_err(network_failure)?;

        if !status.is_success() {
            return Err(http_error(status.as_u16(), body));
        }
        normalize_response(endpoint.kind, &body, &self.settings)
    }
}

/// Turn a success body into the normalized result for its endpoint.
pub fn normalize_response(
    kind: EndpointKind,
    body: &str,
    settings: &Settings,
) -> Result<NormalizedImageResult, TransportError> {
    match kind {
        EndpointKind::RemoveBackground => {
            let resp: RemoveBackgroundResp = serde_json::from_str(body)
                .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
            Ok(NormalizedImageResult::RemoteReference {
                url: settings.resolve_result_url(&resp.processed_url),
            })
        }
        EndpointKind::Dewatermark => {
            let resp: DewatermarkResp = serde_json::from_str(body)
                .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
            let data = STANDARD
                .decode(resp.image_base64.trim())
                .map_err(|e| TransportError::MalformedResponse(format!("imageBase64: {e}")))?;
            Ok(NormalizedImageResult::InlinePayload {
                media_type: INLINE_MEDIA_TYPE.to_string(),
                data: Bytes::from(data),
                session_id: resp.session_id.filter(|s| !s.is_empty()),
            })
        }
    }
}

/// Best-effort message from a JSON error body.
pub fn error_message_from_body(body: &str) -> String {
    error_texts_from_body(body)
        .into_iter()
        .next()
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// Every non-empty `error`, `detail` and `message` field of a JSON error
/// body, in that order.
pub fn error_texts_from_body(body: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return vec![];
    };
    ["error", "detail", "message"]
        .iter()
        .filter_map(|key| match value.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::String(_) | serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .collect()
}

fn http_error(status: u16, body: String) -> TransportError {
    let message = error_message_from_body(&body);
    tracing::warn!(status, %message, "processing request failed");
    TransportError::HttpError {
        status,
        message,
        body,
    }
}

fn network_failure(e: reqwest::Error) -> TransportError {
    let message = if e.is_timeout() {
        format!("request timed out: {}", e.without_url())
    } else if e.is_connect() {
        format!("failed to connect: {}", e.without_url())
    } else {
        format!("network request failed: {}", e.without_url())
    };
    tracing::error!(%message, "transport failure");
    TransportError::NetworkFailure(message)
}

fn file_part(file: &SourceFile) -> Part {
    let part = || Part::bytes(file.bytes().to_vec()).file_name(file.name().to_string());
    match part().mime_str(file.media_type()) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(media_type = file.media_type(), "unparseable media type: {e}");
            part()
        }
    }
}
