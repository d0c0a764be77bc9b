//! Stateless relay between the browser-facing origin and the fixed backend.
//!
//! Every `POST /api/*` body is read in full and forwarded unmodified to the
//! same path on the upstream origin, keeping the original `Content-Type`
//! (boundary included). The upstream status and body come back verbatim
//! with permissive CORS headers. The relay sets no body limit and no
//! timeout of its own beyond the configured host budget.

use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, OriginalUri, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
        },
    },
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::RelayCfg;

/// Shared, read-only relay settings.
#[derive(Debug, Clone)]
pub struct RelayState {
    http: reqwest::Client,
    upstream: Arc<str>,
    max_duration: Duration,
}

impl RelayState {
    pub fn new(http: reqwest::Client, upstream: &str, max_duration: Duration) -> Self {
        Self {
            http,
            upstream: Arc::from(upstream.trim_end_matches('/')),
            max_duration,
        }
    }

    /// A zero budget would time out every forward, so it falls back to the default.
    pub fn from_config(cfg: &RelayCfg) -> Self {
        let secs = match cfg.max_duration_secs {
            0 => {
                let fallback = RelayCfg::default().max_duration_secs;
                tracing::warn!(fallback, "max_duration_secs = 0 ignored");
                fallback
            }
            secs => secs,
        };
        Self::new(
            reqwest::Client::new(),
            &cfg.upstream,
            Duration::from_secs(secs),
        )
    }
}

/// Diagnostic body for failed forwards.
#[derive(Debug, Serialize)]
struct ProxyFailure {
    error: &'static str,
    detail: String,
    elapsed: String,
}

/// Build the relay router.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route(
            "/api/{*path}",
            post(forward).options(preflight).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the relay until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: RelayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(
        addr = %listener.local_addr()?,
        upstream = %state.upstream,
        "relay listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn preflight() -> Response {
    with_cors(StatusCode::OK.into_response())
}

async fn method_not_allowed() -> Response {
    with_cors(
        (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(serde_json::json!({ "error": "Method not allowed" })),
        )
            .into_response(),
    )
}

async fn forward(
    State(state): State<RelayState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    // Raw path and query, still percent-encoded.
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let target = format!("{}{}", state.upstream, path_and_query);
    tracing::info!(bytes = body.len(), %target, "relaying request");

    // Content-Length follows from the buffered body, so it matches the original.
    let mut req = state.http.post(&target);
    if let Some(ct) = headers.get(CONTENT_TYPE) {
        req = req.header(CONTENT_TYPE, ct.clone());
    }

    let exchange = async {
        let resp = req.body(body).send().await?;
        let status = resp.status();
        let content_type = resp.headers().get(CONTENT_TYPE).cloned();
        let bytes = resp.bytes().await?;
        Ok::<_, reqwest::Error>((status, content_type, bytes))
    };

    let outcome = tokio::time::timeout(state.max_duration, exchange).await;
    let elapsed = started.elapsed().as_secs_f64();

    match outcome {
        Ok(Ok((status, content_type, bytes))) => {
            tracing::info!(
                status = status.as_u16(),
                elapsed = format!("{elapsed:.1}s"),
                "upstream responded"
            );
            let mut response = (status, bytes).into_response();
            match content_type {
                Some(ct) => {
                    response.headers_mut().insert(CONTENT_TYPE, ct);
                }
                None => {
                    response.headers_mut().remove(CONTENT_TYPE);
                }
            }
            with_cors(response)
        }
        Ok(Err(e)) => {
            let detail = error_chain(&e.without_url());
            tracing::error!(elapsed = format!("{elapsed:.1}s"), "relay failed: {detail}");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "proxy request failed",
                detail,
                elapsed,
            )
        }
        Err(_) => {
            tracing::error!(elapsed = format!("{elapsed:.1}s"), "relay exceeded host budget");
            failure(
                StatusCode::GATEWAY_TIMEOUT,
                "upstream timed out",
                format!("no response within {}s", state.max_duration.as_secs()),
                elapsed,
            )
        }
    }
}

/// `Display` of an error followed by each of its sources, e.g.
/// `error sending request: client error (Connect): tcp connect error: ...`.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

fn failure(status: StatusCode, error: &'static str, detail: String, elapsed: f64) -> Response {
    let body = ProxyFailure {
        error,
        detail,
        elapsed: format!("{elapsed:.1}s"),
    };
    with_cors((status, Json(body)).into_response())
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const BOUNDARY_CT: &str = "multipart/form-data; boundary=----relaytest";
    const BODY: &str = "------relaytest\r\nContent-Disposition: form-data; name=\"image_file\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\npng\r\n------relaytest--\r\n";

    async fn spawn_relay(upstream: &str, budget: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = RelayState::new(reqwest::Client::new(), upstream, budget);
        tokio::spawn(serve(listener, state, std::future::pending()));
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_forwards_body_and_content_type_verbatim() {
        let mut upstream = mockito::Server::new_async().await;
        let mock = upstream
            .mock("POST", "/api/remove-background")
            .match_header("content-type", BOUNDARY_CT)
            .match_header("content-length", BODY.len().to_string().as_str())
            .match_body(Matcher::Exact(BODY.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"processed_url":"https://file.302.ai/a.png"}"#)
            .create_async()
            .await;

        let relay = spawn_relay(&upstream.url(), Duration::from_secs(30)).await;
        let resp = reqwest::Client::new()
            .post(format!("{relay}/api/remove-background"))
            .header("content-type", BOUNDARY_CT)
            .body(BODY)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(
            resp.text().await.unwrap(),
            r#"{"processed_url":"https://file.302.ai/a.png"}"#
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_relayed() {
        let mut upstream = mockito::Server::new_async().await;
        let _mock = upstream
            .mock("POST", "/api/remove-background")
            .with_status(503)
            .with_body(r#"{"detail":"Cannot connect to 302.AI service."}"#)
            .create_async()
            .await;

        let relay = spawn_relay(&upstream.url(), Duration::from_secs(30)).await;
        let resp = reqwest::Client::new()
            .post(format!("{relay}/api/remove-background"))
            .header("content-type", BOUNDARY_CT)
            .body(BODY)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 503);
        assert_eq!(
            resp.text().await.unwrap(),
            r#"{"detail":"Cannot connect to 302.AI service."}"#
        );
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let relay = spawn_relay("http://127.0.0.1:9", Duration::from_secs(30)).await;
        let resp = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("{relay}/api/remove-background"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["access-control-allow-methods"], "POST, OPTIONS");
        assert_eq!(resp.headers()["access-control-allow-headers"], "Content-Type");
        assert!(resp.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_methods_rejected() {
        let relay = spawn_relay("http://127.0.0.1:9", Duration::from_secs(30)).await;
        let resp = reqwest::get(format!("{relay}/api/remove-background"))
            .await
            .unwrap();

        assert_eq!(resp.status(), 405);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_structured_500() {
        let relay = spawn_relay("http://127.0.0.1:9", Duration::from_secs(30)).await;
        let resp = reqwest::Client::new()
            .post(format!("{relay}/api/remove-background"))
            .header("content-type", BOUNDARY_CT)
            .body(BODY)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 500);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "proxy request failed");
        assert!(body["detail"].is_string());
        assert!(body["elapsed"].as_str().unwrap().ends_with('s'));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_classifies_as_network() {
        use crate::{
            classifier::{UserFacingCategory, classify},
            settings::Settings,
            source::SourceFile,
            transport::{EndpointConfig, HttpTransport, Transport, TransportError},
        };

        let relay = spawn_relay("http://127.0.0.1:9", Duration::from_secs(30)).await;
        let transport = HttpTransport::new(
            reqwest::Client::new(),
            Settings::new("https://site.test", Some(&relay)).unwrap(),
        );
        let file = SourceFile::new("a.png", "image/png", b"png".to_vec());

        let err = transport
            .submit(&file, &EndpointConfig::remove_background())
            .await
            .unwrap_err();

        match &err {
            TransportError::HttpError { status, body, .. } => {
                assert_eq!(*status, 500);
                let body: serde_json::Value = serde_json::from_str(body).unwrap();
                assert!(body["detail"].as_str().unwrap().contains("connect"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(classify(&err), UserFacingCategory::NetworkError);
    }

    #[tokio::test]
    async fn test_path_and_query_forwarded_raw() {
        let mut upstream = mockito::Server::new_async().await;
        let mock = upstream
            .mock("POST", "/api/a%20b?mode=fast")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let relay = spawn_relay(&upstream.url(), Duration::from_secs(30)).await;
        let resp = reqwest::Client::new()
            .post(format!("{relay}/api/a%20b?mode=fast"))
            .header("content-type", BOUNDARY_CT)
            .body(BODY)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        mock.assert_async().await;
    }

    #[test]
    fn test_zero_budget_falls_back_to_default() {
        let cfg = RelayCfg {
            max_duration_secs: 0,
            ..Default::default()
        };
        let state = RelayState::from_config(&cfg);
        assert_eq!(state.max_duration, Duration::from_secs(300));

        let cfg = RelayCfg {
            max_duration_secs: 60,
            ..Default::default()
        };
        assert_eq!(RelayState::from_config(&cfg).max_duration, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_large_bodies_are_not_limited() {
        let mut upstream = mockito::Server::new_async().await;
        let _mock = upstream
            .mock("POST", "/api/remove-background")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let relay = spawn_relay(&upstream.url(), Duration::from_secs(30)).await;
        // Larger than axum's default 2 MB extractor limit.
        let big = vec![b'x'; 3 * 1024 * 1024];
        let resp = reqwest::Client::new()
            .post(format!("{relay}/api/remove-background"))
            .header("content-type", BOUNDARY_CT)
            .body(big)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
}
