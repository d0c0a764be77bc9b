//! Buckets transport failures into user-facing categories.
//!
//! The remote service does not return error codes, so the primary rule is
//! ordered substring matching over the error text. This is brittle by
//! nature: a change in vendor wording moves an error into a different
//! bucket. Structured data (HTTP status, network failure) is only consulted
//! when no pattern matched, and anything left over is `ProcessingFailed`.

use crate::transport::{TransportError, error_texts_from_body};

/// What the user is told went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserFacingCategory {
    ApiKeyMissing,
    FileTooLarge,
    NetworkError,
    ServerTimeout,
    ServerError,
    ProcessingFailed,
}

/// Checked top to bottom; the first hit wins.
const PATTERNS: &[(UserFacingCategory, &[&str])] = &[
    (
        UserFacingCategory::ApiKeyMissing,
        &["API key", "AI302_API_KEY", "DEWATERMARK_API_KEY", "API 密钥"],
    ),
    (
        UserFacingCategory::FileTooLarge,
        &["too large", "16MB", "10MB", "文件过大"],
    ),
    (
        UserFacingCategory::NetworkError,
        &["network", "connect", "无法连接"],
    ),
    (
        UserFacingCategory::ServerTimeout,
        &["timeout", "timed out", "超时"],
    ),
    (UserFacingCategory::ServerError, &["503", "504", "500"]),
];

/// A classified failure. `detail` keeps the raw text for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub category: UserFacingCategory,
    pub detail: String,
}

impl Failure {
    pub fn from_error(err: &TransportError) -> Self {
        Self {
            category: classify(err),
            detail: err.to_string(),
        }
    }
}

/// Classify a transport error.
pub fn classify(err: &TransportError) -> UserFacingCategory {
    classify_message(&error_text(err))
        .or_else(|| classify_structured(err))
        .unwrap_or(UserFacingCategory::ProcessingFailed)
}

/// Pattern pass over raw error text.
pub fn classify_message(text: &str) -> Option<UserFacingCategory> {
    PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| text.contains(n)))
        .map(|(category, _)| *category)
}

/// Display text plus every message field of an HTTP error body. A relay's
/// generic `error` must not hide the upstream cause carried in `detail`.
fn error_text(err: &TransportError) -> String {
    let mut text = err.to_string();
    if let TransportError::HttpError { body, .. } = err {
        for extra in error_texts_from_body(body) {
            if !text.contains(&extra) {
                text.push_str(" | ");
                text.push_str(&extra);
            }
        }
    }
    text
}

fn classify_structured(err: &TransportError) -> Option<UserFacingCategory> {
    match err {
        TransportError::NetworkFailure(_) => Some(UserFacingCategory::NetworkError),
        TransportError::HttpError { status, .. } => match *status {
            413 => Some(UserFacingCategory::FileTooLarge),
            408 | 504 => Some(UserFacingCategory::ServerTimeout),
            s if s >= 500 => Some(UserFacingCategory::ServerError),
            _ => None,
        },
        TransportError::MalformedResponse(_) => None,
    }
}
