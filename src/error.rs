use axum::extract::multipart::MultipartError;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TimecapsuleError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not signed in")]
    Unauthorized,

    #[error("Not allowed")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Upload too large")]
    PayloadTooLarge,

    #[error("Too many attempts, try again in a minute")]
    RateLimited,

    /// Error reported by the hosted database service; `message` is its own text.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
}

const MALFORMED_UPSTREAM: &str = "Upstream service returned malformed data.";

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TimecapsuleError {
    fn is_retryable(&self) -> bool {
        match self {
            TimecapsuleError::Reqwest(e) => e.is_connect() || e.is_timeout(),
            TimecapsuleError::Upstream { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl TimecapsuleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TimecapsuleError::Validation(msg.into())
    }

    /// The message a form shows inline.
    pub fn user_message(&self) -> String {
        match self {
            TimecapsuleError::Reqwest(e) if e.is_decode() => MALFORMED_UPSTREAM.to_string(),
            TimecapsuleError::Reqwest(_) | TimecapsuleError::UrlParse(_) => {
                "Upstream service is unavailable.".to_string()
            }
            TimecapsuleError::Json(_) => MALFORMED_UPSTREAM.to_string(),
            TimecapsuleError::Config(_) => "An internal server error occurred.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for TimecapsuleError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            TimecapsuleError::Validation(_) | TimecapsuleError::Multipart(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION")
            }
            TimecapsuleError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            TimecapsuleError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            TimecapsuleError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            TimecapsuleError::UnsupportedMedia(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA")
            }
            TimecapsuleError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            TimecapsuleError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT"),
            TimecapsuleError::Upstream { status, .. } if status.is_client_error() => {
                let code = match *status {
                    StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
                    StatusCode::FORBIDDEN => "FORBIDDEN",
                    StatusCode::NOT_FOUND => "NOT_FOUND",
                    StatusCode::CONFLICT => "CONFLICT",
                    StatusCode::TOO_MANY_REQUESTS => "RATE_LIMIT",
                    _ => "UPSTREAM_REJECTED",
                };
                (*status, code)
            }
            TimecapsuleError::Upstream { .. }
            | TimecapsuleError::Reqwest(_)
            | TimecapsuleError::Json(_) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY"),
            TimecapsuleError::UrlParse(_) | TimecapsuleError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        let body = ApiErrorBody {
            code: code.to_string(),
            message: self.user_message(),
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Error payloads from the hosted service. Auth, REST and storage each name
/// the human-readable field differently.
#[derive(Deserialize, Debug, Default)]
pub struct UpstreamErrorBody {
    pub msg: Option<String>,
    pub message: Option<String>,
    pub error_description: Option<String>,
    pub error: Option<String>,
}

impl UpstreamErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}
