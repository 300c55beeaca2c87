//! # Error Handling
//!
//! Every failure in the relay is an [`AppError`]: a message plus an
//! [`ErrorKind`] tag that fixes both the machine-readable `type` string and the
//! HTTP status code. Handlers return `AppResult<T>` and actix turns the error
//! into a JSON response through the [`ResponseError`] impl below.
//!
//! ## Response Format:
//! ```json
//! { "error": "No audio file provided", "type": "VALIDATION_ERROR" }
//! ```
//!
//! ## Status Mapping:
//! - **Validation** → 400
//! - **Config** → 500
//! - **Api** → 502 when the upstream answered with a 5xx, 500 otherwise
//! - **Timeout** → 408
//! - **Auth** → 401
//! - **RateLimit** → 429
//! - **NotFound** → 404
//! - **Internal** → 500

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Machine-readable error category, rendered as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Config,
    Api,
    Timeout,
    Auth,
    RateLimit,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Api => "API_ERROR",
            ErrorKind::Timeout => "TIMEOUT_ERROR",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::RateLimit => "RATE_LIMIT_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Application error carrying the `(message, kind, status)` triple.
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::Validation("Session ID is required".to_string()));
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Caller sent missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// A required credential or setting is absent
    #[error("{0}")]
    Config(String),

    /// Upstream service failed or answered with something unusable.
    /// `status` is the status this error maps to (502 for upstream 5xx).
    #[error("{message}")]
    Api { message: String, status: u16 },

    /// A bounded wait was exceeded
    #[error("{0}")]
    Timeout(String),

    /// Upstream rejected our credential
    #[error("{0}")]
    Auth(String),

    /// Upstream is throttling us
    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    NotFound(String),

    /// Anything unanticipated that reached the outer boundary
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Generic upstream failure (500).
    pub fn api(message: impl Into<String>) -> Self {
        AppError::Api {
            message: message.into(),
            status: 500,
        }
    }

    /// Upstream answered with a server error (502).
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        AppError::Api {
            message: message.into(),
            status: 502,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Api { .. } => ErrorKind::Api,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::Auth(_) => ErrorKind::Auth,
            AppError::RateLimit(_) => ErrorKind::RateLimit,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Classify a non-success upstream HTTP status.
    ///
    /// 401 → Auth, 429 → RateLimit, >= 500 → Api (502), anything else → Api (500).
    pub fn from_upstream_status(service: &str, status: u16, body: &str) -> Self {
        let detail = truncate(body, 200);
        match status {
            401 => AppError::Auth(format!("{service} rejected the API key")),
            429 => AppError::RateLimit(format!("{service} rate limit exceeded")),
            s if s >= 500 => {
                AppError::bad_gateway(format!("{service} unavailable ({s}): {detail}"))
            }
            s => AppError::api(format!("{service} request failed ({s}): {detail}")),
        }
    }

    /// Classify a transport-level failure from reqwest.
    pub fn from_transport(service: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(format!("{service} request timed out"))
        } else if let Some(status) = err.status() {
            AppError::from_upstream_status(service, status.as_u16(), &err.to_string())
        } else {
            AppError::api(format!("{service} request failed: {err}"))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        let code = match self {
            AppError::Validation(_) => 400,
            AppError::Config(_) => 500,
            AppError::Api { status, .. } => *status,
            AppError::Timeout(_) => 408,
            AppError::Auth(_) => 401,
            AppError::RateLimit(_) => 429,
            AppError::NotFound(_) => 404,
            AppError::Internal(_) => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string(),
            "type": self.kind().as_str(),
        }))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::from_transport("upstream service", &err)
    }
}

/// Malformed JSON is almost always the client's fault.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Config("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::Timeout("x".into()).status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(AppError::Auth("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::RateLimit("x".into()).status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::bad_gateway("x").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::api("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_status_classification() {
        assert_eq!(AppError::from_upstream_status("svc", 401, "").kind(), ErrorKind::Auth);
        assert_eq!(AppError::from_upstream_status("svc", 429, "").kind(), ErrorKind::RateLimit);

        let server = AppError::from_upstream_status("svc", 503, "down");
        assert_eq!(server.kind(), ErrorKind::Api);
        assert_eq!(server.status_code(), StatusCode::BAD_GATEWAY);

        let other = AppError::from_upstream_status("svc", 404, "missing");
        assert_eq!(other.kind(), ErrorKind::Api);
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "a".repeat(500);
        let err = AppError::from_upstream_status("svc", 400, &body);
        assert!(err.to_string().len() < 300);
        assert!(err.to_string().ends_with("..."));
    }

    #[actix_web::test]
    async fn test_error_response_body() {
        let response = AppError::Validation("No audio file provided".into()).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "No audio file provided");
        assert_eq!(value["type"], "VALIDATION_ERROR");
    }
}
