use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors that can escape the filter. All per-request enrichment/decision
/// failures are resolved to a 503 by the middleware before they ever reach
/// this type; `FilterError` exists for fatal startup paths (config load,
/// bad-IP list load) and for the rare internal invariant violation.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to load bad-IP list: {0}")]
    BadIpList(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FilterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FilterError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FilterError::BadIpList(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FilterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FilterError::Config(msg) => msg,
            FilterError::BadIpList(msg) => msg,
            FilterError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for FilterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.message(), "status": status.as_u16() }));
        (status, body).into_response()
    }
}

impl From<reqwest::Error> for FilterError {
    fn from(err: reqwest::Error) -> Self {
        FilterError::BadIpList(err.to_string())
    }
}

pub type FilterResult<T> = Result<T, FilterError>;
