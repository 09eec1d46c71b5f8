//! Error types for stock-scrape.
//!
//! Two layers: [`TickerError`] is captured per ticker and folded into that
//! ticker's result, [`ScrapeError`] aborts a whole request.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Failure of a single ticker pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickerError {
    /// The ticker could not be resolved to a quote page
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Timeout(String),

    /// Resolved URL is on the blocklist; carries the policy reason
    #[error("Could not scrape URL: {0}")]
    Blocked(String),

    #[error("Scrape job failed: {0}")]
    JobFailed(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    InvalidOptions(String),
}

impl TickerError {
    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
            Self::Blocked(_) => "blocked",
            Self::JobFailed(_) => "job_failed",
            Self::Upstream(_) => "upstream",
            Self::InvalidOptions(_) => "invalid_options",
        }
    }
}

/// Request-level failure.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ScrapeError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

/// API error body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        let code = match &self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        };

        let body = serde_json::json!({
            "success": false,
            "error": ApiError {
                code: code.to_string(),
                message: self.to_string(),
            }
        });

        (self.status_code(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_error_display() {
        let err = TickerError::Blocked("not supported".into());
        assert_eq!(err.to_string(), "Could not scrape URL: not supported");
        assert_eq!(err.kind(), "blocked");

        let err = TickerError::NotFound("No results found for ticker: ZZZZ".into());
        assert_eq!(err.to_string(), "No results found for ticker: ZZZZ");
    }

    #[test]
    fn test_scrape_error_into_response() {
        let response = ScrapeError::InvalidInput("tickers is empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ScrapeError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
