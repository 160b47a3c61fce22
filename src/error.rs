use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("unexpected upstream payload: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DashboardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamUnavailable(_) | Self::Parse(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<anyhow::Error> for DashboardError {
    fn from(value: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line
        let msg = format!("{:#}", value);
        if value.chain().any(|e| e.is::<serde_json::Error>()) {
            Self::Parse(msg)
        } else {
            Self::UpstreamUnavailable(msg)
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn payload_errors_are_classified_as_parse() {
        let bad = serde_json::from_str::<u64>("\"x\"")
            .context("Unexpected payload from /actions/runs")
            .unwrap_err();
        assert!(matches!(DashboardError::from(bad), DashboardError::Parse(_)));

        let down = anyhow::anyhow!("GitHub HTTP Error 503");
        assert!(matches!(DashboardError::from(down), DashboardError::UpstreamUnavailable(_)));
    }

    #[test]
    fn maps_to_http_status() {
        assert_eq!(DashboardError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(DashboardError::InvalidRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(DashboardError::Parse("x".into()).status_code(), StatusCode::BAD_GATEWAY);
    }
}
