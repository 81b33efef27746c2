//! Error envelope and status mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::pipeline::PipelineError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn from_pipeline(error: &PipelineError) -> Self {
        let retry_after_ms = match error {
            PipelineError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        };

        Self {
            error: ErrorBody {
                kind: error.kind(),
                message: error.to_string(),
                stage: None,
                retry_after_ms,
            },
        }
    }
}

/// HTTP status for an error kind.
pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        PipelineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        PipelineError::DependencyUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wrapper so pipeline errors can be returned straight from handlers.
#[derive(Debug)]
pub struct GatewayError(pub PipelineError);

impl From<PipelineError> for GatewayError {
    fn from(error: PipelineError) -> Self {
        Self(error)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(ErrorEnvelope::from_pipeline(&self.0));
        (status, body).into_response()
    }
}
