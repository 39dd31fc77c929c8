use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use service::errors::ServiceError;

/// Boundary wrapper turning the service taxonomy into HTTP responses. Every
/// error body carries the machine-checkable `error` code plus human detail.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::ClientInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            // Surface the backend's own status when it is an error status the
            // caller can interpret (e.g. 409 on a revision mismatch).
            ServiceError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ServiceError::Unreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = self.0.to_string();
        if status.is_server_error() {
            error!(error = %msg, code = self.0.code(), "request failed");
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.code(), "detail": msg })),
        )
            .into_response()
    }
}
