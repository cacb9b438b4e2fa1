use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cortex_core::{CortexError, ErrorBody};

/// Newtype so this binary crate can implement `IntoResponse` for
/// `CortexError` without running into the orphan rule — `cortex-core`
/// does not depend on axum, so every crate at the HTTP boundary wraps it
/// the same way `cortex-auth::AuthRejection` does.
pub struct GatewayError(pub CortexError);

impl From<CortexError> for GatewayError {
    fn from(err: CortexError) -> Self {
        GatewayError(err)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = (&self.0).into();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "request failed");
        }
        (status, Json(body)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
