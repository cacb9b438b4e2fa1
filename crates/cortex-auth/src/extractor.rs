use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cortex_core::{ApiKey, CortexError, ErrorBody};

use crate::service::AuthService;

/// Newtype so this crate can implement `IntoResponse` for an
/// authentication/permission failure without running into the orphan
/// rule on `CortexError` (owned by `cortex-core`, which does not depend
/// on axum).
pub struct AuthRejection(pub CortexError);

impl From<CortexError> for AuthRejection {
    fn from(err: CortexError) -> Self {
        AuthRejection(err)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = (&self.0).into();
        (status, Json(body)).into_response()
    }
}

/// Extracts and validates the bearer API key for a request, failing the
/// request with 401 before any handler body runs if the header is
/// missing or the key does not check out.
pub struct CurrentApiKey(pub ApiKey);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentApiKey
where
    S: Send + Sync,
    S: AsRef<AuthService>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CortexError::Authentication("missing Authorization header".into()))?;

        let auth_service: &AuthService = state.as_ref();
        let key = auth_service.authenticate(header).await?;
        Ok(CurrentApiKey(key))
    }
}
