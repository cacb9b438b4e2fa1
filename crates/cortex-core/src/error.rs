use serde::Serialize;

/// The single error type that crosses every crate boundary in the gateway.
///
/// Store adapters translate their native errors (`sqlx::Error`,
/// `qdrant_client` errors, S3 SDK errors, `reqwest::Error`) into
/// `CortexError::Upstream` at the boundary; nothing downstream of
/// `cortex-core` ever matches on a foreign error type.
#[derive(Debug, thiserror::Error)]
pub enum CortexError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("permission error: {0}")]
    Permission(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl CortexError {
    pub fn kind(&self) -> &'static str {
        match self {
            CortexError::Validation(_) => "ValidationError",
            CortexError::NotFound(_) => "NotFound",
            CortexError::Authentication(_) => "AuthenticationError",
            CortexError::Permission(_) => "PermissionError",
            CortexError::Conflict(_) => "ConflictError",
            CortexError::Upstream(_) => "UpstreamError",
            CortexError::Timeout(_) => "Timeout",
            CortexError::Cancelled(_) => "Cancelled",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            CortexError::Validation(_) => 400,
            CortexError::NotFound(_) => 404,
            CortexError::Authentication(_) => 401,
            CortexError::Permission(_) => 403,
            CortexError::Conflict(_) => 409,
            CortexError::Upstream(_) => 502,
            CortexError::Timeout(_) => 504,
            CortexError::Cancelled(_) => 499,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CortexError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CortexError::NotFound(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        CortexError::Upstream(msg.into())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

impl From<&CortexError> for ErrorBody {
    fn from(err: &CortexError) -> Self {
        ErrorBody {
            error: ErrorDetail {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

pub type CortexResult<T> = Result<T, CortexError>;
