use cortex_core::CortexError;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub use cortex_core::quote_ident;

/// Open a bounded connection pool against `database_url`. Failures surface
/// as `UpstreamError`; callers at startup should treat this as fatal.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool, CortexError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| CortexError::upstream(format!("failed to connect to postgres: {e}")))
}
