pub mod config;
pub mod error;
pub mod multipart;
pub mod pipeline;
pub mod routes;
pub mod search;
pub mod state;

use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::Services;

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE]);

    match allowed_origin {
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value).allow_headers(Any),
            Err(_) => {
                tracing::warn!(origin, "invalid CORS origin configured, falling back to permissive");
                layer.allow_origin(Any).allow_headers(Any)
            }
        },
        None => layer.allow_origin(Any).allow_headers(Any),
    }
}

/// Assemble the full gateway router: every route from §6 of the route
/// table, a permissive-or-restricted CORS layer depending on
/// `config.cors_allowed_origin`, and request tracing.
pub fn build_router(services: Services) -> Router {
    let cors = cors_layer(services.config.cors_allowed_origin.as_deref());

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/health/all", get(routes::health::health_all))
        .route("/databases", post(routes::databases::create_database).get(routes::databases::list_databases))
        .route(
            "/databases/{name}",
            get(routes::databases::get_database).delete(routes::databases::delete_database),
        )
        .route("/collections", post(routes::collections::create_collection).get(routes::collections::list_collections))
        .route(
            "/collections/{name}",
            get(routes::collections::get_collection).delete(routes::collections::delete_collection),
        )
        .route("/collections/{collection}/records", post(routes::records::create_record))
        .route(
            "/collections/{collection}/records/{id}",
            get(routes::records::get_record)
                .patch(routes::records::update_record)
                .delete(routes::records::delete_record),
        )
        .route("/collections/{collection}/records/{id}/vectors", get(routes::records::get_record_vectors))
        .route("/collections/{collection}/search", post(routes::search::search_collection))
        .route("/collections/{collection}/query", post(routes::search::query_collection))
        .route("/api-keys", post(routes::api_keys::create_api_key).get(routes::api_keys::list_api_keys))
        .route(
            "/api-keys/{id}",
            get(routes::api_keys::get_api_key)
                .patch(routes::api_keys::update_api_key)
                .delete(routes::api_keys::delete_api_key),
        )
        .route("/providers/embeddings", post(routes::providers::create_provider).get(routes::providers::list_providers))
        .route("/providers/embeddings/{id}", delete(routes::providers::delete_provider))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}
