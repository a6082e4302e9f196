//! Router assembly.

use axum::http::header::{self, HeaderName, HeaderValue, InvalidHeaderValue};
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// `*` allows any origin; anything else must be a single exact origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ]);
    Ok(match origin.trim() {
        "*" => layer.allow_origin(Any),
        exact => layer.allow_origin(HeaderValue::from_str(exact)?),
    })
}

pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router, InvalidHeaderValue> {
    let api_routes = Router::new()
        .route("/tiles/flags", post(handlers::lookup_flags))
        .route(
            "/tiles/{tile_hash}/flag",
            post(handlers::flag_tile).delete(handlers::unflag_tile),
        )
        .route("/admin/flags", get(handlers::list_flags));

    let ops_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics));

    // Layers apply bottom-up: tracing sees every request, including CORS preflights.
    Ok(Router::new()
        .merge(api_routes)
        .merge(ops_routes)
        .layer(cors_layer(cors_origin)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
