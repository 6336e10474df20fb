pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the router is built from.
pub use auth::{anonymous_signin_handler, logout_handler};
pub use middleware::require_auth;
pub use rest::{decode_image_handler, list_plants_handler, plant_timeline_handler};
pub use ws_handler::ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

/// Builds the API router: public auth routes, token-protected plant routes and
/// the WebSocket endpoint, which signs in on its own.
pub fn router(app_state: Arc<AppState>) -> Router {
    let mut cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
    match app_state.config.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => warn!(
            "Ignoring invalid ALLOWED_ORIGIN '{}': {}",
            app_state.config.allowed_origin, e
        ),
    }

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/anonymous", post(anonymous_signin_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/ws", get(ws_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/plants", get(list_plants_handler))
        .route("/plants/{plant_id}/timeline", get(plant_timeline_handler))
        .route("/images", post(decode_image_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .layer(cors)
        .with_state(app_state)
}
