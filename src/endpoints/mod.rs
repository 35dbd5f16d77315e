pub mod accounts;
pub mod activity;
pub mod api;
pub mod assignments;
pub mod courses;
pub mod extractors;
pub mod files;
pub mod materials;
pub mod messaging;

use axum::{middleware as axum_middleware, routing::get, Json, Router};
use tower_http::services::ServeDir;

use crate::config::CONFIG;
use crate::middleware::{api_throttle, optional_auth, require_auth, security_headers};
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // Public routes (session optional)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/version", get(get_version))
        .nest("/accounts", accounts::accounts_public_routes(state.clone()))
        .nest("/courses", courses::courses_public_routes(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .nest("/accounts", accounts::accounts_routes(state.clone()))
        .nest("/courses", courses::courses_routes(state.clone()))
        .nest("/materials", materials::materials_routes(state.clone()))
        .nest("/assignments", assignments::assignments_routes(state.clone()))
        .nest("/activity", activity::activity_routes(state.clone()))
        .nest("/messaging", messaging::messaging_routes(state.clone()))
        .nest("/ws/chat", messaging::chat_socket_routes(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // REST API: the session is resolved first so the throttle can key on the user
    let api_router = Router::new()
        .nest("/api/v1", api::api_routes(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            api_throttle,
        ))
        .layer(axum_middleware::from_fn_with_state(state, optional_auth));

    public_routes
        .merge(protected_routes)
        .merge(api_router)
        .nest_service("/static", ServeDir::new(&CONFIG.server.static_dir))
        .layer(axum_middleware::from_fn(security_headers))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Version info endpoint
async fn get_version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": CONFIG.version,
        "backend": "rust"
    }))
}
