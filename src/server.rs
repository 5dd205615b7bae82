use crate::api::{
    handlers,
    middleware::{access_log_middleware, auth_middleware},
};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use axum::{middleware, response::Json, routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

/// Create the Axum router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    // Public routes (no auth required).
    let public_routes = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/openapi.json", get(openapi_handler))
        .route("/access-logs", get(handlers::access_logs_handler))
        .route("/access-logs", axum::routing::delete(handlers::clear_access_logs_handler));

    // Protected routes (require Bearer token auth).
    let protected_routes = Router::new()
        .route("/dispatch", post(handlers::dispatch_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(state.clone(), access_log_middleware))
        .layer(cors)
        .with_state(state)
}

/// Serve the OpenAPI spec as JSON at `/openapi.json`.
async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
