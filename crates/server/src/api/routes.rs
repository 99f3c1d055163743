use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{convert, download, handlers, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Discovery
        .route("/formats", get(handlers::formats))
        .route("/capabilities", get(handlers::capabilities))
        .route("/cleanup/stats", get(handlers::cleanup_stats))
        // Conversion; the upload limit is enforced while streaming to disk
        .route(
            "/convert",
            post(convert::convert).layer(DefaultBodyLimit::disable()),
        )
        .route("/download/{filename}", get(download::download));

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
