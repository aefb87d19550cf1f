use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::state::AppState;

/// Create the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/devices", get(handlers::list_devices))
        .route("/api/devices/:id/wake", post(handlers::wake_device))
        .route("/api/scan", get(handlers::scan))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
