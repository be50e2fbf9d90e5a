//! Route configuration for the Loki-compatible API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers::{ApiState, get_label_values, get_labels, query};
use crate::tail::tail;

/// Create the API router, nested under `/api/prom` like the Loki surface
/// clients expect.
pub fn create_router(state: Arc<ApiState>) -> Router {
    let prom_routes = Router::new()
        .route("/label", get(get_labels))
        .route("/label/{label}/values", get(get_label_values))
        .route("/query", get(query))
        .route("/tail", get(tail));

    Router::new()
        .nest("/api/prom", prom_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
