use axum::{
    Extension, Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

use super::handlers;
use super::middleware::{RequestFilters, filter_requests};
use crate::domain::service::Service;

/// Registry HTTP surface.
///
/// | Method | Path               | Body / query                   |
/// |--------|--------------------|--------------------------------|
/// | POST   | `/nodes/register`  | `RegisterNodeRequest`          |
/// | POST   | `/nodes/heartbeat` | `HeartbeatRequest`             |
/// | GET    | `/nodes`           | `?specialization=&org=`        |
/// | GET    | `/nodes/{id}`      |                                |
/// | GET    | `/pool/stats`      |                                |
pub fn router(service: Arc<Service>, filters: RequestFilters) -> Router {
    Router::new()
        .route("/nodes", get(handlers::list_nodes))
        .route("/nodes/register", post(handlers::register_node))
        .route("/nodes/heartbeat", post(handlers::heartbeat))
        .route("/nodes/{id}", get(handlers::get_node))
        .route("/pool/stats", get(handlers::pool_stats))
        .layer(Extension(service))
        .layer(middleware::from_fn_with_state(filters, filter_requests))
}
