//! Request filtering through auth and metrics plugins.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use poolkit::PluginManager;
use poolkit::plugins::{AuthPlugin, Labels, MetricsPlugin, RequestInfo};
use std::sync::Arc;
use std::time::Instant;

use super::error::Problem;

/// Snapshot of the filtering plugins, taken when the router is built.
#[derive(Clone, Default)]
pub struct RequestFilters {
    auth: Vec<(String, Arc<dyn AuthPlugin>)>,
    metrics: Vec<(String, Arc<dyn MetricsPlugin>)>,
}

impl RequestFilters {
    /// Every loaded plugin exposing the auth or metrics capability, in registration order.
    #[must_use]
    pub fn from_plugins(plugins: &PluginManager) -> Self {
        Self {
            auth: plugins.with_capability::<dyn AuthPlugin>(),
            metrics: plugins.with_capability::<dyn MetricsPlugin>(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.auth.is_empty() && self.metrics.is_empty()
    }
}

/// Label used for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Metrics filters observe every request and never block it. Auth filters run next and
/// the first rejection ends the request.
///
/// Request metrics are labelled with the route template (`/nodes/{id}`), never the raw
/// path, so the number of series is bounded by the number of routes.
pub async fn filter_requests(
    State(filters): State<RequestFilters>,
    request: Request,
    next: Next,
) -> Response {
    if filters.is_empty() {
        return next.run(request).await;
    }

    let info = request_info(&request);
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE, MatchedPath::as_str)
        .to_owned();
    for (plugin, metrics) in &filters.metrics {
        if let Err(e) = metrics.filter_request(&info) {
            tracing::warn!(plugin = %plugin, error = %e, "Metrics request filter failed");
        }
    }

    for (plugin, auth) in &filters.auth {
        if let Err(e) = auth.filter_request(&info) {
            tracing::debug!(plugin = %plugin, path = %info.path, reason = %e, "Request rejected");
            let response = Problem::from(e).into_response();
            record(&filters, &info.method, &route, response.status().as_u16(), None);
            return response;
        }
    }

    let started = Instant::now();
    let response = next.run(request).await;
    record(&filters, &info.method, &route, response.status().as_u16(), Some(started));
    response
}

fn record(
    filters: &RequestFilters,
    method: &str,
    route: &str,
    status: u16,
    started: Option<Instant>,
) {
    let labels = Labels::from([
        ("method".to_owned(), method.to_owned()),
        ("path".to_owned(), route.to_owned()),
        ("status".to_owned(), status.to_string()),
    ]);
    for (_, metrics) in &filters.metrics {
        metrics.record_metric("http_requests_total", 1.0, &labels);
        if let Some(started) = started {
            metrics.record_metric(
                "http_request_duration_seconds",
                started.elapsed().as_secs_f64(),
                &labels,
            );
        }
    }
}

fn request_info(request: &Request) -> RequestInfo {
    RequestInfo {
        method: request.method().as_str().to_owned(),
        path: request.uri().path().to_owned(),
        headers: request
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect(),
    }
}
