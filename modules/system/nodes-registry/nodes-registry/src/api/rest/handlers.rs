use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use std::sync::Arc;

use nodes_registry_sdk::{
    HeartbeatRequest, HeartbeatResponse, RegisterNodeRequest, RegisterNodeResponse,
};

use super::dto::{ListNodesDto, ListNodesQuery, NodeDto, PoolStatsDto};
use super::error::ApiResult;
use crate::domain::service::Service;

/// Register (or re-register) a node. Admission refusals are `200` with `success = false`.
pub async fn register_node(
    Extension(svc): Extension<Arc<Service>>,
    Json(req): Json<RegisterNodeRequest>,
) -> ApiResult<Json<RegisterNodeResponse>> {
    Ok(Json(svc.register_node(req)?))
}

pub async fn heartbeat(
    Extension(svc): Extension<Arc<Service>>,
    Json(req): Json<HeartbeatRequest>,
) -> Json<HeartbeatResponse> {
    Json(svc.heartbeat(&req))
}

/// List healthy nodes, optionally filtered by specialization and organization
pub async fn list_nodes(
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<ListNodesQuery>,
) -> Json<ListNodesDto> {
    let nodes = svc.list_nodes(&query.into());
    Json(ListNodesDto {
        nodes: nodes.into_iter().map(Into::into).collect(),
    })
}

/// Get a node by ID
pub async fn get_node(
    Extension(svc): Extension<Arc<Service>>,
    Path(node_id): Path<String>,
) -> ApiResult<Json<NodeDto>> {
    let node = svc.get_node(&node_id)?;
    Ok(Json(node.into()))
}

pub async fn pool_stats(Extension(svc): Extension<Arc<Service>>) -> Json<PoolStatsDto> {
    Json(PoolStatsDto {
        node_count: svc.node_count(),
        max_nodes: svc.config().max_nodes,
    })
}
