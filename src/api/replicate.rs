//! Replica-side endpoints
//!
//! Apply tasks pushed by the primary's dispatcher. These execute locally and
//! are never queued again, so a replica does not fan writes back out.

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};

use super::http::{json_body, ApiResult};
use crate::node::NodeService;
use crate::replication::protocol::{replica_path, DatabaseParams, DeleteBody, InsertBody, TableParams, UpdateBody};
use crate::replication::{OperationKind, ReplicaAck};

pub(super) fn routes() -> Router<Arc<NodeService>> {
    Router::new()
        .route(replica_path(OperationKind::CreateDatabase), get(replicate_create_db))
        .route(replica_path(OperationKind::DropDatabase), get(replicate_drop_db))
        .route(replica_path(OperationKind::CreateTable), get(replicate_create_table))
        .route(replica_path(OperationKind::Insert), post(replicate_insert))
        .route(replica_path(OperationKind::Update), post(replicate_update))
        .route(replica_path(OperationKind::Delete), post(replicate_delete))
}

async fn replicate_create_db(
    State(service): State<Arc<NodeService>>,
    Query(params): Query<DatabaseParams>,
) -> ApiResult<ReplicaAck> {
    Ok(Json(service.apply_replicated(params.into_create()).await?))
}

async fn replicate_drop_db(
    State(service): State<Arc<NodeService>>,
    Query(params): Query<DatabaseParams>,
) -> ApiResult<ReplicaAck> {
    Ok(Json(service.apply_replicated(params.into_drop()).await?))
}

async fn replicate_create_table(
    State(service): State<Arc<NodeService>>,
    Query(params): Query<TableParams>,
) -> ApiResult<ReplicaAck> {
    Ok(Json(service.apply_replicated(params.into()).await?))
}

async fn replicate_insert(
    State(service): State<Arc<NodeService>>,
    body: Result<Json<InsertBody>, JsonRejection>,
) -> ApiResult<ReplicaAck> {
    Ok(Json(service.apply_replicated(json_body(body)?.into()).await?))
}

async fn replicate_update(
    State(service): State<Arc<NodeService>>,
    body: Result<Json<UpdateBody>, JsonRejection>,
) -> ApiResult<ReplicaAck> {
    Ok(Json(service.apply_replicated(json_body(body)?.into()).await?))
}

async fn replicate_delete(
    State(service): State<Arc<NodeService>>,
    body: Result<Json<DeleteBody>, JsonRejection>,
) -> ApiResult<ReplicaAck> {
    Ok(Json(service.apply_replicated(json_body(body)?.into()).await?))
}
