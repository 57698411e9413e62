//! HTTP API Server
//!
//! Client-facing REST API: liveness, replica registration, writes, reads and
//! node status. The replica-side endpoints live in `replicate.rs` and are
//! served by the same router.

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::replicate;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::executor::JsonRow;
use crate::node::{NodeService, NodeStatus};
use crate::replication::protocol::{
    DatabaseParams, DeleteBody, InsertBody, RegisterParams, SelectParams, TableParams, UpdateBody,
    PING_PATH, REGISTER_PATH,
};
use crate::replication::ReplicationTask;

/// HTTP API server
pub struct HttpServer {
    config: ApiConfig,
    service: Arc<NodeService>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ApiConfig, service: Arc<NodeService>) -> Self {
        Self { config, service }
    }

    /// Create the router
    pub fn create_router(service: Arc<NodeService>, cors_enabled: bool) -> Router {
        let router = Router::new()
            .route(PING_PATH, get(handle_ping))
            .route(REGISTER_PATH, get(handle_register))
            // Schema operations
            .route("/createdb", get(handle_create_db).post(handle_create_db))
            .route("/dropdb", get(handle_drop_db).post(handle_drop_db))
            .route("/createtable", get(handle_create_table).post(handle_create_table))
            // Row operations
            .route("/insert", post(handle_insert))
            .route("/update", post(handle_update))
            .route("/delete", post(handle_delete))
            // Reads and status
            .route("/select", get(handle_select))
            .route("/status", get(handle_status))
            .merge(replicate::routes())
            .with_state(service)
            .layer(TraceLayer::new_for_http());

        if cors_enabled {
            router.layer(cors_layer())
        } else {
            router
        }
    }

    /// Router for this server's configuration
    pub fn router(&self) -> Router {
        Self::create_router(Arc::clone(&self.service), self.config.cors_enabled)
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("HTTP API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

/// Allow any origin, the usual methods and JSON bodies
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// ============ Request/Response Types ============

/// Message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Registration response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Crate error rendered as an HTTP response
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::LocalExecution { .. } | Error::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "LOCAL_EXECUTION_ERROR")
            }
            Error::NotPrimary(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_PRIMARY"),
            Error::QueueClosed => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_CLOSED"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

pub(super) type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Unwrap a JSON body, reporting any parse failure as a validation error
pub(super) fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> std::result::Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!("Rejected request body: {}", rejection);
            Err(Error::Validation("Invalid request body".into()).into())
        }
    }
}

// ============ Handlers ============

async fn handle_ping() -> &'static str {
    "pong"
}

async fn handle_register(
    State(service): State<Arc<NodeService>>,
    Query(params): Query<RegisterParams>,
) -> ApiResult<RegisterResponse> {
    service.register_replica(&params.address).await?;
    Ok(Json(RegisterResponse {
        status: "registered".to_string(),
    }))
}

async fn accept_write(service: &NodeService, task: ReplicationTask) -> ApiResult<MessageResponse> {
    let kind = task.kind();
    service.execute_write(task).await?;
    Ok(Json(MessageResponse {
        message: kind.success_message().to_string(),
    }))
}

async fn handle_create_db(
    State(service): State<Arc<NodeService>>,
    Query(params): Query<DatabaseParams>,
) -> ApiResult<MessageResponse> {
    accept_write(&service, params.into_create()).await
}

async fn handle_drop_db(
    State(service): State<Arc<NodeService>>,
    Query(params): Query<DatabaseParams>,
) -> ApiResult<MessageResponse> {
    accept_write(&service, params.into_drop()).await
}

async fn handle_create_table(
    State(service): State<Arc<NodeService>>,
    Query(params): Query<TableParams>,
) -> ApiResult<MessageResponse> {
    accept_write(&service, params.into()).await
}

async fn handle_insert(
    State(service): State<Arc<NodeService>>,
    body: std::result::Result<Json<InsertBody>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    accept_write(&service, json_body(body)?.into()).await
}

async fn handle_update(
    State(service): State<Arc<NodeService>>,
    body: std::result::Result<Json<UpdateBody>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    accept_write(&service, json_body(body)?.into()).await
}

async fn handle_delete(
    State(service): State<Arc<NodeService>>,
    body: std::result::Result<Json<DeleteBody>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    accept_write(&service, json_body(body)?.into()).await
}

async fn handle_select(
    State(service): State<Arc<NodeService>>,
    Query(params): Query<SelectParams>,
) -> ApiResult<Vec<JsonRow>> {
    let rows = service.select(&params.dbname, &params.table).await?;
    Ok(Json(rows))
}

async fn handle_status(State(service): State<Arc<NodeService>>) -> Json<NodeStatus> {
    Json(service.status().await)
}
