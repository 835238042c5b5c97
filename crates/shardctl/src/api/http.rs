//! HTTP management API
//!
//! RESTful API over the registry and the query router

use axum::{
    async_trait,
    extract::{rejection::QueryRejection, FromRequest, Path, Query, Request, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ControlError;
use crate::metadata::{
    Project, ProjectSettings, ProjectStatus, QueryResult, RegistryStats, Shard, ShardStatus,
};
use crate::ShardCtl;

/// Longest a watch request may block
const MAX_WATCH_WAIT: Duration = Duration::from_secs(60);

/// HTTP API service
pub struct HttpApi {
    ctl: Arc<ShardCtl>,
}

impl HttpApi {
    /// Create HTTP API
    pub fn new(ctl: Arc<ShardCtl>) -> Self {
        Self { ctl }
    }

    /// Create router
    pub fn router(self) -> Router {
        let ctl = self.ctl;

        Router::new()
            // Projects
            .route("/api/v1/projects", get(list_projects).post(create_project))
            .route("/api/v1/projects/:project_id", get(get_project))
            .route("/api/v1/projects/:project_id/settings", put(update_settings))
            .route("/api/v1/projects/:project_id/status", put(set_project_status))

            // Shards
            .route(
                "/api/v1/projects/:project_id/shards",
                get(list_shards).post(create_shard),
            )
            .route("/api/v1/shards/:shard_id", get(get_shard))
            .route("/api/v1/shards/:shard_id/status", put(set_shard_status))

            // Queries
            .route("/api/v1/projects/:project_id/query", post(run_query))

            // Registry
            .route("/api/v1/stats", get(get_stats))
            .route("/api/v1/watch", get(watch_registry))

            .with_state(ctl)
    }
}

// ==================== Response types ====================

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    fn err(msg: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        })
    }
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    (StatusCode::OK, ApiResponse::ok(data))
}

fn created<T: Serialize>(data: T) -> ApiResult<T> {
    (StatusCode::CREATED, ApiResponse::ok(data))
}

fn status_code(e: &ControlError) -> StatusCode {
    match e {
        ControlError::Validation(_) => StatusCode::BAD_REQUEST,
        ControlError::NotFound { .. } => StatusCode::NOT_FOUND,
        ControlError::NoAvailableShard(_) => StatusCode::SERVICE_UNAVAILABLE,
        ControlError::Dispatch { .. } => StatusCode::BAD_GATEWAY,
        ControlError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn fail<T: Serialize>(e: ControlError) -> ApiResult<T> {
    (status_code(&e), ApiResponse::err(e.to_string()))
}

/// Undecodable body or query string, kept in the envelope
fn rejected<T: Serialize>(status: StatusCode, detail: String) -> ApiResult<T> {
    (status, ApiResponse::err(detail))
}

/// JSON body extractor that reports decode failures in the envelope
struct ApiJson<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiResult<()>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(e) => Err(rejected(e.status(), e.body_text())),
        }
    }
}

/// Save after a mutation; the periodic save retries on failure
async fn persist(ctl: &ShardCtl) {
    if let Err(e) = ctl.save().await {
        warn!("Failed to save registry: {}", e);
    }
}

// ==================== Request types ====================

#[derive(Deserialize)]
struct CreateProjectRequest {
    name: String,
    connection_string: String,
}

#[derive(Deserialize)]
struct UpdateSettingsRequest {
    /// New primary connection string (unchanged if omitted)
    connection_string: Option<String>,
    settings: ProjectSettings,
}

#[derive(Deserialize)]
struct ProjectStatusRequest {
    status: ProjectStatus,
}

#[derive(Deserialize)]
struct CreateShardRequest {
    hostname: String,
    /// Wider than u16 so out-of-range ports get a validation error
    port: u32,
    database: String,
}

#[derive(Deserialize)]
struct ShardStatusRequest {
    status: ShardStatus,
}

#[derive(Deserialize)]
struct RunQueryRequest {
    sql: String,
    /// Run on this shard only (all online shards if omitted)
    shard_id: Option<String>,
    /// Deadline in milliseconds (server default if omitted)
    timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
struct WatchParams {
    /// Version the client already has
    version: u64,
    /// How long to wait for a newer version
    timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct WatchResult {
    version: u64,
    changed: bool,
}

// ==================== Handlers ====================

// Projects
async fn list_projects(State(ctl): State<Arc<ShardCtl>>) -> ApiResult<Vec<Project>> {
    ok(ctl.registry().list_projects().await)
}

async fn create_project(
    State(ctl): State<Arc<ShardCtl>>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> ApiResult<Project> {
    match ctl
        .registry()
        .create_project(&req.name, &req.connection_string)
        .await
    {
        Ok(project) => {
            persist(&ctl).await;
            created(project)
        }
        Err(e) => fail(e),
    }
}

async fn get_project(
    State(ctl): State<Arc<ShardCtl>>,
    Path(project_id): Path<String>,
) -> ApiResult<Project> {
    match ctl.registry().get_project(&project_id).await {
        Ok(project) => ok(project),
        Err(e) => fail(e),
    }
}

async fn update_settings(
    State(ctl): State<Arc<ShardCtl>>,
    Path(project_id): Path<String>,
    ApiJson(req): ApiJson<UpdateSettingsRequest>,
) -> ApiResult<Project> {
    match ctl
        .registry()
        .update_project_settings(&project_id, req.connection_string.as_deref(), req.settings)
        .await
    {
        Ok(project) => {
            persist(&ctl).await;
            ok(project)
        }
        Err(e) => fail(e),
    }
}

async fn set_project_status(
    State(ctl): State<Arc<ShardCtl>>,
    Path(project_id): Path<String>,
    ApiJson(req): ApiJson<ProjectStatusRequest>,
) -> ApiResult<Project> {
    match ctl.registry().set_project_status(&project_id, req.status).await {
        Ok(project) => {
            persist(&ctl).await;
            ok(project)
        }
        Err(e) => fail(e),
    }
}

// Shards
async fn list_shards(
    State(ctl): State<Arc<ShardCtl>>,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<Shard>> {
    match ctl.registry().project_with_shards(&project_id).await {
        Ok((_, shards)) => ok(shards),
        Err(e) => fail(e),
    }
}

async fn create_shard(
    State(ctl): State<Arc<ShardCtl>>,
    Path(project_id): Path<String>,
    ApiJson(req): ApiJson<CreateShardRequest>,
) -> ApiResult<Shard> {
    info!(
        "Creating shard for project {}: {}:{}/{}",
        project_id, req.hostname, req.port, req.database
    );

    match ctl
        .registry()
        .create_shard(&project_id, &req.hostname, req.port, &req.database)
        .await
    {
        Ok(shard) => {
            persist(&ctl).await;
            created(shard)
        }
        Err(e) => fail(e),
    }
}

async fn get_shard(
    State(ctl): State<Arc<ShardCtl>>,
    Path(shard_id): Path<String>,
) -> ApiResult<Shard> {
    match ctl.registry().get_shard(&shard_id).await {
        Ok(shard) => ok(shard),
        Err(e) => fail(e),
    }
}

async fn set_shard_status(
    State(ctl): State<Arc<ShardCtl>>,
    Path(shard_id): Path<String>,
    ApiJson(req): ApiJson<ShardStatusRequest>,
) -> ApiResult<Shard> {
    match ctl.registry().set_shard_status(&shard_id, req.status).await {
        Ok(shard) => {
            persist(&ctl).await;
            ok(shard)
        }
        Err(e) => fail(e),
    }
}

// Queries
async fn run_query(
    State(ctl): State<Arc<ShardCtl>>,
    Path(project_id): Path<String>,
    ApiJson(req): ApiJson<RunQueryRequest>,
) -> ApiResult<QueryResult> {
    let router = ctl.router();
    let shard_id = req.shard_id.as_deref();

    let outcome = match req.timeout_ms {
        Some(0) => Err(ControlError::Validation("timeout_ms must be > 0".to_string())),
        Some(ms) => {
            router
                .run_query_with_timeout(&project_id, &req.sql, shard_id, Duration::from_millis(ms))
                .await
        }
        None => router.run_query(&project_id, &req.sql, shard_id).await,
    };

    match outcome {
        Ok(result) => ok(result),
        Err(e) => {
            let status = status_code(&e);
            let message = e.to_string();
            let response = ApiResponse {
                success: false,
                data: Some(QueryResult::failed(message.clone(), 0.0)),
                error: Some(message),
            };
            (status, Json(response))
        }
    }
}

// Registry
async fn get_stats(State(ctl): State<Arc<ShardCtl>>) -> ApiResult<RegistryStats> {
    ok(ctl.registry().stats().await)
}

async fn watch_registry(
    State(ctl): State<Arc<ShardCtl>>,
    params: Result<Query<WatchParams>, QueryRejection>,
) -> ApiResult<WatchResult> {
    let Query(params) = match params {
        Ok(params) => params,
        Err(e) => return rejected(e.status(), e.body_text()),
    };
    let registry = ctl.registry();
    let current = registry.version().await;
    if params.version > current {
        return fail(ControlError::Validation(format!(
            "version {} is ahead of the registry (current {})",
            params.version, current
        )));
    }

    let wait = params
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(MAX_WATCH_WAIT)
        .min(MAX_WATCH_WAIT);
    let version = registry.watcher().wait_newer(params.version, wait).await;

    ok(WatchResult {
        version,
        changed: version > params.version,
    })
}
