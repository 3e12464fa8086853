//! REST API server for the ledger explorer
//!
//! Serves recent blocks, address histories, transfer verification and
//! transaction details under `/api/blocks`, plus a sidecar block range
//! pass-through, health and request statistics.

use axum::{
    extract::{Path, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ScanConfig;
use crate::cursor::BlockDescriptor;
use crate::error::LedgerError;
use crate::finder::{TransactionFinder, TransactionVerifier};
use crate::indexer::TransactionIndexer;
use crate::ledger::{BlockHeader, LedgerClient};
use crate::reporter::RecentBlocksReporter;
use crate::sidecar::{SidecarClient, DEFAULT_RANGE_END, DEFAULT_RANGE_START};
use crate::transaction::{TransactionDetail, TransactionRecord, VerificationResult};

const DEFAULT_API_PORT: u16 = 3000;

/// Shared server context: the query services over one ledger client.
#[derive(Clone)]
pub struct Explorer {
    indexer: TransactionIndexer,
    finder: TransactionFinder,
    verifier: TransactionVerifier,
    reporter: RecentBlocksReporter,
    sidecar: Option<SidecarClient>,
    recent_blocks: u64,
    api_stats: Arc<RwLock<ApiStats>>,
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    verifications: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl Explorer {
    pub fn new(client: Arc<dyn LedgerClient>, scan: &ScanConfig) -> Self {
        let finder = TransactionFinder::new(client.clone());

        Self {
            indexer: TransactionIndexer::new(client.clone(), scan.transaction_cap),
            verifier: TransactionVerifier::new(finder.clone()),
            finder,
            reporter: RecentBlocksReporter::new(client, scan.header_depth),
            sidecar: None,
            recent_blocks: scan.recent_blocks,
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }

    /// Enable the block range pass-through.
    pub fn with_sidecar(mut self, sidecar: SidecarClient) -> Self {
        self.sidecar = Some(sidecar);
        self
    }

    /// Get API statistics
    pub async fn get_stats(&self) -> ApiStatsResponse {
        let stats = self.api_stats.read().await;
        let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

        ApiStatsResponse {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            verifications: stats.verifications,
            uptime_seconds: uptime,
            transaction_cap: self.indexer.cap(),
            header_depth: self.reporter.header_depth(),
            sidecar_enabled: self.sidecar.is_some(),
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    LedgerError(LedgerError),
    InvalidInput(String),
    NotFound(String),
    /// The sidecar could not serve the request.
    Upstream(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::LedgerError(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => message_body(StatusCode::NOT_FOUND, msg),
            ApiError::Upstream(msg) => message_body(StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::InternalError(msg) => error_body(StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::LedgerError(err)
    }
}

fn error_body(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn message_body(status: StatusCode, message: String) -> Response {
    (status, Json(MessageResponse { message })).into_response()
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub verifications: u64,
    pub uptime_seconds: u64,
    pub transaction_cap: usize,
    pub header_depth: u64,
    pub sidecar_enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTransactionRequest {
    pub transaction_hash: Option<String>,
    pub sender_address: Option<String>,
    pub receiver_address: Option<String>,
}

impl VerifyTransactionRequest {
    /// The three fields, or `None` if any is absent or empty.
    fn fields(&self) -> Option<(&str, &str, &str)> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|v| !v.is_empty())
        }
        Some((
            present(&self.transaction_hash)?,
            present(&self.sender_address)?,
            present(&self.receiver_address)?,
        ))
    }
}

#[derive(Deserialize)]
struct RangeQuery {
    #[serde(default = "default_limit1")]
    limit1: u64,
    #[serde(default = "default_limit2")]
    limit2: u64,
}

fn default_limit1() -> u64 {
    DEFAULT_RANGE_START
}
fn default_limit2() -> u64 {
    DEFAULT_RANGE_END
}

// ============================================================================
// Middleware
// ============================================================================

/// Request statistics middleware
async fn stats_middleware(
    State(explorer): State<Arc<Explorer>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    let mut stats = explorer.api_stats.write().await;
    stats.record_request(success);

    response
}

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the API router with all endpoints
pub fn build_api_router(explorer: Arc<Explorer>) -> Router {
    // `/blocks` and `/blocks/` both serve the sidecar range
    let api_routes = Router::new()
        .route("/blocks", get(get_block_range))
        .route("/blocks/", get(get_block_range))
        .route("/blocks/latest-blocks", get(get_latest_blocks))
        .route("/blocks/headers", get(get_headers))
        .route(
            "/blocks/latest-transactions/:address",
            get(get_latest_transactions),
        )
        .route("/blocks/verify-transaction", post(verify_transaction))
        .route(
            "/blocks/transaction-details/:hash/:sender",
            get(get_transaction_details),
        )
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats));

    Router::new()
        .nest("/api", api_routes)
        .route("/ping", get(ping))
        // logging before stats so timing covers the stats update
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(
            explorer.clone(),
            stats_middleware,
        ))
        .with_state(explorer)
        .layer(cors_layer())
}

/// Serve the API on `port` (or `PORT`, or 3000) until the process stops.
pub async fn run_api_server(
    explorer: Arc<Explorer>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(explorer);

    let port = port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_API_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn ping() -> &'static str {
    "pong"
}

async fn health_check(State(explorer): State<Arc<Explorer>>) -> impl IntoResponse {
    match explorer.reporter.recent(1).await {
        Ok(blocks) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "head": blocks.first().map(|b| b.number),
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        ),
    }
}

async fn get_latest_blocks(
    State(explorer): State<Arc<Explorer>>,
) -> Result<Json<Vec<BlockDescriptor>>, ApiError> {
    let blocks = explorer.reporter.recent(explorer.recent_blocks).await?;
    Ok(Json(blocks))
}

async fn get_headers(
    State(explorer): State<Arc<Explorer>>,
) -> Result<Json<Vec<BlockHeader>>, ApiError> {
    let headers = explorer.reporter.headers().await?;
    Ok(Json(headers))
}

async fn get_latest_transactions(
    State(explorer): State<Arc<Explorer>>,
    Path(address): Path<String>,
) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    let records = explorer.indexer.list_for_address(&address).await?;
    Ok(Json(records))
}

async fn verify_transaction(
    State(explorer): State<Arc<Explorer>>,
    payload: Option<Json<VerifyTransactionRequest>>,
) -> Result<Json<VerificationResult>, ApiError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let (hash, sender, receiver) = request
        .fields()
        .ok_or_else(|| ApiError::InvalidInput("Missing required fields".to_string()))?;

    explorer.api_stats.write().await.verifications += 1;
    Ok(Json(explorer.verifier.verify(hash, sender, receiver).await))
}

async fn get_transaction_details(
    State(explorer): State<Arc<Explorer>>,
    Path((hash, sender)): Path<(String, String)>,
) -> Result<Json<TransactionDetail>, ApiError> {
    match explorer.finder.details_for(&sender, &hash).await {
        Ok(Some(detail)) => Ok(Json(detail)),
        Ok(None) => Err(ApiError::NotFound(
            "Transaction not found or does not match sender address".to_string(),
        )),
        Err(e) => {
            tracing::error!(%hash, %sender, error = %e, "Error fetching transaction details");
            Err(ApiError::InternalError("Internal server error".to_string()))
        }
    }
}

async fn get_block_range(
    State(explorer): State<Arc<Explorer>>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sidecar = explorer
        .sidecar
        .as_ref()
        .ok_or_else(|| ApiError::Upstream("API_SIDECAR_URL is not configured".to_string()))?;

    sidecar
        .fetch_block_range(range.limit1, range.limit2)
        .await
        .map(Json)
        .map_err(|e| ApiError::Upstream(e.to_string()))
}

async fn get_api_stats(State(explorer): State<Arc<Explorer>>) -> impl IntoResponse {
    let stats = explorer.get_stats().await;
    Json(stats)
}
