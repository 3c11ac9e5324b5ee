//! API server.
//!
//! Thin HTTP layer over the session, search, and download components.
//! Handlers only map requests and responses; orchestration lives in the
//! component modules.
//!
//! # Endpoints
//!
//! - `POST /search/soulseek` - Start a network search
//! - `GET /search/soulseek/results/:token` - Poll ranked results
//! - `POST /download` - Start a download
//! - `GET /download-status/:username/*file_path` - Poll one transfer
//! - `GET /downloads/status` - All downloads plus system status
//! - `POST /download/cancel/*download_id` - Cancel a download
//! - `GET /health` - Health check

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::download::{DownloadId, DownloadManager, DownloadOverview, DownloadStatus};
use crate::errors::UserError;
use crate::gateway::SlskdClient;
use crate::library::MetadataStore;
use crate::search::{FileCandidate, SearchError, SearchOrchestrator, SearchToken};
use crate::session::Session;

/// Maximum request body size (1MB).
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server state shared across handlers.
pub struct AppState {
    pub session: Arc<Session>,
    pub search: Arc<SearchOrchestrator>,
    pub downloads: Arc<DownloadManager>,
    pub metadata: Arc<MetadataStore>,
    gateway: SlskdClient,
}

/// API server.
pub struct Server {
    port: u16,
    bind_address: String,
    state: Arc<AppState>,
}

impl Server {
    /// Build the component graph from configuration. Binds to localhost
    /// on port 8000 unless overridden.
    pub fn new(config: &Config) -> Self {
        let gateway = SlskdClient::with_url(&config.slskd_url, &config.slskd_api_key);
        let metadata = Arc::new(MetadataStore::new());
        let state = Arc::new(AppState {
            session: Arc::new(Session::new(gateway.clone(), config.username.clone())),
            search: Arc::new(SearchOrchestrator::new(gateway.clone())),
            downloads: Arc::new(DownloadManager::new(gateway.clone(), Arc::clone(&metadata))),
            metadata,
            gateway,
        });

        Self {
            port: 8000,
            bind_address: "127.0.0.1".to_string(),
            state,
        }
    }

    /// Set the port to listen on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind address. Use "0.0.0.0" to allow network access,
    /// "127.0.0.1" (default) for localhost only.
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = addr.into();
        self
    }

    /// Shared component state, for startup tasks outside the router.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Build the router with all routes.
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/search/soulseek", post(start_search_handler))
            .route("/search/soulseek/results/:token", get(search_results_handler))
            .route("/download", post(start_download_handler))
            .route(
                "/download-status/:username/*file_path",
                get(download_status_handler),
            )
            .route("/downloads/status", get(all_downloads_handler))
            .route("/download/cancel/*download_id", post(cancel_download_handler))
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            // The desktop UI is served from another origin.
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server with graceful shutdown.
    pub async fn start(&self) -> Result<()> {
        let router = self.build_router();
        let addr = format!("{}:{}", self.bind_address, self.port);

        tracing::info!("Starting server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Search request: either artist and song for a targeted search, or a raw
/// query string.
#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    song: Option<String>,
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct SearchStartResponse {
    search_token: Option<SearchToken>,
    actual_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancelled: Option<bool>,
}

#[derive(Serialize)]
struct SearchResultsResponse {
    results: Vec<FileCandidate>,
    is_complete: bool,
    result_count: usize,
    actual_query: String,
}

#[derive(Debug, Deserialize)]
struct DownloadRequest {
    username: String,
    file_path: String,
    size: u64,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Serialize)]
struct DownloadStartResponse {
    message: &'static str,
    download_id: String,
}

#[derive(Serialize)]
struct SystemStatus {
    backend_status: &'static str,
    soulseek_status: &'static str,
    soulseek_username: Option<String>,
    active_uploads: usize,
    active_downloads: usize,
}

#[derive(Serialize)]
struct AllDownloadsResponse {
    downloads: Vec<DownloadOverview>,
    system_status: SystemStatus,
}

#[derive(Serialize)]
struct CancelResponse {
    message: &'static str,
    download_id: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    gateway_status: &'static str,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler. Reports degraded when the gateway is unreachable.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let gateway_status = match state.gateway.server_state().await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };

    Json(HealthResponse {
        status: if gateway_status == "ok" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        gateway_status,
    })
}

/// Start a search. Returns the token immediately; results are pulled
/// separately.
async fn start_search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchStartResponse>, UserError> {
    if !state.session.is_logged_in() {
        return Err(UserError::not_connected());
    }

    match state
        .search
        .search(
            request.artist.as_deref(),
            request.song.as_deref(),
            &request.query,
        )
        .await
    {
        Ok(started) => Ok(Json(SearchStartResponse {
            search_token: started.token,
            actual_query: started.effective_query,
            cancelled: None,
        })),
        Err(SearchError::Cancelled) => Ok(Json(SearchStartResponse {
            search_token: None,
            actual_query: String::new(),
            cancelled: Some(true),
        })),
    }
}

/// Poll the ranked results for a token.
async fn search_results_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<u64>,
) -> Json<SearchResultsResponse> {
    let pulled = state.search.results(SearchToken(token));
    Json(SearchResultsResponse {
        results: pulled.results,
        is_complete: pulled.is_complete,
        result_count: pulled.result_count,
        actual_query: pulled.actual_query,
    })
}

/// Start a download of exactly one file from a user.
async fn start_download_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DownloadRequest>,
) -> Result<Json<DownloadStartResponse>, UserError> {
    if !state.session.is_logged_in() {
        return Err(UserError::not_connected());
    }

    let id = state
        .downloads
        .download(
            &request.username,
            &request.file_path,
            request.size,
            request.metadata,
        )
        .await
        .map_err(|e| UserError::dispatch_failure("Failed to start download", &e))?;

    Ok(Json(DownloadStartResponse {
        message: "Download started",
        download_id: id.to_string(),
    }))
}

/// Poll the status of one transfer.
async fn download_status_handler(
    State(state): State<Arc<AppState>>,
    Path((username, file_path)): Path<(String, String)>,
) -> Json<DownloadStatus> {
    Json(state.downloads.status(&username, &file_path))
}

/// All downloads joined with their status, plus a system snapshot.
async fn all_downloads_handler(State(state): State<Arc<AppState>>) -> Json<AllDownloadsResponse> {
    let downloads = state.downloads.list_all();
    let logged_in = state.session.is_logged_in();

    let system_status = SystemStatus {
        backend_status: "Online",
        soulseek_status: if logged_in { "Connected" } else { "Disconnected" },
        soulseek_username: logged_in.then(|| state.session.username().to_string()),
        active_uploads: 0,
        active_downloads: state.downloads.active_count(),
    };

    Json(AllDownloadsResponse {
        downloads,
        system_status,
    })
}

/// Cancel a download by composite id.
async fn cancel_download_handler(
    State(state): State<Arc<AppState>>,
    Path(download_id): Path<String>,
) -> Result<Json<CancelResponse>, UserError> {
    let id: DownloadId = download_id
        .parse()
        .map_err(|_| UserError::invalid_request("Invalid download ID format"))?;

    state.downloads.cancel(&id).await;

    Ok(Json(CancelResponse {
        message: "Download cancelled",
        download_id: id.to_string(),
    }))
}

// =============================================================================
// Utilities
// =============================================================================

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_server() -> Server {
        let config = Config {
            slskd_url: "http://127.0.0.1:1".to_string(),
            ..Config::default()
        };
        Server::new(&config)
    }

    #[test]
    fn server_defaults() {
        let server = test_server();
        assert_eq!(server.port(), 8000);
        assert_eq!(server.bind_address, "127.0.0.1");
    }

    #[test]
    fn server_builder_overrides() {
        let server = test_server().with_port(9000).with_bind_address("0.0.0.0");
        assert_eq!(server.port(), 9000);
        assert_eq!(server.bind_address, "0.0.0.0");
    }

    #[tokio::test]
    async fn router_builds() {
        let _router = test_server().build_router();
    }

    #[tokio::test]
    async fn search_rejected_when_logged_out() {
        let server = test_server();
        let state = server.state();
        let result = start_search_handler(
            State(state),
            Json(SearchRequest {
                artist: None,
                song: None,
                query: "anything".to_string(),
            }),
        )
        .await;
        let err = result.err().expect("expected a not-connected rejection");
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn cancel_rejects_malformed_id() {
        let server = test_server();
        let result =
            cancel_download_handler(State(server.state()), Path("no-colon".to_string())).await;
        let err = result.err().expect("expected a malformed-id rejection");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_accepts_unknown_but_well_formed_id() {
        let server = test_server();
        let result = cancel_download_handler(
            State(server.state()),
            Path("ghost:Music\\gone.mp3".to_string()),
        )
        .await;
        let response = result.expect("cancel of an unknown id is a no-op");
        assert_eq!(response.0.download_id, "ghost:Music\\gone.mp3");
    }
}
