//! HTTP server setup and API handlers.
//!
//! # Responsibilities
//! - Create the Axum router with API, admin, and static-file routes
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Serve plain HTTP or TLS depending on config
//! - Apply configuration reloads via atomic state swap
//! - Map chain errors into the JSON error envelope

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::chain::client::RpcGateway;
use crate::chain::types::ChainResult;
use crate::chain::wallet::DonationSigner;
use crate::config::GatewayConfig;
use crate::donation::service::DonationService;
use crate::donation::types::DonationOutcome;
use crate::http::request::request_id_middleware;
use crate::http::response::ApiError;
use crate::ranking::cache::LeaderboardCache;
use crate::ranking::scanner::LeaderboardScanner;

/// Everything a handler needs, swapped atomically on config reload.
pub struct AppInner {
    pub config: GatewayConfig,
    pub gateway: RpcGateway,
    pub service: Arc<DonationService>,
    pub scanner: LeaderboardScanner,
    pub cache: Arc<LeaderboardCache>,
    pub request_count: AtomicUsize,
}

impl AppInner {
    /// Build the subsystem graph from a validated config.
    ///
    /// The cache is threaded through reloads so a config tweak does not
    /// throw away the current leaderboard snapshot.
    pub fn build(
        config: GatewayConfig,
        signer: Arc<dyn DonationSigner>,
        cache: Arc<LeaderboardCache>,
    ) -> ChainResult<Self> {
        let gateway = RpcGateway::new(config.chain.clone());
        let service = DonationService::new(
            gateway.clone(),
            signer,
            config.retries.clone(),
            config.donation.clone(),
        )?;
        let scanner = LeaderboardScanner::new(
            gateway.clone(),
            service.donation_ata(),
            service.mint(),
            config.donation.token_decimals,
            config.leaderboard.clone(),
        );

        Ok(Self {
            config,
            gateway,
            service: Arc::new(service),
            scanner,
            cache,
            request_count: AtomicUsize::new(0),
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<AppInner>>,
}

/// HTTP server for the donation gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    signer: Arc<dyn DonationSigner>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig, signer: Arc<dyn DonationSigner>) -> ChainResult<Self> {
        let cache = Arc::new(LeaderboardCache::new(config.leaderboard.cache_ttl_secs));
        let inner = AppInner::build(config, signer.clone(), cache)?;
        let state = AppState {
            inner: Arc::new(ArcSwap::from_pointee(inner)),
        };
        let router = Self::build_router(state.clone());

        Ok(Self {
            router,
            state,
            signer,
        })
    }

    /// The shared application state (used by background tasks).
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let config = state.inner.load().config.clone();

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/api/progress", get(progress_handler))
            .route("/api/wallet", get(wallet_handler))
            .route("/api/balance/{address}", get(balance_handler))
            .route("/api/leaderboard", get(leaderboard_handler))
            .route("/api/donate", post(donate_handler));

        if config.admin.enabled {
            router = router.merge(crate::admin::admin_router(state.clone()));
        }

        let mut router = router
            .with_state(state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(middleware::from_fn_with_state(state, count_request))
            .layer(TraceLayer::new_for_http());

        if let Some(dir) = &config.listener.static_dir {
            let index = std::path::Path::new(dir).join("index.html");
            router = router
                .fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
        }

        router
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Config updates arriving on `config_updates` are applied via
    /// atomic swap; invalid rebuilds are rejected and logged.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reload_state = self.state.clone();
        let reload_signer = self.signer.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let cache = reload_state.inner.load().cache.clone();
                match AppInner::build(new_config, reload_signer.clone(), cache) {
                    Ok(inner) => {
                        reload_state.inner.store(Arc::new(inner));
                        tracing::info!("Configuration reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected configuration reload");
                    }
                }
            }
        });

        let tls = self.state.inner.load().config.listener.tls.clone();
        match tls {
            Some(tls) => {
                let rustls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    &tls.cert_path,
                    &tls.key_path,
                )
                .await
                .map_err(|e| std::io::Error::other(format!("TLS setup failed: {}", e)))?;

                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                axum::serve(listener, self.router.into_make_service())
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Middleware: count requests for the admin status endpoint.
async fn count_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state
        .inner
        .load()
        .request_count
        .fetch_add(1, Ordering::Relaxed);
    next.run(request).await
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let inner = state.inner.load_full();
    let chain_reachable = inner.gateway.is_healthy().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "chain_reachable": chain_reachable,
    }))
}

async fn progress_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let inner = state.inner.load_full();
    let report = inner.service.progress().await?;
    Ok(Json(report))
}

async fn wallet_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let inner = state.inner.load_full();
    let balance = inner.service.wallet_balance().await?;
    Ok(Json(json!({
        "address": inner.service.wallet_address().to_string(),
        "balance": balance,
    })))
}

async fn balance_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let owner: Pubkey = address
        .parse()
        .map_err(|_| ApiError::bad_request("INVALID_ADDRESS", "Not a valid account address"))?;

    let inner = state.inner.load_full();
    let balance = inner.service.token_balance(&owner).await?;
    Ok(Json(json!({
        "address": address,
        "balance": balance,
    })))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    #[serde(default)]
    refresh: bool,
}

async fn leaderboard_handler(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let inner = state.inner.load_full();
    let snapshot = inner
        .cache
        .get_or_refresh(&inner.scanner, query.refresh)
        .await?;
    Ok(Json(snapshot.as_ref().clone()))
}

#[derive(Debug, Deserialize)]
struct DonateRequest {
    amount: f64,
}

async fn donate_handler(
    State(state): State<AppState>,
    Json(request): Json<DonateRequest>,
) -> Response {
    let inner = state.inner.load_full();
    let symbol = inner.config.donation.token_symbol.clone();

    match inner.service.donate(request.amount).await {
        Ok(DonationOutcome::Confirmed { signature, amount }) => Json(json!({
            "status": "confirmed",
            "signature": signature,
            "amount": amount,
            "message": format!("Successfully donated {} {}!", amount, symbol),
        }))
        .into_response(),
        Ok(DonationOutcome::Cancelled) => (
            StatusCode::OK,
            Json(json!({
                "status": "cancelled",
                "severity": "info",
                "message": "Transaction cancelled",
            })),
        )
            .into_response(),
        Err(e) => {
            // Normalized at the boundary: cancellation never reaches
            // here, everything else picks its envelope from the code.
            ApiError::from(e).into_response()
        }
    }
}
