//! # Ringling HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Row counts
//! - `POST /v1/parameter_sets` - Register a parameter set
//! - `GET /v1/parameter_sets` - List parameter sets (`project_id`, `active_at`, `limit`)
//! - `GET /v1/parameter_sets/{id}` - Fetch a parameter set
//! - `PUT|PATCH /v1/parameter_sets/{id}` - Replace its activation window
//! - `GET /v1/projects/{project_id}/active_parameter_set` - Active set (`at`)
//! - `POST /v1/trained_models` - Register a trained model
//! - `GET /v1/trained_models` - List model summaries
//! - `GET /v1/trained_models/{id}` - Fetch a model with its artifact
//! - `PUT /v1/trained_models/{id}/backtest` - Record backtest results
//! - `PATCH /v1/trained_models/{id}` - Change deployment stage
//!
//! ## Security Configuration
//!
//! See [`crate::config::ApiConfig`]: CORS origins (default localhost only),
//! global rate limit (default 100 rps) and request body limit.

mod error;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use (integration tests go through `ringling::api::*`)
pub use error::{ApiError, status_for};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    ActiveParameterSetQuery, CreateParameterSetRequest, CreateParameterSetResponse,
    CreateTrainedModelRequest, CreateTrainedModelResponse, ErrorResponse, HealthResponse,
    ListParameterSetsQuery, ListTrainedModelsQuery, ParameterSetListResponse,
    ParameterSetResponse, PromoteRequest, RecordBacktestRequest, StatusResponse,
    TrainedModelListResponse, TrainedModelResponse, TrainedModelSummary,
    UpdateActivationRequest, decode_model_object,
};

use crate::config::{ApiConfig, Config};
use crate::error::AppError;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use ringling_core::{RegistryService, StorageBackend};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the registry.
#[derive(Clone)]
pub struct AppState {
    /// Both registries over the configured store.
    pub registry: RegistryService<StorageBackend>,
}

impl AppState {
    /// Create new app state over a store.
    #[must_use]
    pub fn new(store: StorageBackend) -> Self {
        Self {
            registry: RegistryService::new(store),
        }
    }

    /// Name of the backing store, as reported by `/status`.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        if self.registry.store().is_persistent() {
            "redb"
        } else {
            "memory"
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::OPTIONS,
];

/// Build the CORS layer from `[api] cors_origins`.
///
/// - `["*"]`: allows all origins
/// - empty: localhost only
/// - otherwise: the listed origins (invalid entries are skipped)
fn build_cors_layer(api: &ApiConfig) -> CorsLayer {
    match api.cors_origins.as_slice() {
        [] => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
        [wildcard] if wildcard == "*" => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        origins => {
            let allowed_origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", origin);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8888",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8888",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - protects against floods (if enabled)
pub fn create_router(state: AppState, api: &ApiConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/v1/parameter_sets",
            post(handlers::create_parameter_set_handler).get(handlers::list_parameter_sets_handler),
        )
        .route(
            "/v1/parameter_sets/{id}",
            get(handlers::get_parameter_set_handler)
                .put(handlers::update_parameter_set_handler)
                .patch(handlers::update_parameter_set_handler),
        )
        .route(
            "/v1/projects/{project_id}/active_parameter_set",
            get(handlers::active_parameter_set_handler),
        )
        .route(
            "/v1/trained_models",
            post(handlers::create_trained_model_handler).get(handlers::list_trained_models_handler),
        )
        .route(
            "/v1/trained_models/{id}",
            get(handlers::get_trained_model_handler).patch(handlers::promote_trained_model_handler),
        )
        .route(
            "/v1/trained_models/{id}/backtest",
            put(handlers::record_backtest_handler),
        );

    match create_rate_limiter(api.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", api.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(api))
                .layer(axum::extract::DefaultBodyLimit::max(api.body_limit_bytes)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(config: &Config, store: StorageBackend) -> Result<(), AppError> {
    let router = create_router(AppState::new(store), &config.api);
    let addr = config.server.addr();

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("bind {} failed: {}", addr, e),
        ))
    })?;

    tracing::info!("Ringling HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Ringling HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
