//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (rate limiting, timeout, request ID, tracing)
//! - Bind server to listener
//! - Run the idle sweeper alongside the server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{policy_from_config, validate_config, AppConfig, ConfigError};
use crate::http::error::ApiError;
use crate::http::healthcheck::{healthcheck, AppInfo};
use crate::http::request::X_REQUEST_ID;
use crate::security::admission::AdmissionController;
use crate::security::clock::{Clock, SystemClock};
use crate::security::rate_limit::{with_rate_limit, RateLimitState};
use crate::security::sweeper::IdleSweeper;

/// Versioned API routes.
pub fn api_routes(info: AppInfo) -> Router {
    Router::new()
        .route("/v1/healthcheck", get(healthcheck))
        .with_state(info)
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Not Found")
}

/// Give the bare 408 produced by the timeout layer the uniform error body.
async fn timeout_body(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT
        && !response.headers().contains_key(CONTENT_TYPE)
    {
        return ApiError::new(StatusCode::REQUEST_TIMEOUT, "Request Timeout").into_response();
    }
    response
}

/// Stack the service middleware around `api`.
///
/// The rate limiter sits closest to the handlers; request ID, tracing and
/// the request timeout wrap it from the outside. Unmatched paths answer 404
/// with the usual `{"detail": ...}` body.
#[allow(deprecated)]
pub fn build_router(config: &AppConfig, api: Router, limiter: Option<RateLimitState>) -> Router {
    let api = api.fallback(route_not_found);
    let api = match limiter {
        Some(state) => with_rate_limit(api, state),
        None => api,
    };

    let x_request_id = HeaderName::from_static(X_REQUEST_ID);
    api.layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(map_response(timeout_body))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
}

/// HTTP server for the movies API.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    limiter: Option<RateLimitState>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Invalid configuration (including a non-positive rate limit policy) is
    /// rejected here, before any request is served.
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), reading admission time from `clock`.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let limiter = if config.rate_limit.enabled {
            let policy = policy_from_config(&config.rate_limit)
                .map_err(|e| ConfigError::Validation(vec![e]))?;
            tracing::info!(
                max_calls = policy.max_calls(),
                period = ?policy.period(),
                "Rate limiting enabled"
            );
            let controller = Arc::new(AdmissionController::new(policy));
            Some(RateLimitState::new(controller, clock))
        } else {
            tracing::warn!("Rate limiting disabled");
            None
        };

        let api = api_routes(AppInfo::new(config.app.environment.clone()));
        let router = build_router(&config, api, limiter.clone());

        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The admission controller, if rate limiting is enabled.
    pub fn controller(&self) -> Option<Arc<AdmissionController>> {
        self.limiter.as_ref().map(|state| state.controller.clone())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(state) = &self.limiter {
            let rate_limit = &self.config.rate_limit;
            IdleSweeper::new(
                state.controller.clone(),
                state.clock.clone(),
                Duration::from_secs(rate_limit.sweep_interval_secs),
                Duration::from_secs(rate_limit.idle_retention_secs),
            )
            .spawn(shutdown.resubscribe());
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
