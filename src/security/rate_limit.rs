//! Rate limiting middleware.
//!
//! Puts an [`AdmissionController`] in front of a router. Rejected requests
//! never reach the handlers; admitted ones are forwarded and their response
//! is returned as-is. A panic raised downstream is turned into a `500` so it
//! cannot escape the pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::FutureExt;

use crate::http::error::ApiError;
use crate::http::request::client_key;
use crate::observability::metrics;
use crate::security::admission::{AdmissionController, Decision};
use crate::security::clock::Clock;

/// State shared by every invocation of [`rate_limit_middleware`].
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub controller: Arc<AdmissionController>,
    pub clock: Arc<dyn Clock>,
}

impl RateLimitState {
    pub fn new(controller: Arc<AdmissionController>, clock: Arc<dyn Clock>) -> Self {
        Self { controller, clock }
    }
}

/// Wrap every route of `router` with the rate limiter.
pub fn with_rate_limit(router: Router, state: RateLimitState) -> Router {
    router.layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

/// Middleware function for per-client admission control.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = state.controller.admit(&key, state.clock.now());
    metrics::record_admission(decision);

    if decision == Decision::Reject {
        tracing::warn!(client = %key, "Rate limit exceeded");
        return ApiError::TooManyRequests.into_response();
    }

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("non-string panic payload");
            tracing::error!(client = %key, panic = %message, "Downstream handler panicked");
            metrics::record_downstream_fault();
            ApiError::Internal.into_response()
        }
    }
}
