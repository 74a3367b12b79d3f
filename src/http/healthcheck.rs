//! Service information endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Static facts about the running service.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub version: &'static str,
    pub environment: Arc<str>,
}

impl AppInfo {
    pub fn new(environment: impl Into<Arc<str>>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            environment: environment.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub environment: String,
}

/// `GET /v1/healthcheck`
pub async fn healthcheck(State(info): State<AppInfo>) -> Json<HealthStatus> {
    tracing::debug!(environment = %info.environment, "Healthcheck");
    Json(HealthStatus {
        status: "available".to_string(),
        version: info.version.to_string(),
        environment: info.environment.to_string(),
    })
}
