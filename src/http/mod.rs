//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (client key, request ID header)
//!     → security::rate_limit (admit or 429)
//!     → handlers (healthcheck.rs, downstream routes)
//!     → error.rs (uniform {"detail": ...} error bodies)
//!     → Send to client
//! ```

pub mod error;
pub mod healthcheck;
pub mod request;
pub mod server;

pub use error::{ApiError, ErrorBody};
pub use healthcheck::{AppInfo, HealthStatus};
pub use request::{client_key, UNKNOWN_CLIENT, X_REQUEST_ID};
pub use server::{api_routes, build_router, HttpServer};
