//! Movies API service library.
//!
//! The interesting part is the per-client sliding-window admission control in
//! [`security`]; the rest wires it into an Axum service.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{AdmissionController, Decision, Policy};
