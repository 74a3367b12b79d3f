//! Request inspection helpers.
//!
//! # Responsibilities
//! - Derive the rate limiting key from the connection's peer address
//! - Name the request ID header shared by the request-id layers

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::Request};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Key used when the transport cannot tell who the client is.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Client identity used as the rate limiting key: the peer IP address, or
/// [`UNKNOWN_CLIENT`] when no connection info is attached.
pub fn client_key<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
