//! Routing key extraction.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{header, Request};

use crate::config::RoutingKeySource;

/// Key the ring is consulted with for this request.
///
/// `Host` uses the Host header, falling back to the URI authority (HTTP/2),
/// then to the empty string. `ClientIp` uses the peer address and falls back
/// to the host key when the peer is unknown.
pub fn routing_key(source: RoutingKeySource, request: &Request<Body>, peer: Option<SocketAddr>) -> String {
    match (source, peer) {
        (RoutingKeySource::ClientIp, Some(peer)) => peer.ip().to_string(),
        _ => host_key(request),
    }
}

fn host_key(request: &Request<Body>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default()
        .to_ascii_lowercase()
}
