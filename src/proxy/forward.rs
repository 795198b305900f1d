//! Forwarding one request to the worker that owns it.
//!
//! # Design Decisions
//! - Bodies stream in both directions; nothing is buffered
//! - No retry: a proxied request is sent at most once
//! - The worker's response (status, headers, body) is returned untouched

use std::time::Duration;

use axum::body::Body;
use axum::http::uri::Scheme;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::registry::WorkerAddr;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub type HttpClient = Client<HttpConnector, Body>;

pub fn build_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid upstream uri: {0}")]
    Uri(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
    }
}

/// Send `request` to `target` and hand back its response.
pub async fn forward(
    client: &HttpClient,
    target: &WorkerAddr,
    request_id: &str,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    parts.uri = Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(target.as_str())
        .path_and_query(path_and_query)
        .build()?;
    // Workers are reached over plain HTTP/1.1 whatever the client spoke.
    parts.version = Version::HTTP_11;

    if let Ok(value) = HeaderValue::from_str(request_id) {
        parts.headers.insert(X_REQUEST_ID, value);
    }

    let response = client.request(Request::from_parts(parts, body)).await?;
    let (parts, body) = response.into_parts();
    Ok(Response::from_parts(parts, Body::new(body)))
}
