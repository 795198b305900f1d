//! Control-plane calls from the master to its members.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::registry::WorkerAddr;

/// Path every node serves to start a graceful drain.
pub const OFFLINE_PATH: &str = "/offline";

/// What the master needs to ask of a member.
///
/// One probe or drain call is a single attempt; retrying is the caller's
/// concern.
pub trait MemberClient: Send + Sync {
    /// True if the member answered its health endpoint with a success status.
    fn probe<'a>(&'a self, addr: &'a WorkerAddr) -> BoxFuture<'a, bool>;

    /// Ask the member to drain and exit. True if it acknowledged.
    fn request_drain<'a>(&'a self, addr: &'a WorkerAddr) -> BoxFuture<'a, bool>;
}

/// [`MemberClient`] speaking HTTP/1.1 to workers.
#[derive(Clone)]
pub struct HttpMemberClient {
    client: Client<HttpConnector, Body>,
    probe_path: String,
    timeout: Duration,
}

impl HttpMemberClient {
    pub fn new(probe_path: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            probe_path: probe_path.to_string(),
            timeout,
        }
    }

    async fn call(&self, method: Method, addr: &WorkerAddr, path: &str) -> bool {
        let request = match Request::builder()
            .method(method)
            .uri(addr.url(path))
            .header("user-agent", "worker-fleet-master")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(worker = %addr, error = %e, "Failed to build control request");
                return false;
            }
        };

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(worker = %addr, path, status = %response.status(), "Control request rejected");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(worker = %addr, path, error = %e, "Control request failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(worker = %addr, path, "Control request failed: timeout");
                false
            }
        }
    }
}

impl MemberClient for HttpMemberClient {
    fn probe<'a>(&'a self, addr: &'a WorkerAddr) -> BoxFuture<'a, bool> {
        Box::pin(self.call(Method::GET, addr, &self.probe_path))
    }

    fn request_drain<'a>(&'a self, addr: &'a WorkerAddr) -> BoxFuture<'a, bool> {
        Box::pin(self.call(Method::POST, addr, OFFLINE_PATH))
    }
}
