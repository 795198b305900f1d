use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

/// Body of `POST /worker/register` and `POST /worker/deregister`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub host: String,
    pub port: u16,
}

/// One registered worker as reported by `GET /worker/state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub address: String,
    /// Seconds since the unix epoch.
    pub registered_at: u64,
}

/// Response of `GET /worker/state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetState {
    #[serde(default)]
    pub message: String,
    pub expected: usize,
    pub nodes: Vec<String>,
    #[serde(default)]
    pub workers: Vec<WorkerInfo>,
    #[serde(default)]
    pub virtual_nodes: usize,
    #[serde(default)]
    pub positions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<BTreeMap<String, usize>>,
}

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("master returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Thin wrapper over the master's (or a worker's) control-plane endpoints.
#[derive(Debug, Clone)]
pub struct FleetClient {
    client: Client,
    base_url: String,
}

impl FleetClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Same as [`FleetClient::new`] with a per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, SdkError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Announce a worker at `host:port` to the master.
    pub async fn register(&self, host: &str, port: u16) -> Result<(), SdkError> {
        let resp = self
            .client
            .post(format!("{}/worker/register", self.base_url))
            .json(&RegisterRequest {
                host: host.to_string(),
                port,
            })
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    /// Ask the master to drop the worker at `host:port` from its ring.
    pub async fn deregister(&self, host: &str, port: u16) -> Result<(), SdkError> {
        let resp = self
            .client
            .post(format!("{}/worker/deregister", self.base_url))
            .json(&RegisterRequest {
                host: host.to_string(),
                port,
            })
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    /// Fetch the master's membership view, optionally with a load distribution over `sample` keys.
    pub async fn state(&self, sample: Option<usize>) -> Result<FleetState, SdkError> {
        let mut req = self.client.get(format!("{}/worker/state", self.base_url));
        if let Some(n) = sample {
            req = req.query(&[("sample", n)]);
        }
        let resp = check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Returns true when the node answers its health check with a success status.
    pub async fn health(&self) -> Result<bool, SdkError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Ask the node to drain and exit.
    pub async fn offline(&self) -> Result<(), SdkError> {
        let resp = self
            .client
            .post(format!("{}/offline", self.base_url))
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }
}

async fn check(resp: Response) -> Result<Response, SdkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SdkError::Status {
        status: status.as_u16(),
        body,
    })
}
