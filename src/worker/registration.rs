//! Worker registration with the master.

use std::time::Duration;

use fleet_sdk::{FleetClient, SdkError};

use crate::config::RegistrationConfig;
use crate::resilience::{retry, Backoff};

/// Per-request deadline for one registration attempt.
const REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("cannot build client for {master}: {source}")]
    Client {
        master: String,
        #[source]
        source: SdkError,
    },

    #[error("registration with {master} failed after {attempts} attempts: {source}")]
    Exhausted {
        master: String,
        attempts: u32,
        #[source]
        source: SdkError,
    },
}

/// Announce `host:port` to the master, retrying with a fixed delay.
pub async fn register_with_master(
    config: &RegistrationConfig,
    host: &str,
    port: u16,
) -> Result<(), RegistrationError> {
    let master = config.master_url.as_str();
    let client = FleetClient::with_timeout(master, REGISTER_TIMEOUT).map_err(|source| {
        RegistrationError::Client {
            master: master.to_string(),
            source,
        }
    })?;

    let client = &client;
    retry(config.attempts, Backoff::Fixed(config.retry_delay()), |attempt| async move {
        let result = client.register(host, port).await;
        if let Err(e) = &result {
            tracing::warn!(attempt, master, error = %e, "Registration attempt failed");
        }
        result
    })
    .await
    .map_err(|source| RegistrationError::Exhausted {
        master: master.to_string(),
        attempts: config.attempts.max(1),
        source,
    })?;

    tracing::info!(master, host, port, "Registered with master");
    Ok(())
}

/// Asks the master to drop this worker from its ring once the worker
/// starts draining.
#[derive(Debug, Clone)]
pub struct Deregistration {
    client: FleetClient,
    host: String,
    port: u16,
    attempts: u32,
}

impl Deregistration {
    pub fn new(config: &RegistrationConfig, host: &str, port: u16) -> Result<Self, RegistrationError> {
        let client = FleetClient::with_timeout(&config.master_url, REGISTER_TIMEOUT).map_err(|source| {
            RegistrationError::Client {
                master: config.master_url.clone(),
                source,
            }
        })?;
        Ok(Self {
            client,
            host: host.to_string(),
            port,
            attempts: config.attempts,
        })
    }

    /// True if the master acknowledged. Failure is only logged: the
    /// master's health loop evicts the worker anyway once it stops.
    pub async fn notify(&self) -> bool {
        let client = &self.client;
        let (host, port) = (self.host.as_str(), self.port);
        let result = retry(self.attempts, Backoff::None, |_| async move {
            client.deregister(host, port).await
        })
        .await;

        match result {
            Ok(()) => {
                tracing::info!(master = client.base_url(), host, port, "Left the master's ring");
                true
            }
            Err(e) => {
                tracing::warn!(master = client.base_url(), host, port, error = %e, "Could not deregister from master");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn master(fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/worker/register",
            post(move |Json(body): Json<fleet_sdk::RegisterRequest>| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(body.port, 4100);
                    if n < fail_first {
                        (StatusCode::SERVICE_UNAVAILABLE, "starting")
                    } else {
                        (StatusCode::OK, "{\"message\":\"ok\"}")
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), calls)
    }

    fn config(master_url: String) -> RegistrationConfig {
        RegistrationConfig {
            master_url,
            attempts: 3,
            retry_delay_ms: 10,
            advertise_host: None,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_retries() {
        let (url, calls) = master(2).await;
        register_with_master(&config(url), "127.0.0.1", 4100).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_deregistration_posts_own_address() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let record = seen.clone();
        let app = Router::new().route(
            "/worker/deregister",
            post(move |Json(body): Json<fleet_sdk::RegisterRequest>| {
                let record = record.clone();
                async move {
                    record.lock().unwrap().push(format!("{}:{}", body.host, body.port));
                    "{\"message\":\"ok\"}"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let notice = Deregistration::new(&config(format!("http://{}", addr)), "127.0.0.1", 4100).unwrap();
        assert!(notice.notify().await);
        assert_eq!(*seen.lock().unwrap(), vec!["127.0.0.1:4100".to_string()]);
    }

    #[tokio::test]
    async fn test_deregistration_tolerates_missing_master() {
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", closed.local_addr().unwrap());
        drop(closed);

        let notice = Deregistration::new(&config(url), "127.0.0.1", 4100).unwrap();
        assert!(!notice.notify().await);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let (url, calls) = master(usize::MAX).await;
        let err = register_with_master(&config(url), "127.0.0.1", 4100)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
