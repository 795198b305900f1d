//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for a master or a worker
//! - Wire up middleware (request ID, tracing, in-flight tracking)
//! - Serve until shutdown is triggered

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{FleetConfig, Mode, RoutingKeySource};
use crate::health::OFFLINE_PATH;
use crate::http::handlers::{self, DEREGISTER_PATH, HEALTH_PATH, REGISTER_PATH, STATE_PATH};
use crate::http::middleware::{track_in_flight, FleetRequestId};
use crate::lifecycle::{DrainController, ShutdownSignal};
use crate::proxy::{build_client, HttpClient, X_REQUEST_ID};
use crate::registry::WorkerRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub mode: Mode,
    /// Always empty on a worker.
    pub registry: Arc<WorkerRegistry>,
    pub client: HttpClient,
    pub drain: DrainController,
    pub routing_key: RoutingKeySource,
    pub expected_workers: usize,
    /// This node's own data plane.
    pub local: Router,
}

impl AppState {
    pub fn new(
        config: &FleetConfig,
        registry: Arc<WorkerRegistry>,
        drain: DrainController,
        local: Router,
    ) -> Self {
        Self {
            mode: config.mode,
            registry,
            client: build_client(config.timeouts.connect()),
            drain,
            routing_key: config.fleet.routing_key,
            expected_workers: config.fleet.expected_workers,
            local,
        }
    }
}

/// HTTP server for one fleet node.
pub struct FleetServer {
    state: AppState,
}

impl FleetServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let state = self.state.clone();

        let routes = Router::new()
            .route(HEALTH_PATH, get(handlers::health))
            .route(OFFLINE_PATH, get(handlers::offline).post(handlers::offline));

        let routes = match state.mode {
            Mode::Master => routes
                .route(REGISTER_PATH, post(handlers::register))
                .route(DEREGISTER_PATH, post(handlers::deregister))
                .route(STATE_PATH, get(handlers::fleet_state))
                .fallback(handlers::dispatch),
            Mode::Worker => routes.fallback_service(state.local.clone()),
        };

        routes
            .layer(from_fn_with_state(state.clone(), track_in_flight))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, FleetRequestId))
    }

    /// Run the server until `shutdown` fires, then finish open connections.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, mode = %self.state.mode, "HTTP server starting");

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
