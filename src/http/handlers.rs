//! Control-plane and dispatch handlers.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_sdk::{FleetState, RegisterRequest, WorkerInfo};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceExt;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::{forward, routing_key, X_REQUEST_ID};
use crate::registry::WorkerAddr;

pub const HEALTH_PATH: &str = "/health";
pub const REGISTER_PATH: &str = "/worker/register";
pub const DEREGISTER_PATH: &str = "/worker/deregister";
pub const STATE_PATH: &str = "/worker/state";

/// Upper bound on `?sample=` so one state call cannot hash forever.
const MAX_SAMPLE: usize = 1_000_000;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into(), "type": "error" }))).into_response()
}

pub async fn health(State(state): State<AppState>) -> Response {
    if state.drain.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response()
    } else {
        (StatusCode::OK, "ok").into_response()
    }
}

fn worker_addr(payload: Result<Json<RegisterRequest>, JsonRejection>) -> Result<WorkerAddr, Response> {
    let Json(payload) = payload.map_err(|rejection| error_response(StatusCode::BAD_REQUEST, rejection.body_text()))?;

    WorkerAddr::new(&payload.host, payload.port).map_err(|e| {
        tracing::warn!(host = %payload.host, port = payload.port, error = %e, "Rejected worker address");
        error_response(StatusCode::BAD_REQUEST, e.to_string())
    })
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let addr = match worker_addr(payload) {
        Ok(a) => a,
        Err(response) => return response,
    };

    if state.registry.register(addr.clone()) {
        tracing::info!(worker = %addr, live = state.registry.len(), "Worker registered");
    } else {
        tracing::debug!(worker = %addr, "Worker re-registered");
    }
    Json(json!({ "message": "ok" })).into_response()
}

/// A draining worker leaving the ring. Idempotent.
pub async fn deregister(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let addr = match worker_addr(payload) {
        Ok(a) => a,
        Err(response) => return response,
    };

    if state.registry.evict(&addr) {
        metrics::record_eviction("deregistered");
        tracing::info!(worker = %addr, live = state.registry.len(), "Worker deregistered");
    } else {
        tracing::debug!(worker = %addr, "Deregistration for unknown worker");
    }
    Json(json!({ "message": "ok" })).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    pub sample: Option<usize>,
}

pub async fn fleet_state(State(state): State<AppState>, Query(query): Query<StateQuery>) -> Json<FleetState> {
    let membership = state.registry.load();
    let stats = membership.ring().stats();

    let distribution = query.sample.map(|n| {
        membership
            .ring()
            .load_distribution(n.min(MAX_SAMPLE))
            .into_iter()
            .map(|(addr, count)| (addr.to_string(), count))
            .collect::<BTreeMap<_, _>>()
    });

    Json(FleetState {
        message: "ok".to_string(),
        expected: state.expected_workers,
        nodes: membership.addresses().iter().map(ToString::to_string).collect(),
        workers: membership
            .entries()
            .into_iter()
            .map(|e| WorkerInfo {
                address: e.address.to_string(),
                registered_at: e.registered_at,
            })
            .collect(),
        virtual_nodes: stats.virtual_nodes,
        positions: stats.positions,
        distribution,
    })
}

pub async fn offline(State(state): State<AppState>) -> Json<serde_json::Value> {
    if state.drain.trigger() {
        tracing::info!(mode = %state.mode, "Offline requested");
    }
    Json(json!({ "message": "ok" }))
}

/// Master fallback: proxy to the owning worker, or serve locally when the
/// ring is empty.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let key = routing_key(state.routing_key, &request, peer);
    let Some(target) = state.registry.lookup(&key) else {
        tracing::debug!(request_id = %request_id, key = %key, "No workers registered, serving locally");
        let response = match state.local.clone().oneshot(request).await {
            Ok(r) => r,
            Err(never) => match never {},
        };
        metrics::record_request(&method, response.status().as_u16(), "local", start);
        return response;
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        worker = %target,
        "Proxying request"
    );

    match forward(&state.client, &target, &request_id, request).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), target.as_str(), start);
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, worker = %target, error = %e, "Upstream error");
            metrics::record_request(&method, StatusCode::BAD_GATEWAY.as_u16(), target.as_str(), start);
            e.into_response()
        }
    }
}
