//! Request middleware.
//!
//! # Responsibilities
//! - Count every data-plane request as in flight until its body is done
//! - Refuse new data-plane work with 503 once the node drains
//! - Generate request IDs

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::health::OFFLINE_PATH;
use crate::http::handlers::{DEREGISTER_PATH, HEALTH_PATH, STATE_PATH};
use crate::http::server::AppState;
use crate::lifecycle::InFlightGuard;

/// Control endpoints that stay reachable during a drain and are never
/// counted as in flight.
fn is_exempt(path: &str) -> bool {
    matches!(path, OFFLINE_PATH | HEALTH_PATH | STATE_PATH | DEREGISTER_PATH)
}

/// Response body that keeps its request counted until the body is
/// finished or dropped. Frames, trailers and the size hint pass through.
struct TrackedBody {
    inner: Body,
    _guard: InFlightGuard,
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

pub async fn track_in_flight(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    if state.drain.is_draining() {
        tracing::debug!(path = %request.uri().path(), "Refusing request while draining");
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }

    let guard = state.drain.in_flight().track();
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    Response::from_parts(
        parts,
        Body::new(TrackedBody {
            inner: body,
            _guard: guard,
        }),
    )
}

/// UUID v4 request IDs for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct FleetRequestId;

impl MakeRequestId for FleetRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}
