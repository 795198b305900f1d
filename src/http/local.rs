//! Placeholder data plane.
//!
//! Real deployments inject their own [`Router`]; this one answers every
//! request with the serving node and the requested path.

use std::sync::Arc;

use axum::{http::Uri, Json, Router};
use serde_json::{json, Value};

pub fn placeholder(node: impl Into<String>) -> Router {
    let node: Arc<str> = Arc::from(node.into());
    Router::new().fallback(move |uri: Uri| {
        let node = node.clone();
        async move { Json::<Value>(json!({ "node": &*node, "path": uri.path() })) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_reports_node_and_path() {
        let response = placeholder("127.0.0.1:4000")
            .oneshot(Request::builder().uri("/a/b?c=d").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "node": "127.0.0.1:4000", "path": "/a/b" }));
    }
}
