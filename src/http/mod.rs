//! HTTP trigger layer
//!
//! Thin axum router over the gateway: route and path-parameter handling,
//! plus the mapping from gateway outcomes to HTTP responses. No business
//! logic lives here.

use crate::gateway::EventsGateway;
use crate::odata::GatewayError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(gateway: Arc<EventsGateway>) -> Router {
    Router::new()
        .route("/api/events", get(list_events))
        .route("/api/events/:id", get(get_event))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn list_events(State(gateway): State<Arc<EventsGateway>>) -> Response {
    match gateway.fetch_list().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_event(
    State(gateway): State<Arc<EventsGateway>>,
    Path(id): Path<String>,
) -> Response {
    match gateway.fetch_one(&id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

/// Translate a gateway error into an HTTP outcome. An absent record is an
/// empty 404, not an error body; upstream detail is logged but the caller
/// only sees the status and upstream code, never credentials.
fn error_response(error: GatewayError) -> Response {
    match error {
        GatewayError::NotFound => StatusCode::NOT_FOUND.into_response(),
        GatewayError::Auth(e) => {
            tracing::error!("Token acquisition failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "authentication with upstream failed" })),
            )
                .into_response()
        }
        GatewayError::Upstream(status, body) => {
            tracing::error!("Upstream returned {}: {}", status, body);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "upstream request failed", "upstreamStatus": status })),
            )
                .into_response()
        }
        GatewayError::Transport(msg) => {
            tracing::error!("Transport failure: {}", msg);
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({ "error": "upstream unreachable" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_maps_to_empty_404() {
        let response = error_response(GatewayError::NotFound);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_maps_to_502() {
        let response = error_response(GatewayError::Upstream(401, "secret detail".to_string()));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["upstreamStatus"], 401);
        // The upstream body is logged, not echoed
        assert!(!body.to_string().contains("secret detail"));
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_504() {
        let response = error_response(GatewayError::Transport("timed out".to_string()));
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
