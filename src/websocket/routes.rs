use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::websocket_handler;
use crate::server::QuizServer;

/// Build the HTTP router: the WebSocket endpoint plus a health probe.
pub fn create_router(cors_origins: &str) -> Router<Arc<QuizServer>> {
    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|origin| origin.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();
        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_handler(State(server): State<Arc<QuizServer>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rooms": server.store().room_count(),
    }))
}
