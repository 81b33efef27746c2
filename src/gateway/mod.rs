//! HTTP gateway (Axum) for the query pipeline.

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;
pub mod streaming;


use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::{ErrorEnvelope, GatewayError};
pub use handler::query_handler;
pub use payload::{QueryRequest, QueryResponse};
pub use state::{AppState, FeedbackLog, FeedbackRecord};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/query", post(handler::query_handler))
        .route("/conversation/clear", post(handler::conversation_clear_handler))
        .route("/conversation/stats", get(handler::conversation_stats_handler))
        .route("/stats", get(handler::stats_handler))
        .route("/feedback", post(handler::feedback_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub vector_store: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let vector_store_status = match state.vector_store.health_check().await {
        Ok(()) => "ready",
        Err(_) => "error",
    };

    let all_ready = vector_store_status == "ready";
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            components: ComponentStatus {
                http: "ready",
                vector_store: vector_store_status,
            },
        }),
    )
        .into_response()
}
