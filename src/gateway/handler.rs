use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};

use crate::gateway::error::GatewayError;
use crate::gateway::payload::{
    ClearConversationResponse, FeedbackRequest, FeedbackResponse, QueryRequest, QueryResponse,
};
use crate::gateway::state::{AppState, FeedbackRecord};
use crate::gateway::streaming::sse_from_pipeline;

/// `POST /query`: the main entry point, streaming or not.
#[instrument(skip(state, request), fields(stream = request.stream))]
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, GatewayError> {
    let options = request.options();

    if request.stream {
        let events = state
            .orchestrator
            .execute_stream(&request.query, options)
            .await?;
        return Ok(sse_from_pipeline(events).into_response());
    }

    let outcome = state.orchestrator.execute(&request.query, options).await?;
    Ok(Json(QueryResponse::from(outcome)).into_response())
}

/// `POST /conversation/clear`: resets session memory.
#[instrument(skip(state))]
pub async fn conversation_clear_handler(State(state): State<AppState>) -> Response {
    state.orchestrator.memory().clear();
    info!("conversation cleared");
    Json(ClearConversationResponse { cleared: true }).into_response()
}

/// `GET /conversation/stats`.
#[instrument(skip(state))]
pub async fn conversation_stats_handler(State(state): State<AppState>) -> Response {
    Json(state.orchestrator.memory().stats()).into_response()
}

/// `GET /stats`: pipeline + cache counters.
#[instrument(skip(state))]
pub async fn stats_handler(State(state): State<AppState>) -> Response {
    let body = json!({
        "pipeline": state.orchestrator.stats(),
        "cache": state.orchestrator.cache_stats(),
        "conversation": state.orchestrator.memory().stats(),
        "feedback_records": state.feedback.len(),
    });
    Json(body).into_response()
}

/// `POST /feedback`: analytics-only recording.
#[instrument(skip(state, request))]
pub async fn feedback_handler(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Response {
    state.feedback.record(FeedbackRecord {
        query_id: request.query_id,
        helpful: request.helpful,
        note: request.note,
        timestamp: Utc::now(),
    });
    Json(FeedbackResponse { recorded: true }).into_response()
}
