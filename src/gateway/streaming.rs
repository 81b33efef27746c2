//! SSE event mapping for streaming queries.

use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures_util::stream::Stream;
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use crate::gateway::error::ErrorEnvelope;
use crate::gateway::payload::QueryResponse;
use crate::pipeline::PipelineEvent;

/// Maps pipeline events onto the wire: many `token` data frames, then one
/// `done` frame carrying the full response (or an `error` frame).
pub fn sse_from_pipeline(
    events: ReceiverStream<PipelineEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let stream = events.map(|event| match event {
        PipelineEvent::Token(text) => {
            let frame = json!({"type": "token", "text": text});
            Ok(Event::default().data(frame.to_string()))
        }
        PipelineEvent::Done(outcome) => {
            let response = QueryResponse::from(*outcome);
            match serde_json::to_value(&response) {
                Ok(mut value) => {
                    value["type"] = json!("done");
                    Ok(Event::default().data(value.to_string()))
                }
                Err(e) => {
                    error!(error = %e, "failed to serialize done event");
                    Ok(Event::default().event("error").data("serialization failed"))
                }
            }
        }
        PipelineEvent::Failed(pipeline_error) => {
            let envelope = ErrorEnvelope::from_pipeline(&pipeline_error);
            let body = serde_json::to_string(&envelope)
                .unwrap_or_else(|_| r#"{"error":{"kind":"internal"}}"#.to_string());
            Ok(Event::default().event("error").data(body))
        }
    });

    Sse::new(stream)
}
