//! OpenAI-compatible HTTP backend (`POST {base}/chat/completions`).

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt, stream};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, instrument};

use super::client::{LlmClient, TokenStream};
use super::error::LlmError;
use super::types::{CompletionRequest, TokenChunk};

#[derive(Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamFrame {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl HttpLlmClient {
    /// Creates a client for an OpenAI-compatible `base_url` and model.
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": stream,
        });
        if !request.stop.is_empty() {
            body["stop"] = json!(request.stop);
        }
        body
    }
}

impl std::fmt::Debug for HttpLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

struct SseState {
    bytes: Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>,
    buffer: String,
    done: bool,
}

/// Extracts the next token from a buffered SSE line, if any.
fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamFrame>(data) {
        Ok(frame) => {
            let text = frame
                .choices
                .first()
                .and_then(|c| c.delta.content.as_deref())
                .unwrap_or_default();
            if text.is_empty() {
                SseLine::Skip
            } else {
                SseLine::Token(text.to_string())
            }
        }
        Err(e) => SseLine::Malformed(e.to_string()),
    }
}

enum SseLine {
    Token(String),
    Done,
    Skip,
    Malformed(String),
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    #[instrument(skip(self, request), fields(model = %self.model, prompt_len = request.prompt.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&self.body(&request, false))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                url: self.base_url.clone(),
                message: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| LlmError::RequestFailed {
                url: self.base_url.clone(),
                message: e.to_string(),
            })?;

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::MalformedResponse {
                    message: e.to_string(),
                })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::MalformedResponse {
                message: "no choices in completion response".to_string(),
            })?;

        debug!(chars = content.len(), "completion finished");
        Ok(content)
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, LlmError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&self.body(&request, true))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                url: self.base_url.clone(),
                message: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| LlmError::RequestFailed {
                url: self.base_url.clone(),
                message: e.to_string(),
            })?;

        let state = SseState {
            bytes: Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec()))),
            buffer: String::new(),
            done: false,
        };

        let token_stream = stream::unfold(state, |mut state| async move {
            loop {
                if state.done {
                    return None;
                }

                if let Some(newline) = state.buffer.find('\n') {
                    let line: String = state.buffer.drain(..=newline).collect();
                    match parse_sse_line(&line) {
                        SseLine::Token(text) => {
                            return Some((Ok(TokenChunk::new(text)), state));
                        }
                        SseLine::Done => {
                            state.done = true;
                            return None;
                        }
                        SseLine::Skip => continue,
                        SseLine::Malformed(message) => {
                            error!(message, "malformed stream frame");
                            state.done = true;
                            return Some((Err(LlmError::MalformedResponse { message }), state));
                        }
                    }
                }

                match state.bytes.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((
                            Err(LlmError::MalformedResponse {
                                message: e.to_string(),
                            }),
                            state,
                        ));
                    }
                    None => return None,
                }
            }
        });

        Ok(Box::pin(token_stream))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_token_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"hello"}}]}"#;
        assert!(matches!(parse_sse_line(line), SseLine::Token(t) if t == "hello"));
    }

    #[test]
    fn test_parse_sse_done_line() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
    }

    #[test]
    fn test_parse_sse_skips_comments_and_empty() {
        assert!(matches!(parse_sse_line(""), SseLine::Skip));
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
    }

    #[test]
    fn test_parse_sse_empty_delta_skipped() {
        let line = r#"data: {"choices":[{"delta":{}}]}"#;
        assert!(matches!(parse_sse_line(line), SseLine::Skip));
    }

    #[test]
    fn test_parse_sse_malformed() {
        assert!(matches!(
            parse_sse_line("data: {not json"),
            SseLine::Malformed(_)
        ));
    }
}
