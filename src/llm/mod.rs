//! LLM client: completion + token streaming with retries and admission.

pub mod client;
pub mod error;
pub mod governor;
pub mod http;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::{LlmClient, TokenStream};
pub use error::LlmError;
pub use governor::{GovernorConfig, RetryingLlmClient};
pub use http::HttpLlmClient;
pub use types::{CompletionRequest, TokenChunk};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockLlmClient;
