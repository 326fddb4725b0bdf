//! Chat completion against a large language model
//!
//! The provider trait is the seam between the orchestrator and the vendor
//! API. `GeminiClient` is the production implementation.

mod completion;
mod gemini;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::Turn;

pub use completion::{CompletionClient, CompletionOutcome, OVERLOADED_REPLY, is_transient_capacity};
pub use gemini::{DEFAULT_BASE_URL, GeminiClient};

/// Failure reported by a completion provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request never produced a response
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with an error status
    #[error("{status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Chat completion failed and the turn should be abandoned
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Provider returned no text
    #[error("empty model response")]
    EmptyResponse,

    /// Provider call failed for a reason other than capacity
    #[error("failed to generate response: {0}")]
    Provider(#[source] ProviderError),
}

/// Token accounting reported alongside a generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub response_tokens: u32,
    pub total_tokens: u32,
}

/// Raw provider output
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// Concatenated text of the first candidate
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// A chat model that turns an instruction plus ordered turns into text
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate the next assistant message
    ///
    /// `turns` ends with the new user turn. The system instruction travels
    /// separately from the history.
    async fn generate(
        &self,
        system_instruction: &str,
        turns: &[Turn],
    ) -> std::result::Result<Generation, ProviderError>;
}
