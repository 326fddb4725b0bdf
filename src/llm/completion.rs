//! Completion client with capacity fallback

use std::sync::Arc;

use super::{ChatProvider, CompletionError, ProviderError};
use crate::context::{TokenEstimator, Turn};

/// Spoken in place of a reply when the model is overloaded or rate limited
pub const OVERLOADED_REPLY: &str = "I'm currently overloaded, please try again later.";

/// Result of one completion request
#[derive(Debug)]
pub enum CompletionOutcome {
    /// Model produced text
    Success(String),
    /// Provider is temporarily out of capacity; speak [`OVERLOADED_REPLY`]
    TransientFailure(ProviderError),
    /// Turn must be abandoned
    HardFailure(CompletionError),
}

impl CompletionOutcome {
    /// Text to speak and record, if any
    #[must_use]
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Success(text) => Some(text),
            Self::TransientFailure(_) => Some(OVERLOADED_REPLY),
            Self::HardFailure(_) => None,
        }
    }

    /// Collapse into a `Result`, treating the capacity fallback as success
    ///
    /// # Errors
    ///
    /// Returns the completion error for a hard failure
    pub fn into_result(self) -> Result<String, CompletionError> {
        match self {
            Self::Success(text) => Ok(text),
            Self::TransientFailure(_) => Ok(OVERLOADED_REPLY.to_string()),
            Self::HardFailure(e) => Err(e),
        }
    }
}

/// Check whether a provider error signals overload or rate limiting
#[must_use]
pub fn is_transient_capacity(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("overloaded") || message.contains("rate limit")
}

/// Requests completions for the conversation
///
/// Never mutates the context store; the caller appends the exchange after a
/// successful (or fallback) reply.
pub struct CompletionClient {
    provider: Arc<dyn ChatProvider>,
    usage_estimator: Option<TokenEstimator>,
}

impl CompletionClient {
    /// Create a new completion client
    #[must_use]
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            usage_estimator: None,
        }
    }

    /// Log token usage for each reply, measuring the reply with `estimator`
    #[must_use]
    pub fn with_usage_reporting(mut self, estimator: TokenEstimator) -> Self {
        self.usage_estimator = Some(estimator);
        self
    }

    /// Request a reply to `new_user_text` given the history
    pub async fn complete(
        &self,
        system_instruction: &str,
        context_turns: &[Turn],
        new_user_text: &str,
    ) -> CompletionOutcome {
        if context_turns.is_empty() {
            tracing::debug!("chat history is empty");
        }

        let mut request = Vec::with_capacity(context_turns.len() + 1);
        request.extend_from_slice(context_turns);
        request.push(Turn::user(new_user_text));

        let generation = match self.provider.generate(system_instruction, &request).await {
            Ok(generation) => generation,
            Err(e) if is_transient_capacity(&e.to_string()) => {
                tracing::warn!(error = %e, "model appears to be overloaded or rate limited");
                return CompletionOutcome::TransientFailure(e);
            }
            Err(e) => {
                tracing::error!(error = %e, "completion request failed");
                return CompletionOutcome::HardFailure(CompletionError::Provider(e));
            }
        };

        if generation.text.is_empty() {
            tracing::error!("received empty response from model");
            return CompletionOutcome::HardFailure(CompletionError::EmptyResponse);
        }

        if let Some(estimator) = &self.usage_estimator {
            if let Some(usage) = generation.usage {
                tracing::info!(
                    prompt = usage.prompt_tokens,
                    response = usage.response_tokens,
                    total = usage.total_tokens,
                    "token usage"
                );
            }
            let response_tokens = estimator.estimate_text(&generation.text).await;
            tracing::info!(response_tokens, "response size");
        }

        CompletionOutcome::Success(generation.text)
    }
}
