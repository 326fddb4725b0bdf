//! Token estimation for conversation turns

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::Turn;
use crate::Result;

/// Approximate tokens per English word, used when exact counting fails
pub const DEFAULT_TOKENS_PER_WORD: f64 = 1.33;

/// Exact token counting, usually backed by the completion provider
#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Count tokens for the given turns as the provider would
    async fn count_tokens(&self, turns: &[Turn]) -> Result<usize>;
}

/// Estimates token length of turns
///
/// Prefers the exact counter and falls back to a word-based estimate.
/// Never fails.
#[derive(Clone)]
pub struct TokenEstimator {
    counter: Option<Arc<dyn TokenCounter>>,
    tokens_per_word: f64,
}

impl TokenEstimator {
    /// Create an estimator backed by an exact counter
    #[must_use]
    pub fn new(counter: Arc<dyn TokenCounter>, tokens_per_word: f64) -> Self {
        Self {
            counter: Some(counter),
            tokens_per_word,
        }
    }

    /// Create an estimator that only uses the word-based estimate
    #[must_use]
    pub const fn word_based(tokens_per_word: f64) -> Self {
        Self {
            counter: None,
            tokens_per_word,
        }
    }

    /// Estimate the token length of a sequence of turns
    pub async fn estimate(&self, turns: &[Turn]) -> usize {
        if turns.is_empty() {
            return 0;
        }

        if let Some(counter) = &self.counter {
            match counter.count_tokens(turns).await {
                Ok(count) => return count,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "could not get accurate token count, falling back to word estimate"
                    );
                }
            }
        }

        self.words_to_tokens(turns.iter().map(Turn::word_count).sum())
    }

    /// Estimate the token length of a single string
    pub async fn estimate_text(&self, text: &str) -> usize {
        self.estimate(&[Turn::user(text)]).await
    }

    /// Word-based estimate: `round(words × tokens_per_word)`
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn words_to_tokens(&self, words: usize) -> usize {
        let tokens = (words as f64 * self.tokens_per_word).round();
        if tokens.is_finite() && tokens > 0.0 {
            tokens as usize
        } else {
            0
        }
    }

    #[must_use]
    pub const fn tokens_per_word(&self) -> f64 {
        self.tokens_per_word
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::word_based(DEFAULT_TOKENS_PER_WORD)
    }
}

impl fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEstimator")
            .field("exact", &self.counter.is_some())
            .field("tokens_per_word", &self.tokens_per_word)
            .finish()
    }
}
