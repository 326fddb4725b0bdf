//! Bounded conversation context store

use super::{TokenEstimator, Turn};

/// Token budget for the conversation history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextLimits {
    /// Maximum context size of the model, in tokens
    pub max_context_tokens: usize,
    /// Fraction of the maximum at which eviction begins
    pub trim_trigger_fraction: f64,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_context_tokens: 1_048_576,
            trim_trigger_fraction: 0.9,
        }
    }
}

impl ContextLimits {
    /// Effective bound: `max_context_tokens × trim_trigger_fraction`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn threshold(&self) -> f64 {
        self.max_context_tokens as f64 * self.trim_trigger_fraction
    }

    #[allow(clippy::cast_precision_loss)]
    fn exceeded_by(&self, tokens: usize) -> bool {
        tokens as f64 > self.threshold()
    }
}

/// Outcome of appending an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReport {
    /// Estimated token length after any trimming
    pub estimated_tokens: usize,
    /// Turns evicted from the oldest end
    pub turns_evicted: usize,
}

/// Ordered conversation history bounded by a token budget
///
/// The system instruction is kept apart from the trimmable turns and is
/// never evicted.
#[derive(Debug)]
pub struct ConversationContext {
    system_instruction: String,
    turns: Vec<Turn>,
    limits: ContextLimits,
    estimator: TokenEstimator,
}

impl ConversationContext {
    /// Create an empty context
    #[must_use]
    pub fn new(
        system_instruction: impl Into<String>,
        limits: ContextLimits,
        estimator: TokenEstimator,
    ) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            turns: Vec::new(),
            limits,
            estimator,
        }
    }

    /// Append a user turn then an assistant turn, trimming if over budget
    pub async fn append(
        &mut self,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) -> AppendReport {
        self.turns.push(Turn::user(user_text));
        self.turns.push(Turn::assistant(assistant_text));

        let tokens = self.estimator.estimate(&self.turns).await;
        if !self.limits.exceeded_by(tokens) {
            return AppendReport {
                estimated_tokens: tokens,
                turns_evicted: 0,
            };
        }

        tracing::warn!(
            tokens,
            threshold = self.limits.threshold(),
            "chat history exceeds maximum context length, trimming"
        );
        let (turns_evicted, estimated_tokens) = self.evict_oldest(tokens).await;

        if self.turns.is_empty() {
            tracing::warn!(turns_evicted, "latest exchange alone exceeded the budget, history emptied");
        }

        AppendReport {
            estimated_tokens,
            turns_evicted,
        }
    }

    /// Remove oldest turns until the history fits the budget
    ///
    /// Returns the number of turns removed.
    pub async fn trim(&mut self) -> usize {
        if self.turns.is_empty() {
            return 0;
        }

        let tokens = self.estimator.estimate(&self.turns).await;
        self.evict_oldest(tokens).await.0
    }

    /// Each pass removes one turn, so the loop ends at the empty floor at the latest
    async fn evict_oldest(&mut self, mut tokens: usize) -> (usize, usize) {
        let mut evicted = 0;

        while !self.turns.is_empty() && self.limits.exceeded_by(tokens) {
            let dropped = self.turns.remove(0);
            evicted += 1;
            tracing::debug!(role = %dropped.role(), tokens, "evicted oldest turn");
            tokens = self.estimator.estimate(&self.turns).await;
        }

        (evicted, tokens)
    }

    /// Drop all turns; the system instruction is retained
    pub fn clear(&mut self) {
        self.turns.clear();
        tracing::info!("chat history cleared");
    }

    /// Owned copy of the current turns
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    #[must_use]
    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    #[must_use]
    pub const fn limits(&self) -> ContextLimits {
        self.limits
    }

    #[must_use]
    pub const fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
