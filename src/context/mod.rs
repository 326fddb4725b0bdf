//! Conversation context for the assistant
//!
//! Combines:
//! - Turns (role-tagged history, replayed verbatim to the model)
//! - Token estimation (provider count with a word-based fallback)
//! - The bounded context store that evicts oldest turns

mod store;
mod tokens;
mod turn;

pub use store::{AppendReport, ContextLimits, ConversationContext};
pub use tokens::{DEFAULT_TOKENS_PER_WORD, TokenCounter, TokenEstimator};
pub use turn::{Role, Turn};
