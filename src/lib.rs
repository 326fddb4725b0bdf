//! Chatterbox - push-to-talk voice assistant
//!
//! This library provides the pieces of one conversation loop:
//! - Speech capture and transcription (STT)
//! - Chat completion against Gemini with a bounded conversation context
//! - Speech synthesis with a fallback voice (TTS) and playback
//! - Optional OBS overlay cues while a reply plays
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │        Activation (Enter / /clear / /quit)        │
//! └─────────────────────────┬─────────────────────────┘
//!                           │
//! ┌─────────────────────────▼─────────────────────────┐
//! │                     Assistant                     │
//! │  Mic + STT  │  Context  │  Completion  │  TTS     │
//! └─────────────────────────┬─────────────────────────┘
//!                           │
//! ┌─────────────────────────▼─────────────────────────┐
//! │          Speakers  │  OBS overlay cues            │
//! └───────────────────────────────────────────────────┘
//! ```

pub mod activation;
pub mod assistant;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod overlay;
pub mod voice;

pub use assistant::{Assistant, AssistantState, CycleOutcome};
pub use config::Config;
pub use error::{Error, Result};
