//! Error types for Chatterbox

use thiserror::Error;

use crate::llm::{CompletionError, ProviderError};

/// Result type alias for Chatterbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Chatterbox
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing settings document, missing credential)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// OBS websocket / scene toggling error
    #[error("overlay error: {0}")]
    Overlay(String),

    /// Activation source error
    #[error("activation error: {0}")]
    Activation(String),

    /// Completion provider call failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Chat completion failed
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// WebSocket transport error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl Error {
    /// Whether the error should end the process rather than the current cycle
    ///
    /// STT request failures and overlay hiccups are recoverable; a broken
    /// audio device or activation source is not.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Audio(_) | Self::Activation(_) | Self::Io(_)
        )
    }
}
