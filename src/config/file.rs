//! YAML settings document
//!
//! Mirrors `config.yaml`. Optional keys fall back to the defaults below
//! when the file is resolved into a [`super::Config`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level settings document schema
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsFile {
    /// Chat model settings
    pub ai: AiSection,

    /// Speech-to-text settings
    pub stt: SttSection,

    /// Text-to-speech settings
    pub tts: TtsSection,

    /// OBS overlay settings
    #[serde(default)]
    pub obs: ObsSection,

    /// MP3 played once at startup
    #[serde(default)]
    pub startup_sound: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiSection {
    /// Gemini model identifier (e.g. "gemini-2.0-flash-lite")
    pub model: String,

    pub system_instruction: String,

    pub max_context_tokens: Option<usize>,

    pub trim_trigger_fraction: Option<f64>,

    /// Tokens counted per word when the provider count is unavailable
    pub tokens_per_word: Option<f64>,

    /// Log token usage after each reply
    #[serde(default = "default_true")]
    pub show_token_usage: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SttSection {
    pub provider: SttProvider,

    pub model: String,

    pub language: String,

    /// Seconds to wait for speech to begin
    pub silence_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TtsSection {
    pub provider: TtsProvider,

    pub model: Option<String>,

    /// Voice name (`OpenAI`) or voice id (`ElevenLabs`)
    pub voice: String,

    pub speed: Option<f64>,

    /// Language of the fallback voice
    pub language: String,
}

/// Overlay toggles
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObsSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub image: SceneSource,

    #[serde(default)]
    pub head: ToggledSceneSource,

    #[serde(default)]
    pub filter: SourceFilter,
}

/// A source inside a scene
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SceneSource {
    #[serde(default)]
    pub scene_name: String,

    #[serde(default)]
    pub source_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggledSceneSource {
    #[serde(default)]
    pub enabled: bool,

    #[serde(flatten)]
    pub source: SceneSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceFilter {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub source_name: String,

    #[serde(default)]
    pub filter_name: String,
}

/// Transcription service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

impl SttProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Whisper => "whisper",
            Self::Deepgram => "deepgram",
        }
    }
}

/// Primary voice service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TtsProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
}

impl TtsProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::ElevenLabs => "elevenlabs",
        }
    }
}

/// Parse a settings document
///
/// # Errors
///
/// Returns error if the YAML is malformed or a required key is missing
pub fn parse_settings(content: &str) -> Result<SettingsFile> {
    Ok(serde_yaml::from_str(content)?)
}

/// Read and parse the settings document at `path`
///
/// # Errors
///
/// Returns error if the file does not exist or cannot be parsed
pub fn load_settings_file(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "settings file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let settings = parse_settings(&content)
        .map_err(|e| Error::Config(format!("invalid settings in {}: {e}", path.display())))?;

    tracing::info!(path = %path.display(), "loaded settings file");
    Ok(settings)
}
