//! Configuration management for chatterbox
//!
//! Settings come from `config.yaml`; credentials and endpoints from the
//! environment (optionally seeded from `.env`).

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

pub use file::{
    SceneSource, SettingsFile, SourceFilter, SttProvider, TtsProvider, load_settings_file,
    parse_settings,
};

use crate::context::{ContextLimits, DEFAULT_TOKENS_PER_WORD};
use crate::{Error, Result};

const DEFAULT_SILENCE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_OBS_HOST: &str = "localhost";
const DEFAULT_OBS_PORT: u16 = 4455;

/// Resolved assistant configuration
#[derive(Debug)]
pub struct Config {
    /// Chat model settings
    pub ai: AiConfig,

    /// Speech-to-text settings
    pub stt: SttConfig,

    /// Text-to-speech settings
    pub tts: TtsConfig,

    /// Overlay settings, `None` when disabled
    pub obs: Option<ObsConfig>,

    /// MP3 played once at startup
    pub startup_sound: Option<PathBuf>,

    /// API keys
    pub api_keys: ApiKeys,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub system_instruction: String,
    pub limits: ContextLimits,
    pub tokens_per_word: f64,
    pub show_token_usage: bool,

    /// Gemini API base URL override (`GEMINI_BASE_URL`)
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SttConfig {
    pub provider: SttProvider,
    pub model: String,
    pub language: String,
    pub silence_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProvider,
    pub model: Option<String>,
    pub voice: String,
    pub speed: f64,
    pub language: String,
}

/// Overlay cues and the websocket endpoint they are sent to
#[derive(Debug)]
pub struct ObsConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<SecretString>,

    /// Shown while a reply plays
    pub image: SceneSource,

    /// Optional second source toggled with the image
    pub head: Option<SceneSource>,

    /// Optional filter toggled with the image
    pub filter: Option<SourceFilter>,
}

impl ObsConfig {
    /// Websocket URL of the OBS server
    #[must_use]
    pub fn url(&self) -> String {
        if self.host.starts_with("ws://") || self.host.starts_with("wss://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("ws://{}:{}", self.host, self.port)
        }
    }
}

/// Provider credentials
#[derive(Debug)]
pub struct ApiKeys {
    pub gemini: SecretString,
    pub openai: Option<SecretString>,
    pub elevenlabs: Option<SecretString>,
    pub deepgram: Option<SecretString>,
}

impl Config {
    /// Load settings from `path` and credentials from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if the settings file is missing or invalid, or a
    /// required credential is unset
    pub fn load(path: &Path) -> Result<Self> {
        let settings = load_settings_file(path)?;
        Self::resolve(settings, |key| std::env::var(key).ok())
    }

    /// Combine a parsed settings document with credentials from `env`
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range or a required credential
    /// is unset
    pub fn resolve(settings: SettingsFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let secret = |key: &str| env(key).map(SecretString::from);

        let defaults = ContextLimits::default();
        let limits = ContextLimits {
            max_context_tokens: settings
                .ai
                .max_context_tokens
                .unwrap_or(defaults.max_context_tokens),
            trim_trigger_fraction: settings
                .ai
                .trim_trigger_fraction
                .unwrap_or(defaults.trim_trigger_fraction),
        };
        validate_limits(&limits)?;

        let tokens_per_word = settings.ai.tokens_per_word.unwrap_or(DEFAULT_TOKENS_PER_WORD);
        if !tokens_per_word.is_finite() || tokens_per_word <= 0.0 {
            return Err(Error::Config(format!(
                "ai.tokens_per_word must be positive, got {tokens_per_word}"
            )));
        }

        let speed = settings.tts.speed.unwrap_or(1.0);
        if !(0.25..=4.0).contains(&speed) {
            return Err(Error::Config(format!(
                "tts.speed must be between 0.25 and 4.0, got {speed}"
            )));
        }

        let api_keys = ApiKeys {
            gemini: secret("GEMINI_API_KEY")
                .ok_or_else(|| Error::Config("GEMINI_API_KEY is not set".to_string()))?,
            openai: secret("OPENAI_API_KEY"),
            elevenlabs: secret("ELEVENLABS_API_KEY"),
            deepgram: secret("DEEPGRAM_API_KEY"),
        };

        let obs = if settings.obs.enabled {
            let port = match env("OBS_WEBSOCKET_PORT") {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    Error::Config(format!("OBS_WEBSOCKET_PORT is not a valid port: {raw}"))
                })?,
                None => DEFAULT_OBS_PORT,
            };
            let use_password = env("USE_OBS_WEBSOCKET_PASSWORD").is_some_and(|v| v.trim() == "1");

            if settings.obs.image.source_name.is_empty() {
                return Err(Error::Config(
                    "obs.image.source_name is required when obs is enabled".to_string(),
                ));
            }

            Some(ObsConfig {
                host: env("OBS_WEBSOCKET_URL").unwrap_or_else(|| DEFAULT_OBS_HOST.to_string()),
                port,
                password: if use_password {
                    secret("OBS_WEBSOCKET_PASSWORD")
                } else {
                    None
                },
                image: settings.obs.image,
                head: settings
                    .obs
                    .head
                    .enabled
                    .then_some(settings.obs.head.source),
                filter: settings
                    .obs
                    .filter
                    .enabled
                    .then_some(settings.obs.filter),
            })
        } else {
            None
        };

        let config = Self {
            ai: AiConfig {
                model: settings.ai.model,
                system_instruction: settings.ai.system_instruction,
                limits,
                tokens_per_word,
                show_token_usage: settings.ai.show_token_usage,
                base_url: env("GEMINI_BASE_URL"),
            },
            stt: SttConfig {
                provider: settings.stt.provider,
                model: settings.stt.model,
                language: settings.stt.language,
                silence_timeout: Duration::from_secs(
                    settings
                        .stt
                        .silence_timeout_secs
                        .unwrap_or(DEFAULT_SILENCE_TIMEOUT_SECS),
                ),
            },
            tts: TtsConfig {
                provider: settings.tts.provider,
                model: settings.tts.model,
                voice: settings.tts.voice,
                speed,
                language: settings.tts.language,
            },
            obs,
            startup_sound: settings.startup_sound,
            api_keys,
        };

        tracing::debug!(
            model = %config.ai.model,
            max_context_tokens = config.ai.limits.max_context_tokens,
            stt = config.stt.provider.as_str(),
            tts = config.tts.provider.as_str(),
            obs = config.obs.is_some(),
            "configuration resolved"
        );

        Ok(config)
    }

    /// Credential for the configured STT provider
    ///
    /// # Errors
    ///
    /// Returns error if the matching key is unset
    pub fn stt_api_key(&self) -> Result<SecretString> {
        let (key, var) = match self.stt.provider {
            SttProvider::Whisper => (&self.api_keys.openai, "OPENAI_API_KEY"),
            SttProvider::Deepgram => (&self.api_keys.deepgram, "DEEPGRAM_API_KEY"),
        };
        required(key.as_ref(), var, self.stt.provider.as_str())
    }

    /// Credential for the configured TTS provider
    ///
    /// # Errors
    ///
    /// Returns error if the matching key is unset
    pub fn tts_api_key(&self) -> Result<SecretString> {
        let (key, var) = match self.tts.provider {
            TtsProvider::OpenAI => (&self.api_keys.openai, "OPENAI_API_KEY"),
            TtsProvider::ElevenLabs => (&self.api_keys.elevenlabs, "ELEVENLABS_API_KEY"),
        };
        required(key.as_ref(), var, self.tts.provider.as_str())
    }

    /// Gemini credential
    #[must_use]
    pub fn gemini_api_key(&self) -> SecretString {
        copy_secret(&self.api_keys.gemini)
    }
}

fn validate_limits(limits: &ContextLimits) -> Result<()> {
    if limits.max_context_tokens == 0 {
        return Err(Error::Config(
            "ai.max_context_tokens must be greater than zero".to_string(),
        ));
    }

    let fraction = limits.trim_trigger_fraction;
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(Error::Config(format!(
            "ai.trim_trigger_fraction must be in (0, 1], got {fraction}"
        )));
    }

    Ok(())
}

fn required(key: Option<&SecretString>, var: &str, provider: &str) -> Result<SecretString> {
    key.map(copy_secret)
        .ok_or_else(|| Error::Config(format!("{var} is required for the {provider} provider")))
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}
