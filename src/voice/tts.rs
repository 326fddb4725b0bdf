//! Text-to-speech (TTS) through hosted voice APIs

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::SpeechBackend;
use crate::config::TtsProvider;
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Synthesizes speech with `OpenAI` or `ElevenLabs`
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f64,
    model: String,
    provider: TtsProvider,
    base_url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(
        api_key: SecretString,
        voice: String,
        speed: f64,
        model: Option<String>,
    ) -> Result<Self> {
        Self::build(
            TtsProvider::OpenAI,
            api_key,
            voice,
            speed,
            model.unwrap_or_else(|| "tts-1".to_string()),
        )
    }

    /// Create a new TTS instance using `ElevenLabs`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(
        api_key: SecretString,
        voice_id: String,
        model: Option<String>,
    ) -> Result<Self> {
        // ElevenLabs doesn't use speed in the same way
        Self::build(
            TtsProvider::ElevenLabs,
            api_key,
            voice_id,
            1.0,
            model.unwrap_or_else(|| "eleven_monolingual_v1".to_string()),
        )
    }

    fn build(
        provider: TtsProvider,
        api_key: SecretString,
        voice: String,
        speed: f64,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!(
                "{} API key required for TTS",
                provider.as_str()
            )));
        }

        let base_url = match provider {
            TtsProvider::OpenAI => OPENAI_BASE_URL,
            TtsProvider::ElevenLabs => ELEVENLABS_BASE_URL,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            provider,
            base_url: base_url.to_string(),
        })
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice);
        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for TextToSpeech {
    fn name(&self) -> &str {
        self.provider.as_str()
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let audio = match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await?,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await?,
        };

        if audio.is_empty() {
            return Err(Error::Tts(format!("{} returned no audio", self.name())));
        }
        Ok(audio)
    }
}
