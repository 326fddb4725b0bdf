//! Speech-to-text (STT) processing

use secrecy::{ExposeSecret, SecretString};

use crate::config::SttProvider;
use crate::{Error, Result};

const WHISPER_BASE_URL: &str = "https://api.openai.com";
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    language: String,
    provider: SttProvider,
    base_url: String,
}

impl SpeechToText {
    /// Create a new STT instance for the given provider
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        provider: SttProvider,
        api_key: SecretString,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!(
                "{} API key required for STT",
                provider.as_str()
            )));
        }

        let base_url = match provider {
            SttProvider::Whisper => WHISPER_BASE_URL,
            SttProvider::Deepgram => DEEPGRAM_BASE_URL,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            language: language.into(),
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

    /// Transcribe WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await,
        }
    }

    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());
        if !self.language.is_empty() {
            form = form.text("language", self.language.clone());
        }

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let mut url = format!(
            "{}/v1/listen?model={}&punctuate=true",
            self.base_url,
            urlencoding::encode(&self.model)
        );
        if !self.language.is_empty() {
            url.push_str("&language=");
            url.push_str(&urlencoding::encode(&self.language));
        }

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Token {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;
        let transcript = result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default();

        tracing::debug!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_rejected() {
        let result = SpeechToText::new(
            SttProvider::Deepgram,
            SecretString::from(String::new()),
            "nova-2",
            "en",
        );
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("deepgram")));
    }

    #[tokio::test]
    async fn test_whisper_transcription() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/transcriptions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text": "what's the weather like"}"#)
            .create_async()
            .await;

        let stt = SpeechToText::new(
            SttProvider::Whisper,
            SecretString::from("sk-test".to_string()),
            "whisper-1",
            "en",
        )
        .unwrap()
        .with_base_url(server.url());

        let text = stt.transcribe(b"RIFF....WAVE").await.unwrap();
        assert_eq!(text, "what's the weather like");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_deepgram_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/listen")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body("invalid credentials")
            .create_async()
            .await;

        let stt = SpeechToText::new(
            SttProvider::Deepgram,
            SecretString::from("dg-test".to_string()),
            "nova-2",
            "en",
        )
        .unwrap()
        .with_base_url(server.url());

        let err = stt.transcribe(b"RIFF").await.unwrap_err();
        assert!(matches!(err, Error::Stt(msg) if msg.contains("401")));
    }
}
