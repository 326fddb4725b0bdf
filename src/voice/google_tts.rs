//! Google Translate speech endpoint, used as the keyless fallback voice

use async_trait::async_trait;

use super::SpeechBackend;
use crate::{Error, Result};

const GOOGLE_BASE_URL: &str = "https://translate.google.com";

/// Longest text the endpoint accepts per request
const MAX_CHUNK_CHARS: usize = 100;

/// Keyless TTS via Google Translate
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    language: String,
    base_url: String,
}

impl GoogleTranslateTts {
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            language: language.into(),
            base_url: GOOGLE_BASE_URL.to_string(),
        }
    }

    /// Override the endpoint base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_chunk(&self, chunk: &str, index: usize, total: usize) -> Result<Vec<u8>> {
        let url = format!(
            "{}/translate_tts?ie=UTF-8&client=tw-ob&tl={}&q={}&total={total}&idx={index}&textlen={}",
            self.base_url,
            urlencoding::encode(&self.language),
            urlencoding::encode(chunk),
            chunk.chars().count(),
        );

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "Mozilla/5.0")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Tts(format!("Google TTS error {status}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for GoogleTranslateTts {
    fn name(&self) -> &str {
        "google"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let chunks = split_for_tts(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(Error::Tts("nothing to synthesize".to_string()));
        }

        // MP3 frames concatenate cleanly, so the chunks play back as one clip
        let mut audio = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, index, chunks.len()).await?);
        }

        tracing::debug!(chunks = chunks.len(), bytes = audio.len(), "Google TTS complete");
        Ok(audio)
    }
}

/// Split text into chunks of at most `max_chars`, breaking on whitespace
///
/// Words longer than `max_chars` are broken mid-word.
#[must_use]
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
