//! Voice processing module
//!
//! Handles microphone capture, utterance segmentation, STT, TTS and
//! playback. The traits below are what the assistant loop talks to.

mod capture;
mod google_tts;
mod listener;
mod playback;
mod stt;
mod synthesis;
mod tts;
mod utterance;

use async_trait::async_trait;

use crate::Result;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use google_tts::{GoogleTranslateTts, split_for_tts};
pub use listener::MicrophoneListener;
pub use playback::{AudioClip, AudioPlayback, decode_mp3};
pub use stt::SpeechToText;
pub use synthesis::{SpeechSynthesizer, Synthesis};
pub use tts::TextToSpeech;
pub use utterance::{SegmenterConfig, UtteranceDetector, UtteranceState};

/// Blocking speech capture
#[async_trait(?Send)]
pub trait SpeechInput {
    /// Wait for one utterance and return its transcript
    ///
    /// Returns an empty string when nothing was heard before the silence
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns error if capture or transcription fails
    async fn listen_once(&mut self) -> Result<String>;

    /// Release the capture device
    async fn shutdown(&mut self);
}

/// A text-to-speech provider
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Speaker output
pub trait AudioOutput {
    /// Decode MP3 bytes into a playable clip
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails
    fn load(&mut self, mp3: &[u8]) -> Result<AudioClip>;

    /// Start playing a clip without waiting for it to finish
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be started
    fn play(&mut self, clip: &AudioClip) -> Result<()>;

    /// Stop playback and release the output stream
    fn unload(&mut self);
}
