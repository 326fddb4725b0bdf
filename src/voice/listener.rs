//! Microphone listener: capture one utterance and transcribe it

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{
    AudioCapture, SAMPLE_RATE, SegmenterConfig, SpeechInput, SpeechToText, UtteranceDetector,
    UtteranceState, samples_to_wav,
};
use crate::Result;

/// How often the capture buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Speech input backed by the default microphone
pub struct MicrophoneListener {
    capture: AudioCapture,
    detector: UtteranceDetector,
    stt: SpeechToText,
    silence_timeout: Duration,
}

impl MicrophoneListener {
    /// Create a listener
    ///
    /// `silence_timeout` bounds how long to wait for speech to begin.
    #[must_use]
    pub fn new(
        capture: AudioCapture,
        stt: SpeechToText,
        segmenter: SegmenterConfig,
        silence_timeout: Duration,
    ) -> Self {
        Self {
            capture,
            detector: UtteranceDetector::new(segmenter),
            stt,
            silence_timeout,
        }
    }

    /// Record until one utterance completes, or `None` on timeout
    async fn record_utterance(&mut self) -> Result<Option<Vec<f32>>> {
        self.detector.reset();
        self.capture.clear_buffer();
        self.capture.start()?;

        tracing::info!("listening... speak now");
        let deadline = Instant::now() + self.silence_timeout;

        let utterance = loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let samples = self.capture.take_buffer();
            match self.detector.process(&samples) {
                UtteranceState::Complete => break Some(self.detector.take_utterance()),
                UtteranceState::Waiting if Instant::now() >= deadline => break None,
                UtteranceState::Waiting | UtteranceState::Speaking => {}
            }
        };

        self.capture.stop();
        Ok(utterance)
    }
}

#[async_trait(?Send)]
impl SpeechInput for MicrophoneListener {
    async fn listen_once(&mut self) -> Result<String> {
        let Some(samples) = self.record_utterance().await? else {
            tracing::debug!(timeout = ?self.silence_timeout, "no speech before timeout");
            return Ok(String::new());
        };

        tracing::debug!(samples = samples.len(), "processing utterance");
        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        let transcript = self.stt.transcribe(&wav).await?;

        Ok(transcript.trim().to_string())
    }

    async fn shutdown(&mut self) {
        self.capture.stop();
        self.detector.reset();
        tracing::debug!("microphone listener shut down");
    }
}
