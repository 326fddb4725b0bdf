//! Utterance segmentation
//!
//! Splits a microphone stream into a single utterance using RMS energy:
//! speech starts when energy crosses the threshold and ends after a run of
//! trailing silence.

use std::time::Duration;

use super::SAMPLE_RATE;

/// Segmentation thresholds
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// RMS energy above which a chunk counts as speech
    pub energy_threshold: f32,
    /// Shortest utterance worth transcribing
    pub min_speech: Duration,
    /// Silence that ends an utterance
    pub trailing_silence: Duration,
    /// Hard cap on a single utterance
    pub max_utterance: Duration,
    pub sample_rate: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.03,
            min_speech: Duration::from_secs(1),
            trailing_silence: Duration::from_secs(1),
            max_utterance: Duration::from_secs(30),
            sample_rate: SAMPLE_RATE,
        }
    }
}

impl SegmenterConfig {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn samples(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * f64::from(self.sample_rate)) as usize
    }
}

/// Segmentation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    /// No speech yet
    Waiting,
    /// Speech in progress
    Speaking,
    /// Utterance finished, ready to transcribe
    Complete,
}

/// Detects the start and end of one utterance
pub struct UtteranceDetector {
    state: UtteranceState,
    buffer: Vec<f32>,
    silence_counter: usize,
    min_speech_samples: usize,
    silence_samples: usize,
    max_samples: usize,
    energy_threshold: f32,
}

impl UtteranceDetector {
    #[must_use]
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            state: UtteranceState::Waiting,
            buffer: Vec::new(),
            silence_counter: 0,
            min_speech_samples: config.samples(config.min_speech),
            silence_samples: config.samples(config.trailing_silence),
            max_samples: config.samples(config.max_utterance),
            energy_threshold: config.energy_threshold,
        }
    }

    /// Feed a chunk of samples and return the new state
    pub fn process(&mut self, samples: &[f32]) -> UtteranceState {
        if samples.is_empty() {
            return self.state;
        }

        let energy = calculate_energy(samples);
        let is_speech = energy > self.energy_threshold;

        match self.state {
            UtteranceState::Waiting => {
                if is_speech {
                    tracing::info!("recording started");
                    self.state = UtteranceState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                }
            }
            UtteranceState::Speaking => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                tracing::trace!(
                    buffer_len = self.buffer.len(),
                    silence = self.silence_counter,
                    energy,
                    "speaking"
                );

                if self.buffer.len() >= self.max_samples {
                    tracing::debug!(samples = self.buffer.len(), "utterance hit length cap");
                    self.state = UtteranceState::Complete;
                } else if self.silence_counter > self.silence_samples {
                    if self.speech_samples() >= self.min_speech_samples {
                        tracing::info!(samples = self.buffer.len(), "recording stopped");
                        self.state = UtteranceState::Complete;
                    } else {
                        // Too short to be speech: a cough or a click
                        tracing::debug!("discarding short noise burst");
                        self.reset();
                    }
                }
            }
            UtteranceState::Complete => {}
        }

        self.state
    }

    /// Samples of the buffer that are not trailing silence
    fn speech_samples(&self) -> usize {
        self.buffer.len().saturating_sub(self.silence_counter)
    }

    /// Take the finished utterance and reset to waiting
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.buffer);
        self.reset();
        utterance
    }

    /// Reset to waiting
    pub fn reset(&mut self) {
        self.state = UtteranceState::Waiting;
        self.buffer.clear();
        self.silence_counter = 0;
    }

    #[must_use]
    pub const fn state(&self) -> UtteranceState {
        self.state
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
