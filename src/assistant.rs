//! Conversation orchestrator
//!
//! One cycle: listen, complete, remember, speak. Cycles run strictly one
//! at a time; the context is owned here and never shared.

use crate::activation::{ActivationSource, Signal};
use crate::context::ConversationContext;
use crate::llm::{CompletionClient, CompletionError};
use crate::overlay::OverlayCues;
use crate::voice::{AudioOutput, SpeechInput, SpeechSynthesizer};
use crate::Result;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantState {
    Idle,
    Processing,
}

/// How a cycle ended
#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing was heard, or transcription failed
    NoSpeech,
    /// Reply recorded and spoken
    Replied(String),
    /// Model gave no usable reply; context untouched
    CompletionFailed(CompletionError),
    /// Reply recorded but no audio could be produced
    SynthesisFailed,
}

/// Voice assistant
pub struct Assistant {
    context: ConversationContext,
    completion: CompletionClient,
    speech: Box<dyn SpeechInput>,
    synthesizer: SpeechSynthesizer,
    output: Box<dyn AudioOutput>,
    overlay: Option<OverlayCues>,
    state: AssistantState,
}

impl Assistant {
    #[must_use]
    pub fn new(
        context: ConversationContext,
        completion: CompletionClient,
        speech: Box<dyn SpeechInput>,
        synthesizer: SpeechSynthesizer,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            context,
            completion,
            speech,
            synthesizer,
            output,
            overlay: None,
            state: AssistantState::Idle,
        }
    }

    /// Toggle overlay cues while replies play
    #[must_use]
    pub fn with_overlay(mut self, overlay: OverlayCues) -> Self {
        self.overlay = Some(overlay);
        self
    }

    #[must_use]
    pub const fn state(&self) -> AssistantState {
        self.state
    }

    #[must_use]
    pub const fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Handle signals until shutdown or a fatal error
    ///
    /// Ctrl-C is treated as a shutdown request. Speech capture is shut down
    /// before returning either way.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the loop
    #[allow(clippy::future_not_send)]
    pub async fn run(&mut self, activation: &mut dyn ActivationSource) -> Result<()> {
        tracing::info!("ready - press Enter to talk, /clear to reset, /quit to exit");

        let result = loop {
            let signal = tokio::select! {
                signal = activation.next_signal() => signal,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received");
                    Ok(Signal::Shutdown)
                }
            };

            match signal {
                Ok(Signal::Activate) => match self.process_cycle().await {
                    Ok(outcome) => tracing::debug!(?outcome, "cycle finished"),
                    Err(e) if e.is_fatal() => break Err(e),
                    Err(e) => tracing::warn!(error = %e, "cycle failed"),
                },
                Ok(Signal::ClearContext) => {
                    let turns = self.context.len();
                    self.context.clear();
                    tracing::info!(turns, "conversation context cleared");
                }
                Ok(Signal::Shutdown) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.shutdown().await;
        result
    }

    /// Run one listen → reply cycle
    ///
    /// # Errors
    ///
    /// Returns error on audio device failures
    #[allow(clippy::future_not_send)]
    pub async fn process_cycle(&mut self) -> Result<CycleOutcome> {
        self.state = AssistantState::Processing;
        let outcome = self.cycle().await;
        self.state = AssistantState::Idle;
        outcome
    }

    #[allow(clippy::future_not_send)]
    async fn cycle(&mut self) -> Result<CycleOutcome> {
        let transcript = match self.speech.listen_once().await {
            Ok(transcript) => transcript,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                return Ok(CycleOutcome::NoSpeech);
            }
        };

        let transcript = transcript.trim();
        if transcript.is_empty() {
            tracing::info!("no speech detected");
            return Ok(CycleOutcome::NoSpeech);
        }
        tracing::info!(transcript, "heard");

        let history = self.context.snapshot();
        let outcome = self
            .completion
            .complete(self.context.system_instruction(), &history, transcript)
            .await;

        let reply = match outcome.into_result() {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "no reply, context unchanged");
                return Ok(CycleOutcome::CompletionFailed(e));
            }
        };
        tracing::info!(%reply, "assistant reply");

        let report = self.context.append(transcript, reply.clone()).await;
        tracing::debug!(
            tokens = report.estimated_tokens,
            evicted = report.turns_evicted,
            turns = self.context.len(),
            "context updated"
        );

        let synthesis = self.synthesizer.synthesize(&reply).await;
        let Some(audio) = synthesis.audio() else {
            return Ok(CycleOutcome::SynthesisFailed);
        };

        if !self.speak(audio).await? {
            return Ok(CycleOutcome::SynthesisFailed);
        }

        Ok(CycleOutcome::Replied(reply))
    }

    /// Play MP3 audio with overlay cues, `false` if the audio is undecodable
    #[allow(clippy::future_not_send)]
    async fn speak(&mut self, audio: &[u8]) -> Result<bool> {
        let clip = match self.output.load(audio) {
            Ok(clip) => clip,
            Err(e) => {
                tracing::error!(error = %e, bytes = audio.len(), "failed to decode speech audio");
                return Ok(false);
            }
        };

        self.output.play(&clip)?;

        if let Some(overlay) = &mut self.overlay {
            overlay.show().await;
        }

        let duration = clip.duration();
        tracing::debug!(?duration, "speaking");
        tokio::time::sleep(duration).await;

        if let Some(overlay) = &mut self.overlay {
            overlay.hide().await;
        }

        self.output.unload();
        Ok(true)
    }

    #[allow(clippy::future_not_send)]
    async fn shutdown(&mut self) {
        tracing::info!("shutting down");
        self.speech.shutdown().await;
        self.output.unload();
        if let Some(overlay) = &mut self.overlay {
            overlay.close().await;
        }
    }
}
