//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use chatterbox::activation::{ActivationSource, Signal};
use chatterbox::context::{ContextLimits, ConversationContext, TokenEstimator, Turn};
use chatterbox::llm::{ChatProvider, Generation, ProviderError};
use chatterbox::overlay::SceneController;
use chatterbox::voice::{AudioClip, AudioOutput, SpeechBackend, SpeechInput};
use chatterbox::{Error, Result};

/// Ordered record of side effects across test doubles
pub type EventLog = Arc<Mutex<Vec<String>>>;

#[must_use]
pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[must_use]
pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Empty context with default limits and word-based estimation
#[must_use]
pub fn test_context(system_instruction: &str) -> ConversationContext {
    ConversationContext::new(
        system_instruction,
        ContextLimits::default(),
        TokenEstimator::default(),
    )
}

/// Write a settings document into `dir`
pub fn write_settings(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("config.yaml");
    std::fs::write(&path, yaml).expect("failed to write settings");
    path
}

/// Speech input replaying canned transcripts
pub struct ScriptedSpeech {
    transcripts: VecDeque<Result<String>>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl ScriptedSpeech {
    pub fn new(transcripts: Vec<Result<String>>) -> Self {
        Self {
            transcripts: transcripts.into(),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn saying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok((*t).to_string())).collect())
    }
}

#[async_trait(?Send)]
impl SpeechInput for ScriptedSpeech {
    async fn listen_once(&mut self) -> Result<String> {
        self.transcripts.pop_front().unwrap_or_else(|| Ok(String::new()))
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Chat provider replaying canned results and recording requests
#[derive(Default)]
pub struct ScriptedProvider {
    results: Mutex<VecDeque<std::result::Result<String, ProviderError>>>,
    pub requests: Mutex<Vec<(String, Vec<Turn>)>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<std::result::Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok((*t).to_string())).collect())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<Vec<Turn>> {
        self.requests.lock().unwrap().last().map(|(_, turns)| turns.clone())
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn generate(
        &self,
        system_instruction: &str,
        turns: &[Turn],
    ) -> std::result::Result<Generation, ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((system_instruction.to_string(), turns.to_vec()));

        let next = self
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()));
        next.map(|text| Generation { text, usage: None })
    }
}

/// TTS backend that returns fixed bytes or fails, recording inputs
pub struct FakeVoice {
    name: &'static str,
    audio: Option<Vec<u8>>,
    pub spoken: Arc<Mutex<Vec<String>>>,
}

impl FakeVoice {
    pub fn ok(name: &'static str, audio: &[u8]) -> Self {
        Self {
            name,
            audio: Some(audio.to_vec()),
            spoken: Arc::default(),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            audio: None,
            spoken: Arc::default(),
        }
    }
}

#[async_trait]
impl SpeechBackend for FakeVoice {
    fn name(&self) -> &str {
        self.name
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.spoken.lock().unwrap().push(text.to_string());
        self.audio
            .clone()
            .ok_or_else(|| Error::Tts(format!("{} is down", self.name)))
    }
}

/// Audio output that records load/play/unload without a device
pub struct RecordingOutput {
    log: EventLog,
    fail_play: bool,
}

impl RecordingOutput {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: Arc::clone(log),
            fail_play: false,
        }
    }

    pub fn broken(log: &EventLog) -> Self {
        Self {
            log: Arc::clone(log),
            fail_play: true,
        }
    }
}

impl AudioOutput for RecordingOutput {
    fn load(&mut self, mp3: &[u8]) -> Result<AudioClip> {
        self.log.lock().unwrap().push(format!("load {mp3:?}"));
        Ok(AudioClip::new(vec![0.0; 16], 16_000))
    }

    fn play(&mut self, _clip: &AudioClip) -> Result<()> {
        if self.fail_play {
            return Err(Error::Audio("output device disappeared".to_string()));
        }
        self.log.lock().unwrap().push("play".to_string());
        Ok(())
    }

    fn unload(&mut self) {
        self.log.lock().unwrap().push("unload".to_string());
    }
}

/// Scene controller that records toggles
pub struct RecordingScene {
    log: EventLog,
}

impl RecordingScene {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: Arc::clone(log),
        }
    }
}

#[async_trait]
impl SceneController for RecordingScene {
    async fn set_source_visible(&mut self, scene: &str, source: &str, visible: bool) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("source {scene}/{source} {visible}"));
        Ok(())
    }

    async fn set_filter_enabled(&mut self, source: &str, filter: &str, enabled: bool) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("filter {source}/{filter} {enabled}"));
        Ok(())
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().push("close".to_string());
    }
}

/// Activation source replaying canned signals, then shutting down
pub struct ScriptedActivation(pub VecDeque<Signal>);

impl ScriptedActivation {
    pub fn new(signals: &[Signal]) -> Self {
        Self(signals.iter().copied().collect())
    }
}

#[async_trait]
impl ActivationSource for ScriptedActivation {
    async fn next_signal(&mut self) -> Result<Signal> {
        Ok(self.0.pop_front().unwrap_or(Signal::Shutdown))
    }
}
