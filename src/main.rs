use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chatterbox::activation::StdinActivation;
use chatterbox::config::TtsProvider;
use chatterbox::context::{ConversationContext, TokenEstimator};
use chatterbox::llm::{CompletionClient, GeminiClient};
use chatterbox::overlay::OverlayCues;
use chatterbox::voice::{
    AudioCapture, AudioClip, AudioOutput, AudioPlayback, GoogleTranslateTts, MicrophoneListener,
    SAMPLE_RATE, SegmenterConfig, SpeechBackend, SpeechSynthesizer, SpeechToText, TextToSpeech,
    decode_mp3,
};
use chatterbox::{Assistant, Config};

/// Chatterbox - push-to-talk voice assistant
#[derive(Parser)]
#[command(name = "chatterbox", version, about)]
struct Cli {
    /// Path to the settings document
    #[arg(short, long, env = "CHATTERBOX_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,chatterbox=info",
        1 => "info,chatterbox=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to read .env"),
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&cli.config, &text).await,
        };
    }

    tracing::info!(config = %cli.config.display(), "starting chatterbox");
    let config = Config::load(&cli.config)?;

    let mut assistant = build_assistant(&config)?;

    if let Some(obs) = config.obs {
        match OverlayCues::connect(obs).await {
            Ok(cues) => assistant = assistant.with_overlay(cues),
            Err(e) => tracing::warn!(error = %e, "OBS unavailable, overlay cues disabled"),
        }
    }

    if let Some(path) = &config.startup_sound {
        play_startup_sound(path).await;
    }

    let mut activation = StdinActivation::stdin()?;
    assistant.run(&mut activation).await?;

    Ok(())
}

fn build_assistant(config: &Config) -> anyhow::Result<Assistant> {
    let mut gemini = GeminiClient::new(config.gemini_api_key(), &config.ai.model)?;
    if let Some(url) = &config.ai.base_url {
        gemini = gemini.with_base_url(url);
    }
    let gemini = Arc::new(gemini);

    let estimator = TokenEstimator::new(Arc::<GeminiClient>::clone(&gemini), config.ai.tokens_per_word);
    let context = ConversationContext::new(
        config.ai.system_instruction.clone(),
        config.ai.limits,
        estimator.clone(),
    );

    let mut completion = CompletionClient::new(gemini);
    if config.ai.show_token_usage {
        completion = completion.with_usage_reporting(estimator);
    }

    let stt = SpeechToText::new(
        config.stt.provider,
        config.stt_api_key()?,
        config.stt.model.clone(),
        config.stt.language.clone(),
    )?;
    let listener = MicrophoneListener::new(
        AudioCapture::new()?,
        stt,
        SegmenterConfig::default(),
        config.stt.silence_timeout,
    );

    let synthesizer = SpeechSynthesizer::new(
        primary_voice(config)?,
        Some(Box::new(GoogleTranslateTts::new(config.tts.language.clone()))),
    );

    tracing::info!(
        model = %config.ai.model,
        stt = config.stt.provider.as_str(),
        tts = config.tts.provider.as_str(),
        max_context_tokens = config.ai.limits.max_context_tokens,
        "assistant configured"
    );

    Ok(Assistant::new(
        context,
        completion,
        Box::new(listener),
        synthesizer,
        Box::new(AudioPlayback::new()?),
    ))
}

fn primary_voice(config: &Config) -> anyhow::Result<Box<dyn SpeechBackend>> {
    let key = config.tts_api_key()?;
    let tts = match config.tts.provider {
        TtsProvider::OpenAI => TextToSpeech::new_openai(
            key,
            config.tts.voice.clone(),
            config.tts.speed,
            config.tts.model.clone(),
        )?,
        TtsProvider::ElevenLabs => {
            TextToSpeech::new_elevenlabs(key, config.tts.voice.clone(), config.tts.model.clone())?
        }
    };
    Ok(Box::new(tts))
}

/// Play the configured startup sound, logging failures
#[allow(clippy::future_not_send)]
async fn play_startup_sound(path: &Path) {
    let loaded = std::fs::read(path)
        .map_err(chatterbox::Error::from)
        .and_then(|bytes| decode_mp3(&bytes));
    let clip = match loaded {
        Ok(clip) => clip,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load startup sound");
            return;
        }
    };

    let result = match AudioPlayback::new() {
        Ok(mut playback) => playback.play_to_end(&clip).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to play startup sound");
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    let threshold = SegmenterConfig::default().energy_threshold;
    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);
        let speech = if energy > threshold { "speech" } else { "" };

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}] {}",
            i + 1,
            energy,
            peak,
            meter,
            speech
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("Lines marked \"speech\" are loud enough to start an utterance.");

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    let mut playback = AudioPlayback::new()?;
    playback.play_to_end(&AudioClip::new(samples, sample_rate)).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test primary and fallback TTS output
#[allow(clippy::future_not_send)]
async fn test_tts(config_path: &Path, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(config_path)?;
    let synthesizer = SpeechSynthesizer::new(
        primary_voice(&config)?,
        Some(Box::new(GoogleTranslateTts::new(config.tts.language.clone()))),
    );

    println!("Synthesizing speech...");
    let synthesis = synthesizer.synthesize(text).await;
    let mp3_data = synthesis
        .audio()
        .ok_or_else(|| anyhow::anyhow!("TTS synthesis failed: {synthesis:?}"))?;
    println!("Got {} bytes of audio data", mp3_data.len());

    let mut playback = AudioPlayback::new()?;
    let clip = playback.load(mp3_data)?;
    println!("Playing {:.1}s of audio...", clip.duration().as_secs_f32());
    playback.play_to_end(&clip).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["chatterbox"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_subcommand() {
        let cli = Cli::try_parse_from(["chatterbox", "-vv", "test-tts", "hi there"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Some(Command::TestTts { text }) if text == "hi there"));
    }

    #[test]
    fn test_rms() {
        assert!(calculate_rms(&[]).abs() < f32::EPSILON);
        assert!((calculate_rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
    }
}
