//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use super::AudioOutput;
use crate::{Error, Result};

/// Decoded mono audio ready for playback
#[derive(Debug, Clone)]
pub struct AudioClip {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioClip {
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playing time of the clip
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Plays clips on the default output device
pub struct AudioPlayback {
    device: Device,
    stream: Option<Stream>,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self {
            device,
            stream: None,
        })
    }

    /// Find an output config at `sample_rate`, preferring mono
    fn native_config(&self, sample_rate: u32) -> Option<StreamConfig> {
        let rate = SampleRate(sample_rate);
        let supports = |channels: u16| {
            self.device.supported_output_configs().ok()?.find(|c| {
                c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        };

        supports(1)
            .or_else(|| supports(2))
            .map(|c| c.with_sample_rate(rate).config())
    }

    /// Output config for a clip, falling back to the device's default rate
    fn config_for(&self, sample_rate: u32) -> Result<StreamConfig> {
        if let Some(config) = self.native_config(sample_rate) {
            return Ok(config);
        }

        let config = self
            .device
            .default_output_config()
            .map_err(|e| Error::Audio(format!("no usable output config: {e}")))?
            .config();

        tracing::debug!(
            clip_rate = sample_rate,
            device_rate = config.sample_rate.0,
            "device does not support clip rate, resampling"
        );
        Ok(config)
    }

    /// Play a clip and wait for it to finish
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot start
    pub async fn play_to_end(&mut self, clip: &AudioClip) -> Result<()> {
        self.play(clip)?;
        tokio::time::sleep(clip.duration() + Duration::from_millis(100)).await;
        self.unload();
        Ok(())
    }
}

impl AudioOutput for AudioPlayback {
    fn load(&mut self, mp3: &[u8]) -> Result<AudioClip> {
        decode_mp3(mp3)
    }

    fn play(&mut self, clip: &AudioClip) -> Result<()> {
        self.unload();
        if clip.samples().is_empty() {
            return Ok(());
        }

        let config = self.config_for(clip.sample_rate())?;
        let channels = usize::from(config.channels);
        let samples: Arc<[f32]> = if config.sample_rate.0 == clip.sample_rate() {
            Arc::clone(&clip.samples)
        } else {
            resample(clip.samples(), clip.sample_rate(), config.sample_rate.0)?.into()
        };
        let position = Arc::new(AtomicUsize::new(0));

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!(
            samples = clip.samples().len(),
            sample_rate = clip.sample_rate(),
            duration = ?clip.duration(),
            "playback started"
        );
        Ok(())
    }

    fn unload(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("playback stopped");
        }
    }
}

/// Decode MP3 bytes to a mono clip
///
/// # Errors
///
/// Returns error if the data contains no decodable frames
pub fn decode_mp3(mp3_data: &[u8]) -> Result<AudioClip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or_default();
                }

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => {}
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("MP3 contained no audio frames".to_string()));
    }

    Ok(AudioClip::new(samples, sample_rate))
}

/// Resample mono audio between rates using rubato
///
/// # Errors
///
/// Returns error if the resampler rejects the rates
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let chunk_size = 1024;
    let mut resampler = FftFixedIn::<f64>::new(
        from_rate as usize,
        to_rate as usize,
        chunk_size,
        2,
        1,
    )
    .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let expected =
        (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).round() as usize;
    let mut output = Vec::with_capacity(expected + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        // Last chunk is zero-padded, the tail is cut below
        let mut input: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        input.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[input], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    output.truncate(expected);
    Ok(output)
}
