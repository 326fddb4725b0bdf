//! Primary/fallback speech synthesis

use super::SpeechBackend;
use crate::Error;

/// Outcome of synthesizing one reply
#[derive(Debug)]
pub enum Synthesis {
    /// Primary provider produced audio
    Primary(Vec<u8>),
    /// Primary failed, fallback produced audio
    Fallback { audio: Vec<u8>, primary_error: Error },
    /// Every provider failed
    Failed {
        primary_error: Error,
        fallback_error: Option<Error>,
    },
}

impl Synthesis {
    /// MP3 bytes, if any provider succeeded
    #[must_use]
    pub fn audio(&self) -> Option<&[u8]> {
        match self {
            Self::Primary(audio) | Self::Fallback { audio, .. } => Some(audio),
            Self::Failed { .. } => None,
        }
    }
}

/// Tries the primary voice, then the fallback voice
pub struct SpeechSynthesizer {
    primary: Box<dyn SpeechBackend>,
    fallback: Option<Box<dyn SpeechBackend>>,
}

impl SpeechSynthesizer {
    #[must_use]
    pub fn new(primary: Box<dyn SpeechBackend>, fallback: Option<Box<dyn SpeechBackend>>) -> Self {
        Self { primary, fallback }
    }

    /// Synthesize `text`, falling back on primary failure
    pub async fn synthesize(&self, text: &str) -> Synthesis {
        let primary_error = match self.primary.synthesize(text).await {
            Ok(audio) => return Synthesis::Primary(audio),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            tracing::error!(provider = self.primary.name(), error = %primary_error, "TTS failed, no fallback configured");
            return Synthesis::Failed {
                primary_error,
                fallback_error: None,
            };
        };

        tracing::warn!(
            provider = self.primary.name(),
            fallback = fallback.name(),
            error = %primary_error,
            "TTS failed, falling back"
        );

        match fallback.synthesize(text).await {
            Ok(audio) => Synthesis::Fallback {
                audio,
                primary_error,
            },
            Err(fallback_error) => {
                tracing::error!(provider = fallback.name(), error = %fallback_error, "fallback TTS failed");
                Synthesis::Failed {
                    primary_error,
                    fallback_error: Some(fallback_error),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::Result;

    struct Fixed(Option<Vec<u8>>);

    #[async_trait]
    impl SpeechBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            self.0
                .clone()
                .ok_or_else(|| Error::Tts("provider down".to_string()))
        }
    }

    fn ok(bytes: &[u8]) -> Box<dyn SpeechBackend> {
        Box::new(Fixed(Some(bytes.to_vec())))
    }

    fn failing() -> Box<dyn SpeechBackend> {
        Box::new(Fixed(None))
    }

    #[tokio::test]
    async fn test_primary_wins() {
        let synth = SpeechSynthesizer::new(ok(&[1]), Some(ok(&[2])));
        let result = synth.synthesize("hi").await;
        assert!(matches!(result, Synthesis::Primary(_)));
        assert_eq!(result.audio(), Some(&[1_u8][..]));
    }

    #[tokio::test]
    async fn test_falls_back() {
        let synth = SpeechSynthesizer::new(failing(), Some(ok(&[2])));
        let result = synth.synthesize("hi").await;
        assert!(matches!(result, Synthesis::Fallback { .. }));
        assert_eq!(result.audio(), Some(&[2_u8][..]));
    }

    #[tokio::test]
    async fn test_both_fail() {
        let synth = SpeechSynthesizer::new(failing(), Some(failing()));
        let result = synth.synthesize("hi").await;
        assert!(matches!(
            result,
            Synthesis::Failed {
                fallback_error: Some(_),
                ..
            }
        ));
        assert!(result.audio().is_none());

        let no_fallback = SpeechSynthesizer::new(failing(), None);
        assert!(no_fallback.synthesize("hi").await.audio().is_none());
    }
}
