//! Operator signals from the terminal
//!
//! Enter starts a listening cycle, `/clear` forgets the conversation,
//! `/quit`, `/exit` or end of input shuts down.

use std::io::{self, BufRead};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Error, Result};

const INPUT_BUFFER: usize = 16;

/// What the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Listen for one utterance and reply
    Activate,
    /// Forget the conversation so far
    ClearContext,
    /// Stop the assistant
    Shutdown,
}

/// Map one input line to a signal, `None` if unrecognized
#[must_use]
pub fn parse_command(line: &str) -> Option<Signal> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => Some(Signal::Activate),
        "/clear" => Some(Signal::ClearContext),
        "/quit" | "/exit" => Some(Signal::Shutdown),
        _ => None,
    }
}

/// Source of operator signals
#[async_trait]
pub trait ActivationSource: Send {
    /// Wait for the next signal
    ///
    /// # Errors
    ///
    /// Returns error if the source can no longer be read
    async fn next_signal(&mut self) -> Result<Signal>;
}

/// Reads signals from lines of text on a dedicated thread
///
/// The reader thread is detached so a blocked read never holds up
/// runtime shutdown.
pub struct StdinActivation {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl StdinActivation {
    /// Read signals from standard input
    ///
    /// # Errors
    ///
    /// Returns error if the reader thread cannot be started
    pub fn stdin() -> Result<Self> {
        Self::spawn(|| io::stdin().lines())
    }

    /// Read signals from any buffered reader
    ///
    /// # Errors
    ///
    /// Returns error if the reader thread cannot be started
    pub fn new<R: BufRead + Send + 'static>(reader: R) -> Result<Self> {
        Self::spawn(move || reader.lines())
    }

    fn spawn<F, I>(open: F) -> Result<Self>
    where
        F: FnOnce() -> I + Send + 'static,
        I: Iterator<Item = io::Result<String>>,
    {
        let (tx, rx) = mpsc::channel(INPUT_BUFFER);

        std::thread::Builder::new()
            .name("activation-input".to_string())
            .spawn(move || {
                for line in open() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })
            .map_err(|e| Error::Activation(format!("failed to start input reader: {e}")))?;

        Ok(Self { lines: rx })
    }
}

#[async_trait]
impl ActivationSource for StdinActivation {
    async fn next_signal(&mut self) -> Result<Signal> {
        loop {
            let Some(line) = self.lines.recv().await else {
                tracing::debug!("input closed");
                return Ok(Signal::Shutdown);
            };

            let line =
                line.map_err(|e| Error::Activation(format!("failed to read input: {e}")))?;

            if let Some(signal) = parse_command(&line) {
                return Ok(signal);
            }

            tracing::info!(
                input = line.trim(),
                "unknown command; press Enter to talk, /clear to reset, /quit to exit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(""), Some(Signal::Activate));
        assert_eq!(parse_command("  \r"), Some(Signal::Activate));
        assert_eq!(parse_command("/clear"), Some(Signal::ClearContext));
        assert_eq!(parse_command("/QUIT"), Some(Signal::Shutdown));
        assert_eq!(parse_command("/exit "), Some(Signal::Shutdown));
        assert_eq!(parse_command("hello"), None);
    }

    #[tokio::test]
    async fn test_lines_to_signals() {
        let input: &'static [u8] = b"\nwhat\n/clear\n\n";
        let mut source = StdinActivation::new(input).unwrap();

        assert_eq!(source.next_signal().await.unwrap(), Signal::Activate);
        // unknown line is skipped
        assert_eq!(source.next_signal().await.unwrap(), Signal::ClearContext);
        assert_eq!(source.next_signal().await.unwrap(), Signal::Activate);
        // end of input
        assert_eq!(source.next_signal().await.unwrap(), Signal::Shutdown);
    }

    /// Blocks every read until the sender is dropped
    struct HeldOpen(std::sync::mpsc::Receiver<()>);

    impl io::Read for HeldOpen {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_runtime_shutdown_not_blocked_by_open_input() {
        let (keep_open, held) = std::sync::mpsc::channel::<()>();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let mut source = StdinActivation::new(io::BufReader::new(HeldOpen(held))).unwrap();
            tokio::select! {
                signal = source.next_signal() => panic!("unexpected signal {signal:?}"),
                () = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        });

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(1));

        drop(keep_open);
    }

    #[tokio::test]
    async fn test_read_error_is_activation_error() {
        struct Broken;

        impl io::Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("terminal went away"))
            }
        }

        let mut source = StdinActivation::new(io::BufReader::new(Broken)).unwrap();
        let err = source.next_signal().await.unwrap_err();
        assert!(matches!(err, Error::Activation(msg) if msg.contains("terminal went away")));
        // reader thread stopped after the error
        assert_eq!(source.next_signal().await.unwrap(), Signal::Shutdown);
    }
}
