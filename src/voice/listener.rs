//! Speech capture: record one utterance and return its transcript
//!
//! Recording stops on a fixed timer (auto-stop) or on an explicit stop
//! signal (manual). No audio energy analysis is done; the timer is a plain
//! upper bound on listening time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_duration, samples_to_wav};
use super::stt::SpeechToText;
use crate::Result;

/// Auto-stop waits this many silence thresholds before cutting the recording
pub const AUTO_STOP_FACTOR: u32 = 3;

/// Hard cap on a manual recording
pub const MANUAL_LISTEN_CAP: Duration = Duration::from_secs(120);

/// Recordings shorter than this are treated as "nothing said"
pub const MIN_SPEECH: Duration = Duration::from_millis(300);

/// How a recording is ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    /// Stop after `max_listen`, or earlier on the stop signal
    AutoStop { max_listen: Duration },
    /// Stop only on the stop signal (bounded by [`MANUAL_LISTEN_CAP`])
    Manual,
}

impl ListenMode {
    /// Auto-stop mode derived from a silence threshold
    #[must_use]
    pub fn auto_stop(silence_threshold: Duration) -> Self {
        Self::AutoStop {
            max_listen: silence_threshold * AUTO_STOP_FACTOR,
        }
    }

    /// Longest this mode will record
    #[must_use]
    pub const fn max_listen(self) -> Duration {
        match self {
            Self::AutoStop { max_listen } => max_listen,
            Self::Manual => MANUAL_LISTEN_CAP,
        }
    }

    #[must_use]
    pub const fn is_manual(self) -> bool {
        matches!(self, Self::Manual)
    }
}

/// Turns microphone input into a transcript
///
/// `Ok(None)` means no speech was detected. Not `Send`: audio streams are
/// bound to the thread that opened them.
#[async_trait(?Send)]
pub trait SpeechCapture {
    /// Record a single utterance and transcribe it
    ///
    /// # Errors
    ///
    /// Returns error if the device or the STT backend fails
    async fn listen(&mut self) -> Result<Option<String>>;
}

/// Microphone + STT backend implementation of [`SpeechCapture`]
pub struct MicrophoneListener {
    capture: AudioCapture,
    stt: SpeechToText,
    mode: ListenMode,
    stop: Arc<Notify>,
}

impl MicrophoneListener {
    #[must_use]
    pub fn new(capture: AudioCapture, stt: SpeechToText, mode: ListenMode) -> Self {
        Self {
            capture,
            stt,
            mode,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Handle that ends the current recording when notified
    ///
    /// Use `notify_waiters` so a press between recordings is not remembered.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.stop)
    }

    /// Change how subsequent recordings end
    pub const fn set_mode(&mut self, mode: ListenMode) {
        self.mode = mode;
    }
}

#[async_trait(?Send)]
impl SpeechCapture for MicrophoneListener {
    async fn listen(&mut self) -> Result<Option<String>> {
        let max_listen = self.mode.max_listen();
        self.capture.start()?;
        tracing::info!(
            max_secs = max_listen.as_secs_f32(),
            manual = self.mode.is_manual(),
            "listening"
        );

        tokio::select! {
            () = tokio::time::sleep(max_listen) => {
                tracing::debug!("listen timer elapsed");
            }
            () = self.stop.notified() => {
                tracing::debug!("listen stopped by user");
            }
        }

        let samples = self.capture.stop();
        if samples_duration(samples.len()) < MIN_SPEECH {
            tracing::debug!(samples = samples.len(), "recording too short");
            return Ok(None);
        }

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        let transcript = self.stt.transcribe(&wav).await?;

        Ok(non_blank(transcript))
    }
}

/// Trimmed transcript, or `None` when nothing was recognized
#[must_use]
pub fn non_blank(transcript: String) -> Option<String> {
    let trimmed = transcript.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == transcript.len() {
        Some(transcript)
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_stop_is_three_thresholds() {
        let mode = ListenMode::auto_stop(Duration::from_secs(2));
        assert_eq!(mode.max_listen(), Duration::from_secs(6));
        assert!(!mode.is_manual());

        let mode = ListenMode::auto_stop(Duration::from_millis(1500));
        assert_eq!(mode.max_listen(), Duration::from_millis(4500));
    }

    #[test]
    fn manual_is_capped() {
        assert_eq!(ListenMode::Manual.max_listen(), MANUAL_LISTEN_CAP);
        assert!(ListenMode::Manual.is_manual());
    }

    #[test]
    fn blank_transcripts_are_none() {
        assert_eq!(non_blank(String::new()), None);
        assert_eq!(non_blank("  \n".to_string()), None);
        assert_eq!(non_blank(" hi ".to_string()), Some("hi".to_string()));
        assert_eq!(non_blank("hi".to_string()), Some("hi".to_string()));
    }
}
