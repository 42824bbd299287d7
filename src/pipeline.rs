//! One conversational turn, end to end
//!
//! transcript → history → model session → history → cleanup → synthesis.
//! The pipeline keeps no conversation state of its own; everything it
//! mutates lives in the [`SessionState`] passed in.

use std::sync::Arc;

use serde::Serialize;

use crate::Error;
use crate::session::{Message, SessionState};
use crate::voice::{SpeechSynthesizer, VoiceConfig, clean_text_for_speech};

/// Why a turn (or part of one) produced no result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Capture produced no transcript
    NoSpeech,
    /// The microphone or the transcription backend failed
    Capture,
    /// The model call failed or returned nothing usable
    ModelInvocation,
    /// Speech synthesis failed
    Synthesis,
    /// A required credential or setting is missing
    Configuration,
}

impl FailureKind {
    /// What the user is told
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::NoSpeech => "I didn't hear anything. Please try speaking again.",
            Self::Capture => {
                "I couldn't record or transcribe that. Please check your microphone and try again."
            }
            Self::ModelInvocation => {
                "I couldn't reach the assistant. Please try again or check your internet connection."
            }
            Self::Synthesis => "I couldn't generate speech for that reply.",
            Self::Configuration => "I'm not configured correctly.",
        }
    }
}

impl From<&Error> for FailureKind {
    /// Kind of a failed recording or transcription
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) => Self::Configuration,
            _ => Self::Capture,
        }
    }
}

/// A failure with its kind and the underlying detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl TurnFailure {
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl std::fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.user_message(), self.detail)
    }
}

/// Result of one turn
///
/// After the model stage exactly one of `assistant_text` and `error` is set.
/// An idle turn (empty transcript) has neither. `audio` is independent: a
/// synthesis failure leaves it `None` and is reported in `synthesis_error`
/// without failing the turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub transcript: String,
    pub assistant_text: Option<String>,
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
    pub error: Option<TurnFailure>,
    pub synthesis_error: Option<TurnFailure>,
}

impl TurnOutcome {
    /// Outcome of a turn with nothing to process
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// True when no turn was taken
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.assistant_text.is_none() && self.error.is_none()
    }

    /// True when the model produced a reply
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.assistant_text.is_some()
    }
}

/// Drives turns against an explicit [`SessionState`]
#[derive(Clone)]
pub struct TurnPipeline {
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl TurnPipeline {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synthesizer }
    }

    /// Process one user turn
    ///
    /// A blank transcript is "no speech" and leaves `state` untouched. The
    /// user message is appended before the model call, so a failed call
    /// leaves an unanswered user turn and no assistant message. Nothing is
    /// retried.
    pub async fn process_turn(
        &self,
        state: &mut SessionState,
        transcript: &str,
        voice: &VoiceConfig,
    ) -> TurnOutcome {
        if transcript.trim().is_empty() {
            tracing::debug!("empty transcript, nothing to do");
            return TurnOutcome::idle();
        }

        tracing::info!(transcript, "processing turn");
        state.append_message(Message::user(transcript));

        let mut outcome = TurnOutcome {
            transcript: transcript.to_string(),
            ..TurnOutcome::default()
        };

        let reply = match state.get_or_create_model_session().send(transcript).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "model invocation failed");
                outcome.error = Some(TurnFailure::new(FailureKind::ModelInvocation, e.to_string()));
                return outcome;
            }
        };

        state.append_message(Message::assistant(reply.clone()));

        let spoken = clean_text_for_speech(&reply);
        match self.synthesizer.synthesize(&spoken, voice).await {
            Ok(audio) if !audio.is_empty() => outcome.audio = Some(audio),
            Ok(_) => {
                tracing::warn!(provider = self.synthesizer.name(), "synthesis returned no audio");
                outcome.synthesis_error = Some(TurnFailure::new(
                    FailureKind::Synthesis,
                    "synthesizer returned no audio",
                ));
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.synthesizer.name(),
                    error = %e,
                    "speech synthesis failed"
                );
                outcome.synthesis_error = Some(TurnFailure::new(FailureKind::Synthesis, e.to_string()));
            }
        }

        outcome.assistant_text = Some(reply);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_distinct() {
        let kinds = [
            FailureKind::NoSpeech,
            FailureKind::Capture,
            FailureKind::ModelInvocation,
            FailureKind::Synthesis,
            FailureKind::Configuration,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a.user_message(), b.user_message());
            }
        }
        assert!(FailureKind::ModelInvocation.user_message().contains("couldn't reach"));
        assert!(FailureKind::Synthesis.user_message().contains("couldn't generate speech"));
        assert!(FailureKind::NoSpeech.user_message().contains("didn't hear anything"));
    }

    #[test]
    fn capture_errors_are_not_silence() {
        let stt = Error::Stt("whisper error 401 Unauthorized".to_string());
        let kind = FailureKind::from(&stt);
        assert_eq!(kind, FailureKind::Capture);
        assert_ne!(kind.user_message(), FailureKind::NoSpeech.user_message());

        let mic = Error::Audio("no input device available".to_string());
        assert_eq!(FailureKind::from(&mic), FailureKind::Capture);

        let config = Error::Config("deepgram API key required".to_string());
        assert_eq!(FailureKind::from(&config), FailureKind::Configuration);
    }

    #[test]
    fn idle_outcome() {
        let outcome = TurnOutcome::idle();
        assert!(outcome.is_idle());
        assert!(!outcome.is_success());
        assert!(outcome.audio.is_none());
    }

    #[test]
    fn failure_display_includes_detail() {
        let failure = TurnFailure::new(FailureKind::ModelInvocation, "timeout");
        let text = failure.to_string();
        assert!(text.contains("couldn't reach the assistant"));
        assert!(text.contains("timeout"));
    }
}
