//! Error types for Jarvis

use thiserror::Error;

/// Result type alias for Jarvis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of a model invocation failure
///
/// The turn pipeline only cares that the call failed; the kind is kept for
/// logging and for the message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// Transport failure (DNS, connect, timeout, TLS)
    Network,
    /// Credentials rejected
    Auth,
    /// Quota or rate limit hit
    RateLimit,
    /// Call succeeded but carried no usable text
    EmptyReply,
    /// Anything else the remote side reported
    Unspecified,
}

impl ModelErrorKind {
    /// Short label used in logs and error messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::RateLimit => "rate limit",
            Self::EmptyReply => "empty reply",
            Self::Unspecified => "unspecified",
        }
    }
}

impl std::fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in Jarvis
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credential, invalid setting)
    #[error("configuration error: {0}")]
    Config(String),

    /// Conversational model call failed
    #[error("model error ({kind}): {message}")]
    Model {
        kind: ModelErrorKind,
        message: String,
    },

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a model error of the given kind
    #[must_use]
    pub fn model(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self::Model {
            kind,
            message: message.into(),
        }
    }
}
