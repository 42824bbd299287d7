//! Conversational model sessions
//!
//! A session is an opaque, stateful handle to a remote model that keeps the
//! dialogue context between calls. Nothing outside the session inspects or
//! rebuilds that context.

mod gemini;

pub use gemini::{Content, GeminiChat, GeminiClient, GeminiSettings, Part};

use async_trait::async_trait;

use crate::Result;

/// One live conversation with a remote model
#[async_trait]
pub trait ModelSession: Send {
    /// Send a user turn and return the assistant reply
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Model`] if the remote call fails or the reply
    /// has no usable text
    async fn send(&mut self, text: &str) -> Result<String>;
}

/// Creates fresh model sessions
pub trait ModelClient: Send + Sync {
    /// Start a session with empty context
    fn start_session(&self) -> Box<dyn ModelSession>;

    /// Model identifier for logging
    fn model_name(&self) -> &str;
}
