//! Per-session conversation state
//!
//! Holds the displayed message history and the live model session. The
//! state is an explicit value owned by whoever drives the conversation; it
//! is never reached through globals.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::model::{ModelClient, ModelSession};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A live model session with a stable identity
pub struct ModelSessionHandle {
    id: Uuid,
    session: Box<dyn ModelSession>,
}

impl ModelSessionHandle {
    fn new(session: Box<dyn ModelSession>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session,
        }
    }

    /// Identity of this handle; a new handle always has a new id
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Send a user turn through the underlying session
    ///
    /// # Errors
    ///
    /// Propagates the session's model error
    pub async fn send(&mut self, text: &str) -> crate::Result<String> {
        self.session.send(text).await
    }
}

impl std::fmt::Debug for ModelSessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSessionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Conversation state for one user session
///
/// Not synchronized: at most one turn runs against a state at a time, which
/// `&mut self` on every mutating operation enforces.
pub struct SessionState {
    messages: Vec<Message>,
    model_session: Option<ModelSessionHandle>,
    client: Arc<dyn ModelClient>,
}

impl SessionState {
    /// Create empty state whose model sessions come from `client`
    #[must_use]
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            messages: Vec::new(),
            model_session: None,
            client,
        }
    }

    /// The model session, created on first use
    pub fn get_or_create_model_session(&mut self) -> &mut ModelSessionHandle {
        let client = &self.client;
        self.model_session.get_or_insert_with(|| {
            let handle = ModelSessionHandle::new(client.start_session());
            tracing::debug!(
                session_id = %handle.id(),
                model = client.model_name(),
                "model session created"
            );
            handle
        })
    }

    /// Whether a model session currently exists
    #[must_use]
    pub const fn has_model_session(&self) -> bool {
        self.model_session.is_some()
    }

    /// Append a message to the history
    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Empty the history and discard the model session
    ///
    /// The next [`get_or_create_model_session`](Self::get_or_create_model_session)
    /// starts a session with no prior context.
    pub fn clear_history(&mut self) {
        let dropped = self.model_session.take().map(|h| h.id());
        tracing::info!(
            messages = self.messages.len(),
            session_id = ?dropped,
            "conversation cleared"
        );
        self.messages.clear();
    }

    /// The last `n` messages in conversation order
    #[must_use]
    pub fn recent_history(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// The full history in conversation order
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("messages", &self.messages)
            .field("model_session", &self.model_session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Echo;

    #[async_trait]
    impl ModelSession for Echo {
        async fn send(&mut self, text: &str) -> crate::Result<String> {
            Ok(text.to_string())
        }
    }

    struct EchoClient;

    impl ModelClient for EchoClient {
        fn start_session(&self) -> Box<dyn ModelSession> {
            Box::new(Echo)
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn state() -> SessionState {
        SessionState::new(Arc::new(EchoClient))
    }

    #[test]
    fn model_session_is_lazy_and_stable() {
        let mut state = state();
        assert!(!state.has_model_session());

        let first = state.get_or_create_model_session().id();
        let second = state.get_or_create_model_session().id();
        assert_eq!(first, second);
        assert!(state.has_model_session());
    }

    #[test]
    fn recent_history_keeps_order() {
        let mut state = state();
        for i in 0..10 {
            state.append_message(Message::user(format!("q{i}")));
            state.append_message(Message::assistant(format!("a{i}")));
        }

        let recent: Vec<_> = state.recent_history(3).iter().map(Message::content).collect();
        assert_eq!(recent, ["a8", "q9", "a9"]);
        assert!(state.recent_history(0).is_empty());
        assert_eq!(state.recent_history(100).len(), 20);
    }

    #[test]
    fn clear_resets_history_and_session() {
        let mut state = state();
        state.append_message(Message::user("hello"));
        let before = state.get_or_create_model_session().id();

        state.clear_history();
        assert!(state.is_empty());
        assert!(!state.has_model_session());
        for n in [0, 1, 6, 100] {
            assert!(state.recent_history(n).is_empty());
        }

        let after = state.get_or_create_model_session().id();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn handle_forwards_to_session() {
        let mut state = state();
        let reply = state.get_or_create_model_session().send("ping").await.unwrap();
        assert_eq!(reply, "ping");
    }

    #[test]
    fn message_serializes_role_lowercase() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
    }
}
