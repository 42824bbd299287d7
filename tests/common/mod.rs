//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use jarvis_assistant::{
    Error, ModelClient, ModelErrorKind, ModelSession, Result, SessionState, SpeechSynthesizer,
    VoiceConfig,
};

/// One scripted model response
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fail(ModelErrorKind),
}

/// Model client that answers from a script and records what it was sent
#[derive(Clone, Default)]
pub struct ScriptedClient {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    sent: Arc<Mutex<Vec<String>>>,
    sessions: Arc<AtomicUsize>,
}

impl ScriptedClient {
    /// Client whose sessions answer with `replies` in order
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Client whose first call answers with `text`
    pub fn replying(text: &str) -> Self {
        Self::new([Reply::Text(text.to_string())])
    }

    /// Client whose first call fails with `kind`
    pub fn failing(kind: ModelErrorKind) -> Self {
        Self::new([Reply::Fail(kind)])
    }

    /// Every text sent to any session, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of sessions started
    pub fn sessions_started(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Fresh state backed by this client
    pub fn state(&self) -> SessionState {
        SessionState::new(Arc::new(self.clone()))
    }
}

struct ScriptedSession {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ModelSession for ScriptedSession {
    async fn send(&mut self, text: &str) -> Result<String> {
        self.sent.lock().unwrap().push(text.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(reply)) => Ok(reply),
            Some(Reply::Fail(kind)) => Err(Error::model(kind, "scripted failure")),
            None => Err(Error::model(ModelErrorKind::Unspecified, "script exhausted")),
        }
    }
}

impl ModelClient for ScriptedClient {
    fn start_session(&self) -> Box<dyn ModelSession> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedSession {
            replies: Arc::clone(&self.replies),
            sent: Arc::clone(&self.sent),
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// What a [`FakeTts`] returns
#[derive(Clone, Copy, Default)]
enum TtsOutput {
    #[default]
    Audio,
    Silence,
    Failure,
}

/// Synthesizer that returns fixed bytes (or nothing, or fails) and records its input
#[derive(Clone, Default)]
pub struct FakeTts {
    output: TtsOutput,
    spoken: Arc<Mutex<Vec<(String, VoiceConfig)>>>,
}

/// Audio returned by a working [`FakeTts`]
pub const FAKE_AUDIO: &[u8] = b"ID3\x04fake-mp3";

impl FakeTts {
    pub fn working() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            output: TtsOutput::Failure,
            ..Self::default()
        }
    }

    /// Synthesizer that succeeds with no audio
    pub fn silent() -> Self {
        Self {
            output: TtsOutput::Silence,
            ..Self::default()
        }
    }

    /// Texts and voices passed to `synthesize`, in order
    pub fn spoken(&self) -> Vec<(String, VoiceConfig)> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), voice.clone()));
        match self.output {
            TtsOutput::Audio => Ok(FAKE_AUDIO.to_vec()),
            TtsOutput::Silence => Ok(Vec::new()),
            TtsOutput::Failure => Err(Error::Tts("synthesis unavailable".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
