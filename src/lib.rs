//! Jarvis - voice-driven chat assistant
//!
//! This library provides the core of the assistant:
//! - Turn pipeline (transcript → model → history → speech)
//! - Per-session conversation state
//! - Voice presets, text cleanup, capture, STT and TTS adapters
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Terminal front end                  │
//! │   Record  │  Type  │  /clear  │  /accent  │  /slow   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ transcript
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Turn pipeline                       │
//! │   SessionState  │  ModelSession  │  Cleanup  │  TTS  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                External services                     │
//! │   Gemini  │  Google Translate TTS  │  Whisper/Deepgram│
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod voice;

pub use app::{Assistant, Settings};
pub use config::Config;
pub use error::{Error, ModelErrorKind, Result};
pub use model::{GeminiClient, ModelClient, ModelSession};
pub use pipeline::{FailureKind, TurnFailure, TurnOutcome, TurnPipeline};
pub use session::{Message, ModelSessionHandle, Role, SessionState};
pub use voice::{SpeechRate, SpeechSynthesizer, VoiceConfig};
