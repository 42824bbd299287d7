//! Voice processing module
//!
//! Speech capture (microphone + STT), reply cleanup, accent presets,
//! speech synthesis and playback.

mod capture;
mod cleanup;
mod listener;
mod playback;
mod preset;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, rms, samples_duration, samples_to_wav};
pub use cleanup::{clean_text_for_speech, normalize_whitespace};
pub use listener::{
    AUTO_STOP_FACTOR, ListenMode, MANUAL_LISTEN_CAP, MIN_SPEECH, MicrophoneListener,
    SpeechCapture, non_blank,
};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, Speaker, decode_mp3};
pub use preset::{
    DEFAULT_PRESET, SpeechRate, VoiceConfig, canonical_name, preset_names, resolve,
};
pub use stt::SpeechToText;
pub use tts::{GoogleTts, MAX_CHUNK_CHARS, SpeechSynthesizer, decode_audio, split_text};
