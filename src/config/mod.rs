//! Configuration management for Jarvis
//!
//! Precedence is env > TOML file > default. A missing model credential is a
//! fatal configuration error: the assistant refuses to start taking turns.

pub mod file;

use std::time::Duration;

use crate::voice::{self, ListenMode, VoiceConfig};
use crate::{Error, Result};

use file::JarvisConfigFile;

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default Gemini API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Persona instruction sent with every request
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are JARVIS, a helpful and intelligent AI assistant. \
Respond to user questions in a friendly, concise manner. \
Keep responses under 150 words unless more detail is specifically requested. \
Be helpful, accurate, and engaging.";

/// Number of messages shown in the conversation history
pub const HISTORY_DISPLAY_LEN: usize = 6;

/// Allowed silence threshold range in seconds
pub const SILENCE_THRESHOLD_RANGE: std::ops::RangeInclusive<f64> = 1.0..=5.0;

/// Default silence threshold in seconds
pub const DEFAULT_SILENCE_THRESHOLD: f64 = 2.0;

/// Jarvis configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Conversational model
    pub model: ModelConfig,

    /// Speech-to-text backend
    pub stt: SttConfig,

    /// Spoken reply settings
    pub voice: VoiceSettings,

    /// Recording settings
    pub capture: CaptureConfig,
}

/// Conversational model configuration
#[derive(Clone)]
pub struct ModelConfig {
    /// Google API key (`GOOGLE_API_KEY`)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// API base URL
    pub base_url: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Reply length cap in tokens
    pub max_output_tokens: u32,

    /// Persona instruction
    pub system_instruction: String,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

/// Speech-to-text configuration
#[derive(Clone)]
pub struct SttConfig {
    /// `OpenAI` API key (Whisper)
    pub openai_api_key: Option<String>,

    /// `Deepgram` API key
    pub deepgram_api_key: Option<String>,

    /// Whisper model
    pub model: String,

    /// Deepgram model
    pub deepgram_model: String,

    /// Language hint (e.g. "en")
    pub language: String,
}

impl std::fmt::Debug for SttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SttConfig")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field(
                "deepgram_api_key",
                &self.deepgram_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("model", &self.model)
            .field("deepgram_model", &self.deepgram_model)
            .field("language", &self.language)
            .finish()
    }
}

/// User-selectable voice settings
///
/// Re-resolved into a [`VoiceConfig`] at the start of every turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSettings {
    /// Accent preset name
    pub accent: String,

    /// Slow speech toggle
    pub slow: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            accent: voice::DEFAULT_PRESET.to_string(),
            slow: false,
        }
    }
}

impl VoiceSettings {
    /// Resolve to concrete voice settings for one turn
    #[must_use]
    pub fn voice_config(&self) -> VoiceConfig {
        voice::resolve(&self.accent, self.slow)
    }
}

/// Recording configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    /// Stop on a timer rather than waiting for the user
    pub auto_stop: bool,

    /// Silence threshold; the auto-stop timer is a multiple of it
    pub silence_threshold: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            auto_stop: true,
            silence_threshold: Duration::from_secs_f64(DEFAULT_SILENCE_THRESHOLD),
        }
    }
}

impl CaptureConfig {
    /// How recordings end under this configuration
    #[must_use]
    pub fn listen_mode(&self) -> ListenMode {
        if self.auto_stop {
            ListenMode::auto_stop(self.silence_threshold)
        } else {
            ListenMode::Manual
        }
    }
}

/// Validate a silence threshold given in seconds
///
/// # Errors
///
/// Returns [`Error::Config`] if outside [`SILENCE_THRESHOLD_RANGE`]
pub fn silence_threshold(secs: f64) -> Result<Duration> {
    if SILENCE_THRESHOLD_RANGE.contains(&secs) {
        Ok(Duration::from_secs_f64(secs))
    } else {
        Err(Error::Config(format!(
            "silence threshold must be between {} and {} seconds, got {secs}",
            SILENCE_THRESHOLD_RANGE.start(),
            SILENCE_THRESHOLD_RANGE.end()
        )))
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `GOOGLE_API_KEY` is missing or a value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the model key is missing or a value is invalid
    pub fn from_sources<F>(fc: JarvisConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_nonempty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_key = env_nonempty("GOOGLE_API_KEY")
            .or(fc.api_keys.google)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "GOOGLE_API_KEY is not set (env or [api_keys] google in config file)"
                        .to_string(),
                )
            })?;

        let temperature = env_nonempty("JARVIS_TEMPERATURE")
            .map(|v| parse_value::<f32>("JARVIS_TEMPERATURE", &v))
            .transpose()?
            .or(fc.model.temperature)
            .unwrap_or(0.3);

        let max_output_tokens = env_nonempty("JARVIS_MAX_OUTPUT_TOKENS")
            .map(|v| parse_value::<u32>("JARVIS_MAX_OUTPUT_TOKENS", &v))
            .transpose()?
            .or(fc.model.max_output_tokens)
            .unwrap_or(200);

        let model = ModelConfig {
            api_key,
            model: env_nonempty("JARVIS_MODEL")
                .or(fc.model.name)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env_nonempty("JARVIS_MODEL_BASE_URL")
                .or(fc.model.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            temperature,
            max_output_tokens,
            system_instruction: fc
                .model
                .system_instruction
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
        };

        let stt = SttConfig {
            openai_api_key: env_nonempty("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram_api_key: env_nonempty("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            model: env_nonempty("JARVIS_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            deepgram_model: fc
                .stt
                .deepgram_model
                .unwrap_or_else(|| "nova-2".to_string()),
            language: env_nonempty("JARVIS_LANGUAGE")
                .or(fc.capture.language)
                .unwrap_or_else(|| "en".to_string()),
        };

        let accent = env_nonempty("JARVIS_ACCENT")
            .or(fc.voice.accent)
            .unwrap_or_else(|| voice::DEFAULT_PRESET.to_string());
        if voice::canonical_name(&accent).is_none() {
            tracing::warn!(
                accent,
                fallback = voice::DEFAULT_PRESET,
                "unknown accent preset, using default"
            );
        }
        let voice = VoiceSettings {
            accent,
            slow: env_nonempty("JARVIS_SLOW_SPEECH")
                .map(|v| parse_flag(&v))
                .or(fc.voice.slow)
                .unwrap_or(false),
        };

        let threshold_secs = env_nonempty("JARVIS_SILENCE_THRESHOLD")
            .map(|v| parse_value::<f64>("JARVIS_SILENCE_THRESHOLD", &v))
            .transpose()?
            .or(fc.capture.silence_threshold)
            .unwrap_or(DEFAULT_SILENCE_THRESHOLD);
        let capture = CaptureConfig {
            auto_stop: env_nonempty("JARVIS_AUTO_STOP")
                .map(|v| parse_flag(&v))
                .or(fc.capture.auto_stop)
                .unwrap_or(true),
            silence_threshold: silence_threshold(threshold_secs)?,
        };

        Ok(Self {
            model,
            stt,
            voice,
            capture,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {key}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::voice::SpeechRate;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_google_key_is_fatal() {
        let err = Config::from_sources(JarvisConfigFile::default(), env_from(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_sources(
            JarvisConfigFile::default(),
            env_from(&[("GOOGLE_API_KEY", "   ")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults() {
        let config = Config::from_sources(
            JarvisConfigFile::default(),
            env_from(&[("GOOGLE_API_KEY", "g-key")]),
        )
        .unwrap();

        assert_eq!(config.model.model, DEFAULT_MODEL);
        assert!((config.model.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.model.max_output_tokens, 200);
        assert_eq!(config.voice.accent, "UK English");
        assert!(!config.voice.slow);
        assert!(config.capture.auto_stop);
        assert_eq!(config.capture.silence_threshold, Duration::from_secs(2));
        assert_eq!(
            config.capture.listen_mode().max_listen(),
            Duration::from_secs(6)
        );
        assert_eq!(config.stt.language, "en");
        assert!(config.stt.openai_api_key.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = JarvisConfigFile::default();
        fc.api_keys.google = Some("file-key".to_string());
        fc.model.name = Some("file-model".to_string());
        fc.voice.accent = Some("Urdu".to_string());
        fc.capture.auto_stop = Some(true);

        let config = Config::from_sources(
            fc,
            env_from(&[
                ("GOOGLE_API_KEY", "env-key"),
                ("JARVIS_ACCENT", "US English"),
                ("JARVIS_SLOW_SPEECH", "true"),
                ("JARVIS_AUTO_STOP", "0"),
            ]),
        )
        .unwrap();

        assert_eq!(config.model.api_key, "env-key");
        assert_eq!(config.model.model, "file-model");
        assert_eq!(config.voice.accent, "US English");
        assert_eq!(config.voice.voice_config().speech_rate, SpeechRate::Slow);
        assert_eq!(config.capture.listen_mode(), ListenMode::Manual);
    }

    #[test]
    fn file_key_is_accepted() {
        let mut fc = JarvisConfigFile::default();
        fc.api_keys.google = Some("file-key".to_string());
        let config = Config::from_sources(fc, env_from(&[])).unwrap();
        assert_eq!(config.model.api_key, "file-key");
    }

    #[test]
    fn threshold_out_of_range() {
        assert!(silence_threshold(0.5).is_err());
        assert!(silence_threshold(5.5).is_err());
        assert_eq!(silence_threshold(1.0).unwrap(), Duration::from_secs(1));

        let err = Config::from_sources(
            JarvisConfigFile::default(),
            env_from(&[("GOOGLE_API_KEY", "k"), ("JARVIS_SILENCE_THRESHOLD", "9")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bad_number_is_config_error() {
        let err = Config::from_sources(
            JarvisConfigFile::default(),
            env_from(&[("GOOGLE_API_KEY", "k"), ("JARVIS_MAX_OUTPUT_TOKENS", "lots")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("JARVIS_MAX_OUTPUT_TOKENS"));
    }

    #[test]
    fn debug_redacts_keys() {
        let config = Config::from_sources(
            JarvisConfigFile::default(),
            env_from(&[("GOOGLE_API_KEY", "secret-g"), ("OPENAI_API_KEY", "secret-o")]),
        )
        .unwrap();
        let dump = format!("{config:?}");
        assert!(!dump.contains("secret-g"));
        assert!(!dump.contains("secret-o"));
    }
}
