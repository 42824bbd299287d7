//! TOML configuration file loading
//!
//! Supports `~/.config/jarvis/config.toml` (or `$JARVIS_CONFIG`) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct JarvisConfigFile {
    /// Conversational model configuration
    #[serde(default)]
    pub model: ModelFileConfig,

    /// Spoken reply configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Recording configuration
    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Model-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelFileConfig {
    /// Model identifier (e.g. "gemini-2.0-flash")
    pub name: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Persona instruction sent with every request
    pub system_instruction: Option<String>,
    /// API base URL override
    pub base_url: Option<String>,
}

/// Spoken reply configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Accent preset name (e.g. "UK English")
    pub accent: Option<String>,
    /// Slow speech toggle
    pub slow: Option<bool>,
}

/// Recording configuration
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    /// Stop recording on a timer instead of waiting for the user
    pub auto_stop: Option<bool>,
    /// Silence threshold in seconds (1.0 to 5.0)
    pub silence_threshold: Option<f64>,
    /// Language hint for transcription
    pub language: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Whisper model (e.g. "whisper-1")
    pub model: Option<String>,
    /// Deepgram model (e.g. "nova-2")
    pub deepgram_model: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub google: Option<String>,
    pub openai: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `JarvisConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> JarvisConfigFile {
    config_file_path().map_or_else(JarvisConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Returns `JarvisConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_from(path: &Path) -> JarvisConfigFile {
    if !path.exists() {
        return JarvisConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                JarvisConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            JarvisConfigFile::default()
        }
    }
}

/// Return the config file path: `$JARVIS_CONFIG` or `~/.config/jarvis/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("JARVIS_CONFIG") {
        return Some(PathBuf::from(path));
    }
    directories::BaseDirs::new().map(|d| d.config_dir().join("jarvis").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[model]
name = "gemini-1.5-pro"

[voice]
accent = "Urdu"
slow = true

[capture]
silence_threshold = 3.5
"#
        )
        .unwrap();

        let config = load_from(file.path());
        assert_eq!(config.model.name.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(config.model.temperature, None);
        assert_eq!(config.voice.accent.as_deref(), Some("Urdu"));
        assert_eq!(config.voice.slow, Some(true));
        assert_eq!(config.capture.silence_threshold, Some(3.5));
        assert!(config.api_keys.google.is_none());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml"));
        assert!(config.model.name.is_none());
    }

    #[test]
    fn malformed_file_is_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[voice\naccent = ").unwrap();
        let config = load_from(file.path());
        assert!(config.voice.accent.is_none());
    }
}
