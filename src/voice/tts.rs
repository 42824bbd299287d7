//! Text-to-speech (TTS) processing

use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;

use super::VoiceConfig;
use crate::{Error, Result};

/// Longest text Google Translate TTS accepts per request
pub const MAX_CHUNK_CHARS: usize = 100;

/// RPC identifier of the Translate speech endpoint
const TTS_RPC_ID: &str = "jQ1olc";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/47.0.2526.106 Safari/537.36";

/// Pulls the base64 audio payload out of one batchexecute response line
static AUDIO_PAYLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"jQ1olc","\[\\"(.*)\\"\]"#).expect("valid regex")
});

/// Converts text plus voice settings into playable audio bytes
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given voice
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tts`] if synthesis fails
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Synthesizes MP3 speech through the Google Translate TTS endpoint
///
/// The regional variant of the [`VoiceConfig`] selects the Translate domain,
/// which is what gives English its accent.
pub struct GoogleTts {
    client: reqwest::Client,
}

impl GoogleTts {
    /// Create a new Google TTS instance
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn synthesize_chunk(&self, chunk: &str, voice: &VoiceConfig) -> Result<Vec<u8>> {
        let url = endpoint(&voice.region_variant);
        let body = request_body(chunk, &voice.language_code, voice.speech_rate.is_slow())?;

        let response = self
            .client
            .post(&url)
            .header("Referer", "http://translate.google.com/")
            .header("User-Agent", USER_AGENT)
            .header(
                "Content-Type",
                "application/x-www-form-urlencoded;charset=utf-8",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Tts(format!("failed to read response: {e}")))?;

        decode_audio(&text)
    }
}

impl Default for GoogleTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(Error::Tts("no text to speak".to_string()));
        }

        tracing::debug!(
            chunks = chunks.len(),
            lang = %voice.language_code,
            region = %voice.region_variant,
            slow = voice.speech_rate.is_slow(),
            "synthesizing speech"
        );

        // MP3 frames are self-delimiting, so chunk outputs concatenate cleanly
        let mut audio = Vec::new();
        for chunk in &chunks {
            audio.extend(self.synthesize_chunk(chunk, voice).await?);
        }

        tracing::debug!(audio_bytes = audio.len(), "speech synthesized");
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "google-translate"
    }
}

/// Translate endpoint for a regional variant (e.g. "co.uk")
#[must_use]
pub fn endpoint(region: &str) -> String {
    format!("https://translate.google.{region}/_/TranslateWebserverUi/data/batchexecute")
}

/// Build the form-encoded batchexecute body for one chunk
///
/// # Errors
///
/// Returns error if JSON encoding fails
pub fn request_body(chunk: &str, lang: &str, slow: bool) -> Result<String> {
    // Speed flag is `true` for slow and `null` for normal
    let speed = if slow {
        serde_json::Value::Bool(true)
    } else {
        serde_json::Value::Null
    };
    let parameter = serde_json::to_string(&serde_json::json!([chunk, lang, speed, "null"]))?;
    let rpc = serde_json::to_string(&serde_json::json!([[[
        TTS_RPC_ID,
        parameter,
        serde_json::Value::Null,
        "generic"
    ]]]))?;

    Ok(format!("f.req={}&", urlencoding::encode(&rpc)))
}

/// Extract and decode the MP3 payload from a batchexecute response
///
/// # Errors
///
/// Returns [`Error::Tts`] if no line carries audio or the payload is not base64
pub fn decode_audio(response: &str) -> Result<Vec<u8>> {
    let payload = response
        .lines()
        .filter(|line| line.contains(TTS_RPC_ID))
        .find_map(|line| AUDIO_PAYLOAD.captures(line))
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| Error::Tts("no audio stream in response".to_string()))?;

    base64::engine::general_purpose::STANDARD
        .decode(payload.as_str())
        .map_err(|e| Error::Tts(format!("invalid audio payload: {e}")))
}

/// Split text into chunks of at most `max_chars` characters
///
/// Sentences end at punctuation or newlines; anything still too long is cut
/// at the last space that fits, or hard-cut when there is none.
#[must_use]
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c == '\n' {
            sentences.push(std::mem::take(&mut current));
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?' | ';' | ':' | '…' | '¿' | '¡' | '،' | '۔') {
            sentences.push(std::mem::take(&mut current));
        }
    }
    sentences.push(current);

    sentences
        .iter()
        .map(|s| s.trim())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .flat_map(|s| minimize(s, max_chars.max(1)))
        .collect()
}

fn minimize(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = sentence.trim();

    while rest.chars().count() > max_chars {
        // Byte offset just past the first `max_chars` characters
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        let cut = rest[..limit].rfind(' ').filter(|&i| i > 0).unwrap_or(limit);

        out.push(rest[..cut].trim().to_string());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_region() {
        assert_eq!(
            endpoint("co.uk"),
            "https://translate.google.co.uk/_/TranslateWebserverUi/data/batchexecute"
        );
    }

    #[test]
    fn request_body_encodes_rpc() {
        let body = request_body("Hello there", "en", false).unwrap();
        assert!(body.starts_with("f.req="));
        assert!(body.ends_with('&'));

        let decoded = urlencoding::decode(&body["f.req=".len()..body.len() - 1]).unwrap();
        let rpc: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(rpc[0][0][0], "jQ1olc");
        assert_eq!(rpc[0][0][3], "generic");

        let param: serde_json::Value =
            serde_json::from_str(rpc[0][0][1].as_str().unwrap()).unwrap();
        assert_eq!(param[0], "Hello there");
        assert_eq!(param[1], "en");
        assert!(param[2].is_null());
        assert_eq!(param[3], "null");
    }

    #[test]
    fn slow_sets_speed_flag() {
        let body = request_body("Hi", "ur", true).unwrap();
        let decoded = urlencoding::decode(&body["f.req=".len()..body.len() - 1]).unwrap();
        let rpc: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        let param: serde_json::Value =
            serde_json::from_str(rpc[0][0][1].as_str().unwrap()).unwrap();
        assert_eq!(param[2], true);
    }

    #[test]
    fn decodes_audio_line() {
        let audio = base64::engine::general_purpose::STANDARD.encode(b"ID3fake-mp3");
        let response = format!(
            ")]}}'\n\n123\n[[\"wrb.fr\",\"jQ1olc\",\"[\\\"{audio}\\\"]\",null,null,null,\"generic\"]]\n"
        );
        assert_eq!(decode_audio(&response).unwrap(), b"ID3fake-mp3");
    }

    #[test]
    fn missing_audio_is_error() {
        let err = decode_audio(")]}'\n[[\"wrb.fr\",\"jQ1olc\",null]]").unwrap_err();
        assert!(matches!(err, Error::Tts(_)));
    }

    #[test]
    fn splits_on_sentences() {
        let chunks = split_text("Hello there. How are you?\nFine!", 100);
        assert_eq!(chunks, vec!["Hello there.", "How are you?", "Fine!"]);
    }

    #[test]
    fn long_sentence_is_cut_on_spaces() {
        let text = "word ".repeat(50);
        let chunks = split_text(&text, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "{chunk:?}");
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        assert_eq!(chunks.join(" "), text.trim());
    }

    #[test]
    fn unbroken_text_is_hard_cut() {
        let text = "x".repeat(250);
        let chunks = split_text(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn punctuation_only_yields_nothing() {
        assert!(split_text("... !? \n", 100).is_empty());
        assert!(split_text("", 100).is_empty());
    }
}
