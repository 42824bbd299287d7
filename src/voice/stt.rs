//! Speech-to-text (STT) backends for recorded utterances

use crate::config::SttConfig;
use crate::{Error, Result};

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_URL: &str = "https://api.deepgram.com/v1/listen";

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

impl SttProvider {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Whisper => "whisper",
            Self::Deepgram => "deepgram",
        }
    }
}

/// Transcribes recorded speech to text
///
/// Used by the microphone listener; the language hint is passed to the
/// backend so short utterances are not misdetected.
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    language: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Whisper (`OpenAI`) backend
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API key is empty
    pub fn new_whisper(api_key: String, model: String, language: String) -> Result<Self> {
        Self::build(SttProvider::Whisper, api_key, model, language)
    }

    /// Deepgram backend
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API key is empty
    pub fn new_deepgram(api_key: String, model: String, language: String) -> Result<Self> {
        Self::build(SttProvider::Deepgram, api_key, model, language)
    }

    fn build(
        provider: SttProvider,
        api_key: String,
        model: String,
        language: String,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "{} API key required",
                provider.as_str()
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            provider,
        })
    }

    /// Create an STT instance from the configured provider
    ///
    /// Prefers Deepgram when a Deepgram key is configured, Whisper otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no STT key is configured
    pub fn from_config(config: &SttConfig) -> Result<Self> {
        match (&config.deepgram_api_key, &config.openai_api_key) {
            (Some(key), _) => Self::new_deepgram(
                key.clone(),
                config.deepgram_model.clone(),
                config.language.clone(),
            ),
            (None, Some(key)) => {
                Self::new_whisper(key.clone(), config.model.clone(), config.language.clone())
            }
            (None, None) => Err(Error::Config(
                "voice input needs OPENAI_API_KEY or DEEPGRAM_API_KEY".to_string(),
            )),
        }
    }

    /// Language hint sent to the backend
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Transcribe one WAV utterance
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stt`] if the backend is unreachable or rejects the audio
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await?,
        };
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        let file = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let request = self
            .client
            .post(WHISPER_URL)
            .bearer_auth(&self.api_key)
            .multipart(form);

        let result: WhisperResponse = self.call(request, audio.len()).await?;
        Ok(result.text)
    }

    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        let url = format!(
            "{DEEPGRAM_URL}?model={}&language={}&punctuate=true&smart_format=true",
            urlencoding::encode(&self.model),
            urlencoding::encode(&self.language)
        );

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec());

        let result: DeepgramResponse = self.call(request, audio.len()).await?;
        Ok(result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default())
    }

    /// Send a transcription request and decode the JSON reply
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        audio_bytes: usize,
    ) -> Result<T> {
        let provider = self.provider.as_str();
        tracing::debug!(provider, audio_bytes, language = %self.language, "transcribing");

        let response = request
            .send()
            .await
            .map_err(|e| Error::Stt(format!("{provider} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider, %status, "transcription rejected");
            return Err(Error::Stt(format!("{provider} error {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("unreadable {provider} response: {e}")))
    }
}
