//! Gemini `generateContent` chat sessions

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{ModelClient, ModelSession};
use crate::config::ModelConfig;
use crate::error::ModelErrorKind;
use crate::{Error, Result};

/// Settings shared by every chat created from one client
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub system_instruction: String,
}

impl From<&ModelConfig> for GeminiSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            system_instruction: config.system_instruction.clone(),
        }
    }
}

struct Inner {
    http: reqwest::Client,
    settings: GeminiSettings,
}

/// Factory for Gemini chat sessions
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<Inner>,
}

impl GeminiClient {
    /// Create a client from model configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API key is empty
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Self::with_settings(GeminiSettings::from(config))
    }

    /// Create a client from explicit settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API key is empty
    pub fn with_settings(settings: GeminiSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(Error::Config("GOOGLE_API_KEY is required".to_string()));
        }

        tracing::debug!(model = %settings.model, "gemini client initialized");

        Ok(Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                settings,
            }),
        })
    }

    /// Start a chat with no prior context
    #[must_use]
    pub fn chat(&self) -> GeminiChat {
        GeminiChat {
            inner: Arc::clone(&self.inner),
            contents: Vec::new(),
        }
    }
}

impl ModelClient for GeminiClient {
    fn start_session(&self) -> Box<dyn ModelSession> {
        Box::new(self.chat())
    }

    fn model_name(&self) -> &str {
        &self.inner.settings.model
    }
}

/// A Gemini conversation
///
/// The dialogue context is the list of committed turns. A user turn is only
/// committed together with the model reply it produced, so a failed call
/// leaves the context exactly as it was.
pub struct GeminiChat {
    inner: Arc<Inner>,
    contents: Vec<Content>,
}

impl GeminiChat {
    /// Number of committed user/model turns
    fn turns(&self) -> usize {
        self.contents.len() / 2
    }

    fn endpoint(&self) -> String {
        let settings = &self.inner.settings;
        format!(
            "{}/v1beta/models/{}:generateContent",
            settings.base_url.trim_end_matches('/'),
            settings.model
        )
    }
}

#[async_trait]
impl ModelSession for GeminiChat {
    async fn send(&mut self, text: &str) -> Result<String> {
        let settings = &self.inner.settings;
        let user = Content::user(text);

        let mut contents = self.contents.clone();
        contents.push(user.clone());
        let request = build_request(settings, &contents);

        tracing::debug!(
            model = %settings.model,
            context_turns = self.turns(),
            "sending turn to gemini"
        );

        let response = self
            .inner
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::model(ModelErrorKind::Network, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = classify_failure(status, &body);
            tracing::warn!(status = %status, %kind, "gemini request failed");
            return Err(Error::model(kind, format!("gemini error {status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::model(ModelErrorKind::Unspecified, e.to_string()))?;
        let reply = reply_text(&parsed)?;

        self.contents.push(user);
        self.contents.push(Content::model(&reply));

        tracing::debug!(reply_len = reply.len(), "gemini replied");
        Ok(reply)
    }
}

/// One turn of dialogue in the Gemini wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn build_request<'a>(settings: &GeminiSettings, contents: &'a [Content]) -> GenerateRequest<'a> {
    let system_instruction = (!settings.system_instruction.trim().is_empty()).then(|| {
        SystemInstruction {
            parts: vec![Part::text(&settings.system_instruction)],
        }
    });

    GenerateRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        },
    }
}

/// Concatenated text of the first candidate
fn reply_text(response: &GenerateResponse) -> Result<String> {
    let candidate = response.candidates.first();
    let text: String = candidate
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    let reason = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone())
        .or_else(|| candidate.and_then(|c| c.finish_reason.clone()))
        .unwrap_or_else(|| "no candidates".to_string());

    Err(Error::model(
        ModelErrorKind::EmptyReply,
        format!("model returned no text ({reason})"),
    ))
}

/// Map an HTTP failure to an error kind
fn classify_failure(status: StatusCode, body: &str) -> ModelErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelErrorKind::Auth,
        StatusCode::TOO_MANY_REQUESTS => ModelErrorKind::RateLimit,
        // An invalid key is reported as a 400
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => ModelErrorKind::Auth,
        _ => ModelErrorKind::Unspecified,
    }
}
