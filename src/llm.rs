// =============================================================================
// llm.rs - THE ORACLE
// =============================================================================
//
// Gemini reads the scraped page and tells us, in what we hope is JSON, what
// the competitor is bad at. This module only knows how to ask the question
// and collect the free-text answer. Digging the JSON out of that answer is
// extraction.rs's problem.
//
// Real API: https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent
//
// Two traits:
// - LanguageModel: one model id, one `generate` call.
// - ModelProvider: hands out models by id, plus the server default. Returns
//   None when no model can be built at all (no API key), which is what
//   switches the pipeline onto the "AI unavailable" placeholders.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("response contained no candidate text")]
    EmptyResponse,

    #[error("model {0} cannot be used: {1}")]
    Unavailable(String, String),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Send `prompt` and return the model's free-text reply.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

pub trait ModelProvider: Send + Sync {
    /// The model used when the caller doesn't pick one. `None` means the AI
    /// side of the house is down for the whole process.
    fn default_model(&self) -> Option<Arc<dyn LanguageModel>>;

    /// Build a client for a specific model id. The id has already been
    /// checked against the allow-list.
    fn model(&self, id: &str) -> Result<Arc<dyn LanguageModel>, LlmError>;
}

// =============================================================================
// Gemini wire format
// =============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> Result<String, LlmError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(LlmError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

/// A single Gemini model. The HTTP client inside is shared with the provider.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
}

impl GeminiModel {
    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(&self.model_id)
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        // The key rides in the query string, so reqwest errors lose their URL.
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.without_url()))?;
        let text = parsed.into_text()?;
        debug!(model = %self.model_id, chars = text.len(), "Gemini replied");
        Ok(text)
    }
}

/// Builds [`GeminiModel`]s that share one HTTP client and one API key.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_model: Option<Arc<dyn LanguageModel>>,
}

impl GeminiProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        default_model_id: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let mut provider = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: None,
        };

        provider.default_model = match provider.build(default_model_id) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(error = %e, "No default Gemini model, analyses will return placeholders");
                None
            }
        };

        Ok(provider)
    }

    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        Self::new(
            &config.gemini_base_url,
            config.google_ai_api_key.clone(),
            &config.default_model,
            config.llm_timeout,
        )
    }

    fn build(&self, id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            LlmError::Unavailable(id.to_string(), "GOOGLE_AI_API_KEY is not set".to_string())
        })?;

        Ok(Arc::new(GeminiModel {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key,
            model_id: id.to_string(),
        }))
    }
}

impl ModelProvider for GeminiProvider {
    fn default_model(&self) -> Option<Arc<dyn LanguageModel>> {
        self.default_model.clone()
    }

    fn model(&self, id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        self.build(id)
    }
}
