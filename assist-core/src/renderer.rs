//! Reply renderer: turns an internal directive into customer-facing text.
//!
//! Provides a `ReplyRenderer` trait with implementations for:
//! - **Gemini**: `generateContent` on the Gemini API
//! - **Echo**: returns the directive unchanged (no model configured)
//!
//! The Gemini renderer also falls back to the directive when the model
//! answers with empty text.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::RendererConfig;

// ============================================================================
// ReplyRenderer trait
// ============================================================================

#[async_trait]
pub trait ReplyRenderer: Send + Sync {
    /// Produce a reply for `user_message` following `directive`.
    async fn render(&self, directive: &str, user_message: &str) -> Result<String, RenderError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("All {attempts} retry attempts failed: {last}")]
    RetryExhausted { attempts: usize, last: String },

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// Config types
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiRendererConfig {
    pub api_key: String,
    pub model: String,
    pub assistant_name: String,
    pub region: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl GeminiRendererConfig {
    /// Build from the `[renderer]` section, reading the key from
    /// `GEMINI_API_KEY` then `GOOGLE_API_KEY`.
    pub fn from_config(config: &RendererConfig) -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .unwrap_or_default();

        Self {
            api_key,
            model: config.model.clone(),
            assistant_name: config.assistant_name.clone(),
            region: config.region.clone(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

/// Pick the renderer for this configuration.
///
/// A `gemini` backend without an API key degrades to `EchoRenderer`, which is
/// the documented fallback rather than a startup failure.
pub fn create_renderer(config: &RendererConfig) -> Result<Box<dyn ReplyRenderer>, RenderError> {
    match config.backend.as_str() {
        "echo" => Ok(Box::new(EchoRenderer)),
        _ => {
            let gemini = GeminiRendererConfig::from_config(config);
            if gemini.api_key.is_empty() {
                tracing::warn!("No Gemini API key configured: replies will echo directives");
                return Ok(Box::new(EchoRenderer));
            }
            Ok(Box::new(GeminiRenderer::new(gemini)?))
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiRenderer
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiRenderer {
    client: Client,
    config: GeminiRendererConfig,
    base_url: String,
}

impl GeminiRenderer {
    pub fn new(config: GeminiRendererConfig) -> Result<Self, RenderError> {
        Self::with_base_url(
            config,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a renderer with a custom base URL (for testing / integration)
    pub fn with_base_url(config: GeminiRendererConfig, base_url: String) -> Result<Self, RenderError> {
        if config.api_key.is_empty() {
            return Err(RenderError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn prompt(&self, directive: &str, user_message: &str) -> String {
        format!(
            "{}\n\nUser: {}\nAssistant ({}, {}):",
            directive, user_message, self.config.assistant_name, self.config.region
        )
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, RenderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        let request = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(RenderError::Api { code, message });
        }

        let generated: GenerateResponse = response.json().await?;

        let text = generated
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }
}

#[async_trait]
impl ReplyRenderer for GeminiRenderer {
    async fn render(&self, directive: &str, user_message: &str) -> Result<String, RenderError> {
        let prompt = self.prompt(directive, user_message);

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let text = match Retry::spawn(retry_strategy, || self.generate_once(&prompt)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries + 1,
                    error = %e,
                    "All reply generation attempts failed"
                );
                return Err(RenderError::RetryExhausted {
                    attempts: self.config.max_retries + 1,
                    last: e.to_string(),
                });
            }
        };

        if text.trim().is_empty() {
            tracing::warn!("Gemini returned empty reply: falling back to directive");
            return Ok(directive.to_string());
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// EchoRenderer
// ============================================================================

/// Returns the directive as the reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoRenderer;

#[async_trait]
impl ReplyRenderer for EchoRenderer {
    async fn render(&self, directive: &str, _user_message: &str) -> Result<String, RenderError> {
        Ok(directive.to_string())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

// ============================================================================
// TESTS
// ============================================================================
