//! Embedding generation through remote providers
//!
//! `HttpEmbedder` talks to Gemini or to any OpenAI-compatible `/embeddings`
//! endpoint. The provider is chosen by the `EmbeddingConfig` passed with each
//! call, so callers decide which configuration snapshot applies.

use crate::config::{require_gemini_key, ConfigError, EmbeddingConfig};
use crate::provider::{gemini_model_path, http_client, join_url, parse_api_error, GEMINI_BASE_URL};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Connection failed to {endpoint}. Check URL and network. ({message})")]
    Connection { endpoint: String, message: String },
    #[error("Embedding error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Turns text into a vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, config: &EmbeddingConfig) -> Result<Vec<f32>, EmbedderError>;
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GeminiEmbedRequest<'a> {
    model: String,
    content: GeminiContent<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

/// `embedContent` returns `embedding`, the batch endpoint `embeddings`
#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: Option<GeminiValues>,
    #[serde(default)]
    embeddings: Vec<GeminiValues>,
}

#[derive(Debug, Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

/// HTTP embedding adapter
pub struct HttpEmbedder {
    client: reqwest::Client,
    gemini_base_url: String,
}

impl HttpEmbedder {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            gemini_base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point Gemini requests at a different host (proxies, tests)
    pub fn with_gemini_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.gemini_base_url = base_url.into();
        self
    }

    async fn embed_openai(
        &self,
        text: &str,
        base_url: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Vec<f32>, EmbedderError> {
        if base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl("embedding").into());
        }
        let url = join_url(base_url, "embeddings");

        let mut request = self
            .client
            .post(&url)
            .json(&OpenAiEmbeddingRequest { input: text, model });
        if !api_key.trim().is_empty() {
            request = request.bearer_auth(api_key.trim());
        }

        let response = request.send().await.map_err(|e| EmbedderError::Connection {
            endpoint: base_url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedderError::Api {
                status: status.as_u16(),
                message: parse_api_error(status.as_u16(), &body, "Embedding Error"),
            });
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;
        first_openai_embedding(parsed)
    }

    async fn embed_gemini(
        &self,
        text: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Vec<f32>, EmbedderError> {
        let key = require_gemini_key(api_key)?;
        let model_path = gemini_model_path(model);
        let url = join_url(&self.gemini_base_url, &format!("{}:embedContent", model_path));

        let body = GeminiEmbedRequest {
            model: model_path,
            content: GeminiContent {
                parts: vec![GeminiPart { text }],
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedderError::Connection {
                endpoint: self.gemini_base_url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedderError::Api {
                status: status.as_u16(),
                message: parse_api_error(status.as_u16(), &body, "Gemini Embedding Error"),
            });
        }

        let parsed: GeminiEmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;
        first_gemini_embedding(parsed)
    }
}

impl Default for HttpEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str, config: &EmbeddingConfig) -> Result<Vec<f32>, EmbedderError> {
        match config {
            EmbeddingConfig::Gemini { api_key, model } => {
                self.embed_gemini(text, api_key, model).await
            }
            EmbeddingConfig::OpenAiCompatible {
                base_url,
                api_key,
                model,
            } => self.embed_openai(text, base_url, api_key, model).await,
        }
    }
}

fn first_openai_embedding(response: OpenAiEmbeddingResponse) -> Result<Vec<f32>, EmbedderError> {
    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| EmbedderError::InvalidResponse("No embedding returned".to_string()))
}

fn first_gemini_embedding(response: GeminiEmbedResponse) -> Result<Vec<f32>, EmbedderError> {
    response
        .embedding
        .or_else(|| response.embeddings.into_iter().next())
        .map(|v| v.values)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EmbedderError::InvalidResponse("No embedding returned".to_string()))
}
