//! Provider and retrieval configuration
//!
//! A single `SharedConfig` holder is injected into every component that talks to a
//! model. Long-running operations take a `snapshot()` once and thread it through,
//! so a settings change mid-ingestion never leaks into half of the corpus.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Environment variable consulted when no Gemini key is configured
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:1234/v1";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{provider} API key is missing. Enter it in settings or set {env_var}.")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("Base URL is not configured for the {0} endpoint")]
    MissingBaseUrl(&'static str),
}

/// Embedding backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    Gemini {
        api_key: String,
        model: String,
    },
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible {
        base_url: String,
        api_key: String,
        model: String,
    },
}

impl EmbeddingConfig {
    /// Short provider id used in store signatures
    pub fn provider_id(&self) -> &'static str {
        match self {
            EmbeddingConfig::Gemini { .. } => "gemini",
            EmbeddingConfig::OpenAiCompatible { .. } => "openai",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            EmbeddingConfig::Gemini { model, .. } => model,
            EmbeddingConfig::OpenAiCompatible { model, .. } => model,
        }
    }

    /// Check everything that can be checked without a network call
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            EmbeddingConfig::Gemini { api_key, .. } => require_gemini_key(api_key).map(|_| ()),
            EmbeddingConfig::OpenAiCompatible { base_url, .. } if base_url.trim().is_empty() => {
                Err(ConfigError::MissingBaseUrl("embedding"))
            }
            EmbeddingConfig::OpenAiCompatible { .. } => Ok(()),
        }
    }

    /// Tag identifying the vector space this configuration produces.
    ///
    /// Vectors from two different signatures must never be compared.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.provider_id(), self.model())
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::OpenAiCompatible {
            base_url: DEFAULT_LOCAL_BASE_URL.to_string(),
            api_key: String::new(),
            model: "text-embedding-mxbai-embed-large-v1".to_string(),
        }
    }
}

/// Chat backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatConfig {
    Gemini {
        api_key: String,
        model: String,
        temperature: f32,
    },
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible {
        base_url: String,
        api_key: String,
        model: String,
        temperature: f32,
    },
}

impl ChatConfig {
    pub fn model(&self) -> &str {
        match self {
            ChatConfig::Gemini { model, .. } => model,
            ChatConfig::OpenAiCompatible { model, .. } => model,
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            ChatConfig::Gemini { temperature, .. } => *temperature,
            ChatConfig::OpenAiCompatible { temperature, .. } => *temperature,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig::OpenAiCompatible {
            base_url: DEFAULT_LOCAL_BASE_URL.to_string(),
            api_key: String::new(),
            model: "openai/gpt-oss-20b".to_string(),
            temperature: 0.3,
        }
    }
}

/// Retrieval tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Chunks scoring below this are not used as context
    pub min_relevance_score: f32,
    /// How many chunks to over-fetch before thresholding
    pub search_top_k: usize,
    /// Maximum number of paths listed for structural questions
    pub structure_listing_limit: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            min_relevance_score: 0.55,
            search_top_k: 40,
            structure_listing_limit: 200,
        }
    }
}

/// Complete model configuration as edited by the host's settings dialog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub chat: ChatConfig,
    pub embedding: EmbeddingConfig,
    pub rag: RagSettings,
}

/// Pick the configured key, falling back to the environment.
///
/// Returns `None` when neither holds a non-blank value.
pub fn resolve_api_key(configured: &str, env_var: &str) -> Option<String> {
    let configured = configured.trim();
    if !configured.is_empty() {
        return Some(configured.to_string());
    }
    std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Gemini key lookup shared by the embedding and chat adapters
pub fn require_gemini_key(configured: &str) -> Result<String, ConfigError> {
    resolve_api_key(configured, GEMINI_API_KEY_ENV).ok_or(ConfigError::MissingApiKey {
        provider: "Gemini",
        env_var: GEMINI_API_KEY_ENV,
    })
}

/// Injected configuration holder
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<LlmConfig>>,
}

impl SharedConfig {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the configuration as it is right now
    pub fn snapshot(&self) -> LlmConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: LlmConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut LlmConfig),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}
