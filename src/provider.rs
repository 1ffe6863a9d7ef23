//! HTTP plumbing shared by the embedding, chat and GitHub adapters
//!
//! Every provider wraps its error bodies differently; `parse_api_error` turns them
//! into one readable line before they leave an adapter.

use serde_json::Value;
use std::time::Duration;

const MAX_BODY_EXCERPT: usize = 200;

/// Generative Language API root used by the Gemini adapters
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Build the reqwest client used by all adapters
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .user_agent(concat!("codebase-rag/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("[Provider] Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Join a base URL and a path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Extract a human-readable message from an error response body.
///
/// Looks for `error.message`, then `message`, then a string `error` field. Falls
/// back to `"<prefix> (<status>): <excerpt>"`.
pub fn parse_api_error(status: u16, body: &str, prefix: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        let nested = parsed
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str);
        let top = parsed.get("message").and_then(Value::as_str);
        let plain = parsed.get("error").and_then(Value::as_str);

        if let Some(msg) = nested.or(top).or(plain) {
            return msg.to_string();
        }
    }

    let excerpt = truncate_chars(body.trim(), MAX_BODY_EXCERPT);
    if excerpt.is_empty() {
        format!("{} ({})", prefix, status)
    } else {
        format!("{} ({}): {}", prefix, status, excerpt)
    }
}

/// Gemini accepts both "text-embedding-004" and "models/text-embedding-004"
pub fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
