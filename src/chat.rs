//! Streaming chat completions
//!
//! Both backends answer with server-sent events. `SseDecoder` reassembles
//! `data:` lines across network chunks and each backend pulls the token text out
//! of its own frame shape.

use crate::config::{require_gemini_key, ChatConfig, ConfigError};
use crate::provider::{gemini_model_path, http_client, join_url, parse_api_error, GEMINI_BASE_URL};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use thiserror::Error;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful coding assistant.";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Connection failed to {endpoint}. Check URL and network. ({message})")]
    Connection { endpoint: String, message: String },
    #[error("Chat error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Incremental completion text
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        config: &ChatConfig,
    ) -> Result<TokenStream, ChatError>;

    /// Whole completion as one string
    async fn complete(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        config: &ChatConfig,
    ) -> Result<String, ChatError> {
        let stream = self.stream_completion(messages, system, config).await?;
        collect_completion(stream).await
    }
}

/// Drain a token stream, failing on the first stream error
pub async fn collect_completion(mut stream: TokenStream) -> Result<String, ChatError> {
    let mut text = String::new();
    while let Some(token) = stream.next().await {
        text.push_str(&token?);
    }
    Ok(text)
}

/// One decoded server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    Done,
}

/// Line splitter for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line arrives, so frames (and multi-byte
/// characters) split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            frames.extend(parse_sse_line(&line));
        }
        frames
    }

    /// Flush a final line that was not newline-terminated
    pub fn finish(&mut self) -> Option<SseFrame> {
        let line = std::mem::take(&mut self.buffer);
        parse_sse_line(&line)
    }
}

fn parse_sse_line(line: &[u8]) -> Option<SseFrame> {
    let line = String::from_utf8_lossy(line);
    let data = line.trim().strip_prefix("data:")?.trim_start();
    match data {
        "" => None,
        "[DONE]" => Some(SseFrame::Done),
        _ => Some(SseFrame::Data(data.to_string())),
    }
}

/// Frame payload shape of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamFormat {
    OpenAi,
    Gemini,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

impl StreamFormat {
    /// Token text of one frame; malformed frames are skipped
    fn token(self, data: &str) -> Option<String> {
        let text: String = match self {
            StreamFormat::OpenAi => serde_json::from_str::<OpenAiStreamChunk>(data)
                .ok()?
                .choices
                .into_iter()
                .next()?
                .delta
                .content?,
            StreamFormat::Gemini => serde_json::from_str::<GeminiStreamChunk>(data)
                .ok()?
                .candidates
                .into_iter()
                .next()?
                .content?
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect(),
        };
        (!text.is_empty()).then_some(text)
    }
}

struct SseState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
    format: StreamFormat,
}

impl<S> SseState<S> {
    fn accept(&mut self, frames: impl IntoIterator<Item = SseFrame>) {
        for frame in frames {
            if self.finished {
                break;
            }
            match frame {
                SseFrame::Data(data) => self.pending.extend(self.format.token(&data)),
                SseFrame::Done => self.finished = true,
            }
        }
    }
}

/// Adapt a raw byte stream of SSE frames into tokens
fn token_stream<S, B, E>(body: S, format: StreamFormat) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
        format,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(token) = state.pending.pop_front() {
                return Some((Ok(token), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let frames = state.decoder.push(bytes.as_ref());
                    state.accept(frames);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ChatError::Stream(e.to_string())), state));
                }
                None => {
                    let last = state.decoder.finish();
                    state.accept(last);
                    state.finished = true;
                }
            }
        }
    }))
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiChatMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiChatRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

fn openai_request<'a>(
    messages: &'a [ChatMessage],
    system: Option<&'a str>,
    model: &'a str,
    temperature: f32,
) -> OpenAiChatRequest<'a> {
    let mut wire = vec![OpenAiChatMessage {
        role: Role::System,
        content: system.unwrap_or(DEFAULT_SYSTEM_PROMPT),
    }];
    wire.extend(messages.iter().map(|m| OpenAiChatMessage {
        role: m.role,
        content: &m.content,
    }));
    OpenAiChatRequest {
        model,
        messages: wire,
        temperature,
        stream: true,
    }
}

/// Gemini has no system role in `contents`; it travels separately
fn gemini_request<'a>(
    messages: &'a [ChatMessage],
    system: Option<&'a str>,
    temperature: f32,
) -> GeminiChatRequest<'a> {
    let contents = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| GeminiContent {
            role: Some(if m.role == Role::Assistant { "model" } else { "user" }),
            parts: vec![GeminiPart { text: &m.content }],
        })
        .collect();

    GeminiChatRequest {
        contents,
        system_instruction: system.map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text }],
        }),
        generation_config: GeminiGenerationConfig { temperature },
    }
}

/// HTTP chat adapter
pub struct HttpChatModel {
    client: reqwest::Client,
    gemini_base_url: String,
}

impl HttpChatModel {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            gemini_base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_gemini_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.gemini_base_url = base_url.into();
        self
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
        prefix: &str,
        format: StreamFormat,
    ) -> Result<TokenStream, ChatError> {
        let response = request.send().await.map_err(|e| ChatError::Connection {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: parse_api_error(status.as_u16(), &body, prefix),
            });
        }

        Ok(token_stream(Box::pin(response.bytes_stream()), format))
    }
}

impl Default for HttpChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        config: &ChatConfig,
    ) -> Result<TokenStream, ChatError> {
        match config {
            ChatConfig::OpenAiCompatible {
                base_url,
                api_key,
                model,
                temperature,
            } => {
                if base_url.trim().is_empty() {
                    return Err(ConfigError::MissingBaseUrl("chat").into());
                }
                let url = join_url(base_url, "chat/completions");
                let mut request = self
                    .client
                    .post(&url)
                    .json(&openai_request(messages, system, model, *temperature));
                if !api_key.trim().is_empty() {
                    request = request.bearer_auth(api_key.trim());
                }
                self.send(request, base_url, "API Error", StreamFormat::OpenAi)
                    .await
            }
            ChatConfig::Gemini {
                api_key,
                model,
                temperature,
            } => {
                let key = require_gemini_key(api_key)?;
                let url = join_url(
                    &self.gemini_base_url,
                    &format!("{}:streamGenerateContent", gemini_model_path(model)),
                );
                let request = self
                    .client
                    .post(&url)
                    .query(&[("alt", "sse"), ("key", key.as_str())])
                    .json(&gemini_request(messages, system, *temperature));
                self.send(
                    request,
                    &self.gemini_base_url,
                    "Gemini API Error",
                    StreamFormat::Gemini,
                )
                .await
            }
        }
    }
}
