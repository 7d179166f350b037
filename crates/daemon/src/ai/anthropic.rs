// Anthropic Messages API client with server-sent event streaming.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{ChatMessage, GenerationError, LanguageModel, TextGenerator, TextStream};
use crate::security;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 256;

/// Hands out models only when an API key is configured.
#[derive(Clone)]
pub struct AnthropicGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnthropicGenerator {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key }
    }

    /// Resolve the key from the environment or keychain. A keychain failure
    /// leaves the generator without a key.
    pub fn from_environment() -> Self {
        let api_key = match security::resolve_api_key() {
            Ok(key) => key,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "could not read generator API key");
                None
            }
        };
        Self::new(api_key)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl TextGenerator for AnthropicGenerator {
    fn select_model(
        &self,
        family: &str,
    ) -> Pin<Box<dyn Future<Output = Option<Arc<dyn LanguageModel>>> + Send + '_>> {
        let family = family.trim().to_string();
        Box::pin(async move {
            let api_key = self.api_key.clone()?;
            if family.is_empty() {
                return None;
            }
            let model: Arc<dyn LanguageModel> = Arc::new(AnthropicModel {
                client: self.client.clone(),
                endpoint: format!("{}/v1/messages", self.base_url.trim_end_matches('/')),
                api_key,
                model: family,
            });
            Some(model)
        })
    }
}

struct AnthropicModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LanguageModel for AnthropicModel {
    fn id(&self) -> &str {
        &self.model
    }

    fn send_request(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<TextStream, GenerationError>> + Send + '_>> {
        Box::pin(async move {
            let body = json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "stream": true,
                "messages": messages
                    .iter()
                    .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                    .collect::<Vec<_>>(),
            });

            let response = self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|error| GenerationError::Request(error.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerationError::Status { status: status.as_u16(), body });
            }

            debug!(model = %self.model, "generation stream opened");
            Ok(text_stream(response))
        })
    }
}

fn text_stream(response: reqwest::Response) -> TextStream {
    let bytes = Box::pin(response.bytes_stream());
    let state = (bytes, SseDecoder::default(), VecDeque::new(), false);

    Box::pin(futures_util::stream::unfold(
        state,
        |(mut bytes, mut decoder, mut pending, mut done)| async move {
            loop {
                if let Some(item) = pending.pop_front() {
                    return Some((item, (bytes, decoder, pending, done)));
                }
                if done {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        for data in decoder.push(&chunk) {
                            match parse_event(&data) {
                                StreamEvent::Text(text) => pending.push_back(Ok(text)),
                                StreamEvent::Error(error) => {
                                    pending.push_back(Err(error));
                                    done = true;
                                }
                                StreamEvent::Stop => done = true,
                                StreamEvent::Other => {}
                            }
                        }
                    }
                    Some(Err(error)) => {
                        pending.push_back(Err(GenerationError::Stream(error.to_string())));
                        done = true;
                    }
                    None => done = true,
                }
            }
        },
    ))
}

/// Splits a byte stream into the `data:` payloads of server-sent events.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }

        payloads
    }
}

#[derive(Debug, PartialEq)]
enum StreamEvent {
    Text(String),
    Error(GenerationError),
    Stop,
    Other,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<RawDelta>,
    #[serde(default)]
    error: Option<RawError>,
}

#[derive(Deserialize)]
struct RawDelta {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct RawError {
    #[serde(default)]
    message: String,
}

fn parse_event(data: &str) -> StreamEvent {
    let Ok(event) = serde_json::from_str::<RawEvent>(data) else {
        return StreamEvent::Other;
    };
    match event.kind.as_str() {
        "content_block_delta" => match event.delta {
            Some(delta) if delta.kind == "text_delta" => StreamEvent::Text(delta.text),
            _ => StreamEvent::Other,
        },
        "message_stop" => StreamEvent::Stop,
        "error" => StreamEvent::Error(GenerationError::Stream(
            event.error.map(|e| e.message).unwrap_or_else(|| "unknown error".into()),
        )),
        _ => StreamEvent::Other,
    }
}
