// Generative-text capability used for commit message summaries.
//
// A generator hands out models by family; a model takes chat messages and
// returns a stream of text chunks. Tests inject scripted implementations.

pub mod anthropic;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use thiserror::Error;

pub use anthropic::AnthropicGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("no language model available for family `{0}`")]
    Unavailable(String),

    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation stream failed: {0}")]
    Stream(String),
}

/// Chunks of generated text in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs.
    fn id(&self) -> &str;

    fn send_request(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<TextStream, GenerationError>> + Send + '_>>;
}

pub trait TextGenerator: Send + Sync {
    /// A model of the requested family, or `None` when none is usable.
    fn select_model(
        &self,
        family: &str,
    ) -> Pin<Box<dyn Future<Output = Option<Arc<dyn LanguageModel>>> + Send + '_>>;
}

/// Drain a text stream into one string.
pub async fn collect_text(mut stream: TextStream) -> Result<String, GenerationError> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;

    #[tokio::test]
    async fn collect_text_concatenates_chunks() {
        let model = ScriptedModel::text(&["Add ", "search ", "filters"]);
        let stream = model.send_request(vec![ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(collect_text(stream).await.unwrap(), "Add search filters");
    }

    #[tokio::test]
    async fn collect_text_stops_at_first_error() {
        let model = ScriptedModel::new(vec![
            Ok("partial".into()),
            Err(GenerationError::Stream("reset".into())),
            Ok("never".into()),
        ]);
        let stream = model.send_request(vec![ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(
            collect_text(stream).await.unwrap_err(),
            GenerationError::Stream("reset".into())
        );
    }
}
