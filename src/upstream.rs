//! Upstream chat-completion client.
//!
//! [`ChatBackend`] is the seam between the dispatcher and the network:
//! [`HttpChatBackend`] talks to a real OpenAI-compatible endpoint, tests
//! supply in-memory replies.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::UpstreamConfig;

/// Upstream response body as a stream of raw chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, BackendError>>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Chat-completion request body sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// One user message, no history.
    pub fn single_prompt(model: impl Into<String>, prompt: impl Into<String>, stream: bool) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.into(),
            }],
            stream,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Non-streaming chat-completion response. Only the fields the bridge reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, or empty when absent.
    pub fn first_content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One `data:` payload of a streaming chat-completion response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

impl StreamChunk {
    /// Delta content of the first choice, if any.
    pub fn delta_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.as_ref())
            .and_then(|d| d.content.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Option<Delta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// Status, headers of interest and body of an upstream reply.
///
/// A non-2xx status is not an error at this layer; the dispatcher turns it
/// into an error-flagged tool result.
pub struct UpstreamReply {
    pub status: u16,
    pub reason: String,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_event_stream(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
    }

    /// Drain the body into a string (lossy UTF-8).
    pub async fn text(self) -> Result<String, BackendError> {
        let bytes = self
            .body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok::<_, BackendError>(acc)
            })
            .await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Drain the body and parse it as a non-streaming completion.
    pub async fn completion(self) -> Result<ChatCompletionResponse, BackendError> {
        let text = self.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Sends one chat-completion request upstream.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `bearer` overrides the backend's own credential when present.
    async fn send(
        &self,
        request: &ChatCompletionRequest,
        bearer: Option<&str>,
    ) -> Result<UpstreamReply, BackendError>;
}

/// [`ChatBackend`] over HTTP using reqwest.
pub struct HttpChatBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpChatBackend {
    pub fn new(config: &UpstreamConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(
        &self,
        request: &ChatCompletionRequest,
        bearer: Option<&str>,
    ) -> Result<UpstreamReply, BackendError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(bearer.unwrap_or(&self.api_key))
            .json(request);

        // A whole-request timeout would cut off long streams.
        if !request.stream {
            builder = builder.timeout(self.timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), stream = request.stream, "upstream replied");

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(UpstreamReply {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            body: response
                .bytes_stream()
                .map_err(|e| BackendError::Stream(e.to_string()))
                .boxed(),
        })
    }
}
