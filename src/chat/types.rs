//! Conversational-service types: replies, stream events, intents and errors.

use std::collections::BTreeMap;

use futures::stream::BoxStream;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by conversational-service calls.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The HTTP request to the conversational service failed.
    #[error("chat request failed: {0}")]
    ApiRequest(String),

    /// The service returned a non-success HTTP status.
    #[error("chat response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("chat response parse failed: {0}")]
    ApiParse(String),

    /// The stream reported an `error` event.
    #[error("chat stream error: {0}")]
    Stream(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ApiRequest(_) => "E_CHAT_REQUEST",
            Self::ApiResponse { .. } => "E_CHAT_RESPONSE",
            Self::ApiParse(_) => "E_CHAT_PARSE",
            Self::Stream(_) => "E_CHAT_STREAM",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// INTENT
// =============================================================================

/// Bracketed tag prepended to outgoing text. Steers routing inside the
/// external service; carries no meaning here beyond concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Ticket,
    TranslateToChinese,
    TranslateToSource,
    Search,
}

impl Intent {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Ticket => "【工单】",
            Self::TranslateToChinese => "【翻译成中文】",
            Self::TranslateToSource => "【翻译成源语言】",
            Self::Search => "【搜索】",
        }
    }

    #[must_use]
    pub fn tagged(self, text: &str) -> String {
        format!("{}{text}", self.tag())
    }
}

// =============================================================================
// REPLIES
// =============================================================================

/// Buffered reply from `POST /chat-messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub answer: String,
    pub conversation_id: String,
    /// Structured variables such as the detected language.
    pub variables: BTreeMap<String, String>,
}

/// One decoded `data:` frame of a streaming reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental answer text.
    Fragment { text: String, conversation_id: Option<String> },
    /// Any other event (`message_end`, `workflow_started`, ...).
    Other { event: String, conversation_id: Option<String> },
}

impl StreamEvent {
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::Fragment { conversation_id, .. } | Self::Other { conversation_id, .. } => conversation_id.as_deref(),
        }
    }
}

/// Lazy, finite, non-restartable sequence of stream events.
pub type ChatStream = BoxStream<'static, Result<StreamEvent, ChatError>>;

// =============================================================================
// CHAT SERVICE TRAIT
// =============================================================================

/// Conversational service seam. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ChatService: Send + Sync {
    /// Send one utterance and wait for the full answer.
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError`] on transport failure, non-success status or
    /// an undecodable body.
    async fn send(&self, query: &str, conversation_id: Option<&str>) -> Result<ChatReply, ChatError>;

    /// Send one utterance and return the answer as a stream of events.
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError`] if the request cannot be started or the
    /// service answers with a non-success status.
    async fn send_streaming(&self, query: &str, conversation_id: Option<&str>) -> Result<ChatStream, ChatError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
