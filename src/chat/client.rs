//! HTTP client for the external conversational API.
//!
//! Speaks `POST {base}/chat-messages` in both buffered and streaming modes.
//! The credential and base URL come from [`ChatConfig`] at construction;
//! nothing here reads process state.

use std::collections::BTreeMap;

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::stream::decode_events;
use super::types::{ChatError, ChatReply, ChatService, ChatStream};
use crate::config::ChatConfig;

pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    user: String,
}

impl HttpChatClient {
    /// Build a client from typed config.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let http = config.timeouts.http_client().map_err(|e| ChatError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            user: config.user.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat-messages", self.base_url)
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, ChatError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ChatError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::ApiResponse { status, body: text });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ChatService for HttpChatClient {
    async fn send(&self, query: &str, conversation_id: Option<&str>) -> Result<ChatReply, ChatError> {
        debug!(query_len = query.len(), conversation_id = ?conversation_id, "chat: sending");
        let body = ChatRequest::new(query, conversation_id, &self.user, None);
        let text = self
            .post(&body)
            .await?
            .text()
            .await
            .map_err(|e| ChatError::ApiRequest(e.to_string()))?;
        let reply = parse_chat_reply(&text)?;
        info!(conversation_id = %reply.conversation_id, answer_len = reply.answer.len(), "chat: reply received");
        Ok(reply)
    }

    async fn send_streaming(&self, query: &str, conversation_id: Option<&str>) -> Result<ChatStream, ChatError> {
        debug!(query_len = query.len(), conversation_id = ?conversation_id, "chat: opening stream");
        let body = ChatRequest::new(query, conversation_id, &self.user, Some("streaming"));
        let response = self.post(&body).await?;
        Ok(decode_events(Box::pin(response.bytes_stream())).boxed())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    inputs: Value,
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
    user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mode: Option<&'static str>,
}

impl<'a> ChatRequest<'a> {
    pub(crate) fn new(
        query: &'a str,
        conversation_id: Option<&'a str>,
        user: &'a str,
        response_mode: Option<&'static str>,
    ) -> Self {
        Self {
            inputs: Value::Object(serde_json::Map::new()),
            query,
            conversation_id: conversation_id.filter(|id| !id.is_empty()),
            user,
            response_mode,
        }
    }
}

/// Decode a buffered `chat-messages` response.
pub(crate) fn parse_chat_reply(json_text: &str) -> Result<ChatReply, ChatError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| ChatError::ApiParse(e.to_string()))?;
    let Some(answer) = root.get("answer").and_then(Value::as_str) else {
        return Err(ChatError::ApiParse("chat-messages: missing answer".to_string()));
    };
    let conversation_id = root
        .get("conversation_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut variables = BTreeMap::new();
    if let Some(map) = root.get("variables").and_then(Value::as_object) {
        for (key, value) in map {
            let rendered = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            variables.insert(key.clone(), rendered);
        }
    }

    Ok(ChatReply { answer: answer.to_string(), conversation_id, variables })
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
