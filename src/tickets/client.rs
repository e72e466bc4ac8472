//! HTTP client for the external ticket API.
//!
//! All parameters travel as URL query strings, reads as `GET` and inserts as
//! `POST`. A `404` on a read means "no such record", never an error.

use serde_json::Value;
use tracing::{debug, info};

use super::types::{Ticket, TicketError, TicketStore, WorkflowStep};
use crate::config::Timeouts;

pub struct HttpTicketStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTicketStore {
    /// # Errors
    ///
    /// Returns [`TicketError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeouts: Timeouts) -> Result<Self, TicketError> {
        let http = timeouts
            .http_client()
            .map_err(|e| TicketError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// `GET` returning the body, or `None` on 404.
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Option<String>, TicketError> {
        let response = self
            .http
            .get(self.url(path))
            .query(params)
            .send()
            .await
            .map_err(|e| TicketError::ApiRequest(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TicketError::ApiRequest(e.to_string()))?;
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(path, "tickets: not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TicketError::ApiResponse { status: status.as_u16(), body: text });
        }
        Ok(Some(text))
    }

    async fn post(&self, path: &str, params: &[(&'static str, String)]) -> Result<(), TicketError> {
        let response = self
            .http
            .post(self.url(path))
            .query(params)
            .send()
            .await
            .map_err(|e| TicketError::ApiRequest(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TicketError::ApiResponse { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TicketStore for HttpTicketStore {
    async fn get_ticket_by_conversation_id(&self, conversation_id: &str) -> Result<Option<Ticket>, TicketError> {
        match self
            .get("get_ticket_by_conversation_id", &[("conversation_id", conversation_id)])
            .await?
        {
            Some(text) => parse_ticket(&text),
            None => Ok(None),
        }
    }

    async fn get_ticket_by_workflow_id(&self, workflow_id: &str) -> Result<Option<Ticket>, TicketError> {
        match self
            .get("get_ticket_by_workflow_id", &[("workflow_id", workflow_id)])
            .await?
        {
            Some(text) => parse_ticket(&text),
            None => Ok(None),
        }
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), TicketError> {
        self.post("insert_ticket", &insert_ticket_params(ticket)).await?;
        info!(workflow_id = %ticket.workflow_id, conversation_id = %ticket.conversation_id, "tickets: ticket inserted");
        Ok(())
    }

    async fn insert_ticket_workflow(&self, step: &WorkflowStep) -> Result<(), TicketError> {
        self.post("insert_ticket_workflow", &insert_workflow_params(step))
            .await?;
        info!(workflow_id = %step.workflow_id, step = step.step_number, "tickets: workflow step inserted");
        Ok(())
    }

    async fn get_workflow_translation(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<Option<String>, TicketError> {
        let body = self
            .get("get_workflow_translation", &[("conversation_id", conversation_id), ("message", message)])
            .await?;
        Ok(body.as_deref().and_then(parse_translation))
    }
}

// =============================================================================
// WIRE HELPERS
// =============================================================================

pub(crate) fn insert_ticket_params(ticket: &Ticket) -> Vec<(&'static str, String)> {
    vec![
        ("workflow_id", ticket.workflow_id.clone()),
        ("conversation_id", ticket.conversation_id.clone()),
        ("ticket_content_original", ticket.original_content.clone()),
        ("ticket_content_translated", ticket.translated_content.clone()),
        ("language", ticket.language.clone()),
        ("user_id", ticket.user_id.clone()),
    ]
}

pub(crate) fn insert_workflow_params(step: &WorkflowStep) -> Vec<(&'static str, String)> {
    vec![
        ("workflow_id", step.workflow_id.clone()),
        ("step_number", step.step_number.to_string()),
        ("ai_message", step.ai_message.clone()),
        ("ai_message_translated", step.ai_message_translated.clone().unwrap_or_default()),
        ("customer_message", step.customer_message.clone()),
        ("conversation_id", step.conversation_id.clone()),
        ("user_id", step.user_id.clone()),
    ]
}

/// Decode a ticket body. An `{"error": ...}` body without ticket fields is "not found".
pub(crate) fn parse_ticket(text: &str) -> Result<Option<Ticket>, TicketError> {
    let root: Value = serde_json::from_str(text).map_err(|e| TicketError::ApiParse(e.to_string()))?;
    let Some(obj) = root.as_object() else {
        return Err(TicketError::ApiParse("ticket body is not an object".to_string()));
    };
    if obj.contains_key("error") && !obj.contains_key("workflow_id") {
        return Ok(None);
    }
    serde_json::from_value(root)
        .map(Some)
        .map_err(|e| TicketError::ApiParse(e.to_string()))
}

/// Extract a cached translation from whatever shape the ticket API returns.
pub(crate) fn parse_translation(text: &str) -> Option<String> {
    let found = match serde_json::from_str::<Value>(text) {
        Ok(Value::String(s)) => Some(s),
        Ok(Value::Object(map)) => ["translation", "ai_message_translated", "translated_content"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_owned)),
        Ok(_) => None,
        Err(_) => Some(text.to_string()),
    };
    found
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
