//! Ticket records, workflow steps and the persistence trait.

use serde::{Deserialize, Serialize};

/// Errors produced by ticket-store calls.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket request failed: {0}")]
    ApiRequest(String),

    #[error("ticket response error: status {status}")]
    ApiResponse { status: u16, body: String },

    #[error("ticket response parse failed: {0}")]
    ApiParse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for TicketError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ApiRequest(_) => "E_TICKET_REQUEST",
            Self::ApiResponse { .. } => "E_TICKET_RESPONSE",
            Self::ApiParse(_) => "E_TICKET_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

/// A support ticket as stored by the ticket API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub workflow_id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default, rename = "ticket_content_original")]
    pub original_content: String,
    #[serde(default, rename = "ticket_content_translated")]
    pub translated_content: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub user_id: String,
}

/// One request/response exchange within a ticket's handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub workflow_id: String,
    pub step_number: usize,
    pub ai_message: String,
    pub ai_message_translated: Option<String>,
    pub customer_message: String,
    pub conversation_id: String,
    pub user_id: String,
}

/// Ticket persistence seam. Enables mocking in tests.
#[async_trait::async_trait]
pub trait TicketStore: Send + Sync {
    /// # Errors
    ///
    /// Transport failures and non-success statuses other than 404.
    async fn get_ticket_by_conversation_id(&self, conversation_id: &str) -> Result<Option<Ticket>, TicketError>;

    /// # Errors
    ///
    /// Transport failures and non-success statuses other than 404.
    async fn get_ticket_by_workflow_id(&self, workflow_id: &str) -> Result<Option<Ticket>, TicketError>;

    /// # Errors
    ///
    /// Transport failures and non-success statuses.
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), TicketError>;

    /// # Errors
    ///
    /// Transport failures and non-success statuses.
    async fn insert_ticket_workflow(&self, step: &WorkflowStep) -> Result<(), TicketError>;

    /// Cached translation for a conversation + message pair. `Ok(None)` when
    /// the translation has not been computed yet.
    ///
    /// # Errors
    ///
    /// Transport failures and non-success statuses other than 404.
    async fn get_workflow_translation(&self, conversation_id: &str, message: &str)
    -> Result<Option<String>, TicketError>;
}
