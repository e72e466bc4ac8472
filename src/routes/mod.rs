//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries three surfaces: the same-origin edge proxy to the
//! conversational API, the per-session console and search endpoints, and a
//! read-only ticket lookup. Every failure leaves as the shared JSON error
//! body from [`crate::error`].

pub mod proxy;
pub mod sessions;
pub mod tickets;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::console::ConsoleError;
use crate::error::{ErrorBody, ErrorCode, error_response};
use crate::search::SearchError;
use crate::state::AppState;
use crate::tickets::TicketError;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/proxy/{*path}", get(proxy::forward).post(proxy::forward))
        .route("/api/sessions", post(sessions::create))
        .route("/api/sessions/{id}", get(sessions::get).delete(sessions::delete))
        .route("/api/sessions/{id}/events", get(sessions::events))
        .route("/api/sessions/{id}/messages", post(sessions::send_message))
        .route("/api/sessions/{id}/messages/{index}/translate", post(sessions::translate_message))
        .route("/api/sessions/{id}/new-chat", post(sessions::new_chat))
        .route("/api/sessions/{id}/translation-panel", post(sessions::translate_panel))
        .route("/api/sessions/{id}/translation-panel/swap", post(sessions::swap_panel))
        .route("/api/sessions/{id}/search", post(sessions::search))
        .route("/api/sessions/{id}/search/page", post(sessions::jump_page))
        .route("/api/tickets/{workflow_id}", get(tickets::get_by_workflow_id))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// API ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("conversational API is not configured")]
    ChatNotConfigured,

    #[error("session not found")]
    SessionNotFound,

    #[error("ticket not found")]
    TicketNotFound,

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Tickets(#[from] TicketError),
}

impl ErrorCode for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ChatNotConfigured => "E_CHAT_NOT_CONFIGURED",
            Self::SessionNotFound => "E_SESSION_NOT_FOUND",
            Self::TicketNotFound => "E_TICKET_NOT_FOUND",
            Self::Console(e) => e.error_code(),
            Self::Search(e) => e.error_code(),
            Self::Tickets(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::ChatNotConfigured | Self::SessionNotFound | Self::TicketNotFound => false,
            Self::Console(e) => e.retryable(),
            Self::Search(e) => e.retryable(),
            Self::Tickets(e) => e.retryable(),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::ChatNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SessionNotFound | Self::TicketNotFound | Self::Console(ConsoleError::NoSuchMessage { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::Console(ConsoleError::EmptyMessage) | Self::Search(SearchError::EmptyQuery) => {
                StatusCode::BAD_REQUEST
            }
            Self::Console(ConsoleError::Chat(_)) | Self::Search(SearchError::Chat(_)) | Self::Tickets(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, code = self.error_code(), "api: request failed");
        }
        error_response(status, ErrorBody::from_code(&self))
    }
}
