//! Session routes: the console and search panel of one agent workspace.
//!
//! Every mutating endpoint answers with the full [`SessionView`] so a client
//! can re-render from a single response.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::ApiError;
use crate::console::{Bubble, ConsoleState, Outcome, render_ticket_body};
use crate::languages::display_name;
use crate::search::{PageItem, SearchResult, SearchState};
use crate::state::{AppState, Session};

// =============================================================================
// VIEWS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SearchView {
    #[serde(flatten)]
    pub state: SearchState,
    pub pages: Vec<PageItem>,
    pub current_result: Option<SearchResult>,
}

impl From<SearchState> for SearchView {
    fn from(state: SearchState) -> Self {
        Self {
            pages: state.pagination.items(),
            current_result: state.current_result().cloned(),
            state,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub console: ConsoleState,
    pub ticket_bubbles: Vec<Bubble>,
    pub language_display: &'static str,
    pub search: SearchView,
    /// How the request that produced this view ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl SessionView {
    fn build(session_id: Uuid, session: &Session, outcome: Option<Outcome>) -> Self {
        let console = session.console.snapshot();
        let ticket_bubbles = console
            .ticket
            .as_ref()
            .map(|ticket| render_ticket_body(&ticket.original_content))
            .unwrap_or_default();
        let language_display = display_name(console.ticket.as_ref().map(|ticket| ticket.language.as_str()));
        Self {
            session_id,
            console,
            ticket_bubbles,
            language_display,
            search: session.search.snapshot().into(),
            outcome,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct PageBody {
    pub input: String,
}

async fn lookup(state: &AppState, id: Uuid) -> Result<Arc<Session>, ApiError> {
    if state.chat.is_none() {
        return Err(ApiError::ChatNotConfigured);
    }
    state.session(id).await.ok_or(ApiError::SessionNotFound)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/sessions`: open a fresh workspace.
pub async fn create(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let (id, session) = state.create_session().await.ok_or(ApiError::ChatNotConfigured)?;
    Ok((StatusCode::CREATED, Json(SessionView::build(id, &session, None))))
}

/// `GET /api/sessions/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    Ok(Json(SessionView::build(id, &session, None)))
}

/// `DELETE /api/sessions/{id}`: close a workspace. Open event streams end.
pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    if state.chat.is_none() {
        return Err(ApiError::ChatNotConfigured);
    }
    if state.remove_session(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound)
    }
}

/// `GET /api/sessions/{id}/events`: the console state now and after every
/// transition, one SSE `state` event each. Streaming replies arrive here
/// fragment by fragment.
pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = lookup(&state, id).await?;
    let updates = session.console.subscribe();
    let stream = futures::stream::unfold((updates, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let data = serde_json::to_string(&*rx.borrow_and_update());
        match data {
            Ok(data) => Some((Ok(Event::default().event("state").data(data)), (rx, false))),
            Err(e) => {
                warn!(error = %e, "sessions: state not serializable");
                None
            }
        }
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `POST /api/sessions/{id}/messages`: send one ticket turn.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TextBody>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let outcome = session.console.send_message(&body.text).await?;
    Ok(Json(SessionView::build(id, &session, Some(outcome))))
}

/// `POST /api/sessions/{id}/messages/{index}/translate`
pub async fn translate_message(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let outcome = session.console.translate_message(index).await?;
    Ok(Json(SessionView::build(id, &session, Some(outcome))))
}

/// `POST /api/sessions/{id}/new-chat`: reset the console and search results.
pub async fn new_chat(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    session.console.new_chat();
    session.search.reset();
    Ok(Json(SessionView::build(id, &session, None)))
}

/// `POST /api/sessions/{id}/translation-panel`
pub async fn translate_panel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TextBody>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let outcome = session.console.translate_panel(&body.text).await?;
    Ok(Json(SessionView::build(id, &session, Some(outcome))))
}

/// `POST /api/sessions/{id}/translation-panel/swap`
pub async fn swap_panel(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    session.console.swap_panel();
    Ok(Json(SessionView::build(id, &session, None)))
}

/// `POST /api/sessions/{id}/search`
pub async fn search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<QueryBody>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let outcome = session.search.search(&body.query).await?;
    Ok(Json(SessionView::build(id, &session, Some(outcome))))
}

/// `POST /api/sessions/{id}/search/page`: jump to a typed page number.
pub async fn jump_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PageBody>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    session.search.jump(&body.input);
    Ok(Json(SessionView::build(id, &session, None)))
}

#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;
