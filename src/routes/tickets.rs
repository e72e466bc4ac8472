//! Read-only ticket lookup for the ticket detail view.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use super::ApiError;
use crate::console::{Bubble, render_ticket_body};
use crate::languages::display_name;
use crate::state::AppState;
use crate::tickets::Ticket;

#[derive(Debug, Serialize)]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub bubbles: Vec<Bubble>,
    pub language_display: &'static str,
}

/// `GET /api/tickets/{workflow_id}`
pub async fn get_by_workflow_id(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<TicketView>, ApiError> {
    let ticket = state
        .tickets
        .get_ticket_by_workflow_id(&workflow_id)
        .await?
        .ok_or(ApiError::TicketNotFound)?;
    Ok(Json(TicketView {
        bubbles: render_ticket_body(&ticket.original_content),
        language_display: display_name(Some(ticket.language.as_str())),
        ticket,
    }))
}
