//! Ticket persistence client.
//!
//! DESIGN
//! ======
//! Tickets and workflow steps live in an external HTTP API. The console
//! talks to it through the [`TicketStore`] trait; [`HttpTicketStore`] is the
//! production implementation and tests swap in a recording mock.

pub mod client;
pub mod types;

pub use client::HttpTicketStore;
pub use types::{Ticket, TicketError, TicketStore, WorkflowStep};
