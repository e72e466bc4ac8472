//! Conversation state machine.
//!
//! DESIGN
//! ======
//! A [`Console`] is one agent's chat session. Every transition is a
//! synchronous closure over [`ConsoleState`] run under a `std::sync::Mutex`;
//! the result is republished whole on a `tokio::sync::watch` channel and
//! subscribers re-render from the latest value. The mutex is never held
//! across an await.
//!
//! Each logical operation (send, translate, panel translate) holds one
//! in-flight [`Token`]. Starting a new operation in the same slot removes the
//! stale placeholder and makes the stale result unpublishable; `new_chat`
//! bumps the epoch, which invalidates every slot at once.
//!
//! Ticket-store failures never block the conversation. They are logged and
//! treated as "no data".

pub mod state;
pub mod ticket_body;
pub mod translation_panel;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chat::{ChatError, ChatReply, ChatService, Intent, StreamEvent};
use crate::config::ResponseMode;
use crate::error::ErrorCode;
use crate::tickets::{Ticket, TicketStore, WorkflowStep};

pub use state::{ConsoleState, TicketSummary, Token};
pub use ticket_body::{Bubble, render_ticket_body};

/// Language recorded when the reply carries none.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("message text is empty")]
    EmptyMessage,

    #[error("no message at index {index}")]
    NoSuchMessage { index: usize },

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl ErrorCode for ConsoleError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "E_EMPTY_MESSAGE",
            Self::NoSuchMessage { .. } => "E_NO_SUCH_MESSAGE",
            Self::Chat(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Chat(e) => e.retryable(),
            Self::EmptyMessage | Self::NoSuchMessage { .. } => false,
        }
    }
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    /// The external call failed; the state shows a fallback.
    Failed,
    /// A newer operation or `new_chat` took over; nothing was published.
    Superseded,
}

/// Session settings fixed at construction.
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub response_mode: ResponseMode,
    pub user_id: String,
    pub record_workflow_steps: bool,
}

pub struct Console {
    chat: Arc<dyn ChatService>,
    tickets: Arc<dyn TicketStore>,
    settings: ConsoleSettings,
    state: Mutex<ConsoleState>,
    published: watch::Sender<ConsoleState>,
}

impl Console {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatService>, tickets: Arc<dyn TicketStore>, settings: ConsoleSettings) -> Self {
        let (published, _) = watch::channel(ConsoleState::default());
        Self { chat, tickets, settings, state: Mutex::new(ConsoleState::default()), published }
    }

    /// Latest published state.
    #[must_use]
    pub fn snapshot(&self) -> ConsoleState {
        self.published.borrow().clone()
    }

    /// Receiver notified after every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConsoleState> {
        self.published.subscribe()
    }

    /// Run `f` against the state. Subscribers are notified only when it
    /// returns `Some`.
    fn transition<R>(&self, f: impl FnOnce(&mut ConsoleState) -> Option<R>) -> Option<R> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut state);
        if out.is_some() {
            self.published.send_replace(state.clone());
        }
        out
    }

    /// Read the state under the lock without publishing.
    fn read<R>(&self, f: impl FnOnce(&ConsoleState) -> R) -> R {
        f(&self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run `f` and publish unconditionally.
    fn update<R>(&self, f: impl FnOnce(&mut ConsoleState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut state);
        self.published.send_replace(state.clone());
        out
    }

    /// Run `f` only while `token` is still current. Returns whether it ran.
    fn guarded(&self, token: Token, f: impl FnOnce(&mut ConsoleState)) -> bool {
        self.transition(|state| state.is_current(token).then(|| f(state)))
            .is_some()
    }

    // =========================================================================
    // SEND
    // =========================================================================

    /// Send one ticket turn and fold the answer into the log.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::EmptyMessage`] for blank text. Failures of the
    /// conversational call are reported as [`Outcome::Failed`] with the
    /// apology notice set, not as errors.
    pub async fn send_message(&self, text: &str) -> Result<Outcome, ConsoleError> {
        if text.trim().is_empty() {
            return Err(ConsoleError::EmptyMessage);
        }
        let start = self.update(|state| state.begin_send(text));
        let query = Intent::Ticket.tagged(text);
        let conversation_id = start.conversation_id.as_deref();

        let reply = match self.settings.response_mode {
            ResponseMode::Blocking => self.chat.send(&query, conversation_id).await,
            ResponseMode::Streaming => {
                let streamed = self
                    .stream_reply(&query, conversation_id, start.token, start.placeholder)
                    .await;
                match streamed {
                    Some(result) => result,
                    None => return Ok(Outcome::Superseded),
                }
            }
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "console: send failed");
                let published = self.guarded(start.token, |state| state.fail_send(start.placeholder));
                return Ok(if published { Outcome::Failed } else { Outcome::Superseded });
            }
        };

        let mut adopted = None;
        let published = self.guarded(start.token, |state| {
            adopted = state.complete_send(
                start.placeholder,
                &reply.answer,
                &reply.conversation_id,
                reply.variables.clone(),
            );
        });
        if !published {
            debug!("console: dropping superseded reply");
            return Ok(Outcome::Superseded);
        }
        let Some(conversation_id) = adopted else {
            warn!("console: reply carried no conversation id");
            return Ok(Outcome::Completed);
        };

        if start.first {
            self.bootstrap_ticket(start.token, &conversation_id, text, &reply).await;
        }
        if self.settings.record_workflow_steps {
            self.record_step(start.token, &conversation_id, start.step_number, text, &reply.answer)
                .await;
        }
        Ok(Outcome::Completed)
    }

    /// Consume a streamed reply, republishing the placeholder per fragment.
    /// `None` once the send has been superseded; the stream is dropped.
    async fn stream_reply(
        &self,
        query: &str,
        conversation_id: Option<&str>,
        token: Token,
        placeholder: u64,
    ) -> Option<Result<ChatReply, ChatError>> {
        let mut stream = match self.chat.send_streaming(query, conversation_id).await {
            Ok(stream) => stream,
            Err(e) => return Some(Err(e)),
        };

        let mut reply = ChatReply::default();
        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => return Some(Err(e)),
            };
            if reply.conversation_id.is_empty() {
                if let Some(id) = event.conversation_id() {
                    reply.conversation_id = id.to_string();
                }
            }
            match event {
                StreamEvent::Fragment { text, .. } => {
                    reply.answer.push_str(&text);
                    if !self.guarded(token, |state| state.stream_progress(placeholder, &reply.answer)) {
                        debug!("console: dropping superseded stream");
                        return None;
                    }
                }
                StreamEvent::Other { event, .. } => debug!(%event, "console: stream event skipped"),
            }
        }
        Some(Ok(reply))
    }

    /// Attach the conversation's ticket, creating it if the store has none.
    async fn bootstrap_ticket(&self, token: Token, conversation_id: &str, customer_text: &str, reply: &ChatReply) {
        let existing = match self.tickets.get_ticket_by_conversation_id(conversation_id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(error = %e, %conversation_id, "console: ticket lookup failed");
                None
            }
        };

        let summary = if let Some(ticket) = existing {
            info!(%conversation_id, workflow_id = %ticket.workflow_id, "console: adopted existing ticket");
            TicketSummary::from(ticket)
        } else {
            let ticket = Ticket {
                workflow_id: new_workflow_id(),
                conversation_id: conversation_id.to_string(),
                original_content: customer_text.to_string(),
                translated_content: reply.answer.clone(),
                language: detected_language(&reply.variables).unwrap_or(UNKNOWN_LANGUAGE).to_string(),
                user_id: self.settings.user_id.clone(),
            };
            let stored = match self.tickets.insert_ticket(&ticket).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, %conversation_id, "console: ticket insert failed");
                    false
                }
            };
            let mut summary = TicketSummary::from(ticket);
            if !stored {
                summary.workflow_id = None;
            }
            summary
        };

        self.transition(|state| state.same_chat(token).then(|| state.adopt_ticket(summary)));
    }

    /// Record one exchange under the ticket of the chat that started it.
    async fn record_step(
        &self,
        token: Token,
        conversation_id: &str,
        step_number: usize,
        customer_text: &str,
        answer: &str,
    ) {
        let workflow_id = self.read(|state| {
            if !state.same_chat(token) {
                return None;
            }
            state.ticket.as_ref().and_then(|t| t.workflow_id.clone())
        });
        let Some(workflow_id) = workflow_id else {
            debug!(%conversation_id, "console: no workflow id for this chat, step not recorded");
            return;
        };
        let step = WorkflowStep {
            workflow_id,
            step_number,
            ai_message: answer.to_string(),
            ai_message_translated: None,
            customer_message: customer_text.to_string(),
            conversation_id: conversation_id.to_string(),
            user_id: self.settings.user_id.clone(),
        };
        if let Err(e) = self.tickets.insert_ticket_workflow(&step).await {
            warn!(error = %e, %conversation_id, step_number, "console: workflow step insert failed");
        }
    }

    // =========================================================================
    // TRANSLATE
    // =========================================================================

    /// Fetch the cached translation of message `index` and attach it.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::NoSuchMessage`] when `index` is out of range.
    pub async fn translate_message(&self, index: usize) -> Result<Outcome, ConsoleError> {
        let start = self
            .transition(|state| state.begin_translate(index))
            .ok_or(ConsoleError::NoSuchMessage { index })?;

        let Some(conversation_id) = start.conversation_id.as_deref() else {
            let published = self.guarded(start.token, |state| {
                state.settle_translation(start.placeholder, state::TRANSLATION_NOT_READY);
            });
            return Ok(if published { Outcome::Completed } else { Outcome::Superseded });
        };

        let result = self.tickets.get_workflow_translation(conversation_id, &start.content).await;
        let (published, outcome) = match result {
            Ok(Some(translation)) => (
                self.guarded(start.token, |state| {
                    state.attach_translation(start.placeholder, start.target, translation);
                }),
                Outcome::Completed,
            ),
            Ok(None) => (
                self.guarded(start.token, |state| {
                    state.settle_translation(start.placeholder, state::TRANSLATION_NOT_READY);
                }),
                Outcome::Completed,
            ),
            Err(e) => {
                warn!(error = %e, %conversation_id, "console: translation lookup failed");
                (
                    self.guarded(start.token, |state| {
                        state.settle_translation(start.placeholder, state::TRANSLATION_FAILED);
                    }),
                    Outcome::Failed,
                )
            }
        };
        Ok(if published { outcome } else { Outcome::Superseded })
    }

    // =========================================================================
    // TRANSLATION PANEL
    // =========================================================================

    /// Translate free text in the side panel within the main conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::EmptyMessage`] for blank text and
    /// [`ConsoleError::Chat`] when the conversational call fails.
    pub async fn translate_panel(&self, text: &str) -> Result<Outcome, ConsoleError> {
        if text.trim().is_empty() {
            return Err(ConsoleError::EmptyMessage);
        }
        let (token, conversation_id, intent) = self.update(|state| {
            let (token, conversation_id) = state.begin_panel(text);
            (token, conversation_id, state.translation_panel.intent())
        });

        let reply = self.chat.send(&intent.tagged(text), conversation_id.as_deref()).await?;
        let published = self.guarded(token, |state| state.translation_panel.translated_text = reply.answer);
        Ok(if published { Outcome::Completed } else { Outcome::Superseded })
    }

    pub fn swap_panel(&self) {
        self.update(|state| state.translation_panel.swap());
    }

    // =========================================================================
    // RESET
    // =========================================================================

    /// Start over: clears the log, conversation and ticket, resets the panel,
    /// and invalidates everything still in flight.
    pub fn new_chat(&self) {
        self.update(ConsoleState::reset);
        info!("console: new chat");
    }
}

/// Language reported by the conversational service, if any.
fn detected_language(variables: &BTreeMap<String, String>) -> Option<&str> {
    ["language", "detected_language"]
        .iter()
        .find_map(|key| variables.get(*key))
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
}

fn new_workflow_id() -> String {
    format!("wf_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
#[path = "console_test.rs"]
mod tests;
