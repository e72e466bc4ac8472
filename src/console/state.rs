//! Console state: message log, conversation bookkeeping and in-flight slots.
//!
//! Every method here is a synchronous transition. [`super::Console`] runs
//! them under its mutex, publishes each result whole, and performs the
//! awaits in between.

use std::collections::BTreeMap;

use serde::Serialize;

use super::translation_panel::TranslationPanel;
use crate::tickets::Ticket;

/// Shown in place of a failed conversational exchange.
pub const SEND_FAILED_NOTICE: &str = "抱歉，服务暂时不可用，请稍后再试。";
/// Replaces a translation placeholder when nothing is cached yet.
pub const TRANSLATION_NOT_READY: &str = "翻译尚未生成，请稍后再试。";
/// Replaces a translation placeholder when the lookup failed.
pub const TRANSLATION_FAILED: &str = "翻译失败，请稍后重试。";

/// Key under which a fetched translation is attached to its message.
pub const TRANSLATION_VARIABLE: &str = "translation";

// =============================================================================
// MESSAGE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Stable within a session; placeholders are located by it.
    pub id: u64,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_content: Option<String>,
    pub is_loading: bool,
    /// Zero-based index of the exchange this message belongs to.
    pub step_number: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

// =============================================================================
// PHASE / TICKET SUMMARY
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingFirstResponse,
    Active,
}

/// Ticket content shown alongside the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketSummary {
    /// `None` when the ticket could not be stored.
    pub workflow_id: Option<String>,
    pub original_content: String,
    pub translated_content: String,
    pub language: String,
}

impl From<Ticket> for TicketSummary {
    fn from(ticket: Ticket) -> Self {
        Self {
            workflow_id: Some(ticket.workflow_id).filter(|id| !id.is_empty()),
            original_content: ticket.original_content,
            translated_content: ticket.translated_content,
            language: ticket.language,
        }
    }
}

// =============================================================================
// IN-FLIGHT TOKENS
// =============================================================================

/// Logical operation kinds; each holds at most one live request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Send,
    Translate,
    Panel,
}

/// Identifies one in-flight request. Stale once its slot moves on or the
/// chat is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub slot: Slot,
    pub epoch: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SlotState {
    seq: u64,
    placeholder: Option<u64>,
}

/// Returned by [`ConsoleState::begin_send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendStart {
    pub token: Token,
    pub placeholder: u64,
    pub conversation_id: Option<String>,
    pub first: bool,
    pub step_number: usize,
}

/// Returned by [`ConsoleState::begin_translate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateStart {
    pub token: Token,
    pub placeholder: u64,
    pub target: u64,
    pub content: String,
    pub conversation_id: Option<String>,
}

// =============================================================================
// CONSOLE STATE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleState {
    pub messages: Vec<Message>,
    pub phase: Phase,
    pub conversation_id: Option<String>,
    pub detected_language: Option<String>,
    pub ticket: Option<TicketSummary>,
    /// User-visible notice for the last failed exchange.
    pub notice: Option<String>,
    pub translation_panel: TranslationPanel,
    #[serde(skip)]
    epoch: u64,
    #[serde(skip)]
    next_message_id: u64,
    #[serde(skip)]
    send: SlotState,
    #[serde(skip)]
    translate: SlotState,
    #[serde(skip)]
    panel: SlotState,
}

impl ConsoleState {
    fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        match slot {
            Slot::Send => &mut self.send,
            Slot::Translate => &mut self.translate,
            Slot::Panel => &mut self.panel,
        }
    }

    fn slot(&self, slot: Slot) -> &SlotState {
        match slot {
            Slot::Send => &self.send,
            Slot::Translate => &self.translate,
            Slot::Panel => &self.panel,
        }
    }

    /// Whether `token` still names the live request of its slot.
    #[must_use]
    pub fn is_current(&self, token: Token) -> bool {
        token.epoch == self.epoch && self.slot(token.slot).seq == token.seq
    }

    /// Whether no `new_chat` happened since `token` was issued.
    #[must_use]
    pub fn same_chat(&self, token: Token) -> bool {
        token.epoch == self.epoch
    }

    /// Supersede whatever is in flight for `slot` and issue a fresh token.
    fn claim(&mut self, slot: Slot) -> Token {
        if let Some(stale) = self.slot_mut(slot).placeholder.take() {
            self.remove_message(stale);
        }
        let epoch = self.epoch;
        let state = self.slot_mut(slot);
        state.seq += 1;
        Token { slot, epoch, seq: state.seq }
    }

    fn push(&mut self, role: Role, content: String, step_number: usize, is_loading: bool) -> u64 {
        self.next_message_id += 1;
        let id = self.next_message_id;
        self.messages.push(Message {
            id,
            role,
            content,
            translated_content: None,
            is_loading,
            step_number,
            variables: BTreeMap::new(),
        });
        id
    }

    fn message_mut(&mut self, id: u64) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    fn remove_message(&mut self, id: u64) {
        self.messages.retain(|m| m.id != id);
    }

    // =========================================================================
    // SEND
    // =========================================================================

    /// Append the user message and a loading placeholder.
    pub fn begin_send(&mut self, text: &str) -> SendStart {
        let token = self.claim(Slot::Send);
        let first = self.conversation_id.is_none();
        let step_number = self.messages.len() / 2;

        let user = self.push(Role::User, text.to_string(), step_number, false);
        if first {
            if let Some(message) = self.message_mut(user) {
                message.translated_content = Some(text.to_string());
            }
            self.phase = Phase::AwaitingFirstResponse;
        }
        let placeholder = self.push(Role::Assistant, String::new(), step_number, true);
        self.send.placeholder = Some(placeholder);
        self.notice = None;

        SendStart { token, placeholder, conversation_id: self.conversation_id.clone(), first, step_number }
    }

    /// Show partial streamed text in the placeholder.
    pub fn stream_progress(&mut self, placeholder: u64, answer: &str) {
        if let Some(message) = self.message_mut(placeholder) {
            message.content = answer.to_string();
        }
    }

    /// Replace the placeholder with the answer and adopt the conversation id
    /// if none is held. Returns the conversation id now in effect.
    pub fn complete_send(
        &mut self,
        placeholder: u64,
        answer: &str,
        conversation_id: &str,
        variables: BTreeMap<String, String>,
    ) -> Option<String> {
        if self.conversation_id.is_none() && !conversation_id.is_empty() {
            self.conversation_id = Some(conversation_id.to_string());
        }
        if let Some(message) = self.message_mut(placeholder) {
            message.content = answer.to_string();
            message.is_loading = false;
            message.variables = variables;
        }
        self.send.placeholder = None;
        self.phase = if self.conversation_id.is_some() { Phase::Active } else { Phase::Idle };
        self.conversation_id.clone()
    }

    /// Drop the placeholder and surface the apology notice.
    pub fn fail_send(&mut self, placeholder: u64) {
        self.remove_message(placeholder);
        self.send.placeholder = None;
        self.notice = Some(SEND_FAILED_NOTICE.to_string());
        if self.conversation_id.is_none() {
            self.phase = Phase::Idle;
        }
    }

    /// Record the ticket for this conversation and seed the panel languages.
    pub fn adopt_ticket(&mut self, summary: TicketSummary) {
        let language = Some(summary.language.clone()).filter(|l| !l.is_empty() && l != "unknown");
        if let Some(language) = &language {
            self.translation_panel.apply_detected_language(language);
        }
        self.detected_language = language;
        self.ticket = Some(summary);
    }

    // =========================================================================
    // TRANSLATE
    // =========================================================================

    /// Append a loading placeholder for translating message `index`.
    /// `None` when there is no such message.
    pub fn begin_translate(&mut self, index: usize) -> Option<TranslateStart> {
        let target = self.messages.get(index)?;
        let (target_id, content, step_number) = (target.id, target.content.clone(), target.step_number);

        let token = self.claim(Slot::Translate);
        let placeholder = self.push(Role::Assistant, String::new(), step_number, true);
        self.translate.placeholder = Some(placeholder);

        Some(TranslateStart {
            token,
            placeholder,
            target: target_id,
            content,
            conversation_id: self.conversation_id.clone(),
        })
    }

    /// Attach the translation to its target and drop the placeholder.
    pub fn attach_translation(&mut self, placeholder: u64, target: u64, translation: String) {
        self.remove_message(placeholder);
        self.translate.placeholder = None;
        if let Some(message) = self.message_mut(target) {
            message.variables.insert(TRANSLATION_VARIABLE.to_string(), translation);
        }
    }

    /// Turn the placeholder into a fixed status text.
    pub fn settle_translation(&mut self, placeholder: u64, text: &str) {
        self.translate.placeholder = None;
        if let Some(message) = self.message_mut(placeholder) {
            message.content = text.to_string();
            message.is_loading = false;
        }
    }

    // =========================================================================
    // PANEL / RESET
    // =========================================================================

    pub fn begin_panel(&mut self, text: &str) -> (Token, Option<String>) {
        let token = self.claim(Slot::Panel);
        self.translation_panel.source_text = text.to_string();
        (token, self.conversation_id.clone())
    }

    /// Clear the conversation and invalidate everything in flight.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.messages.clear();
        self.phase = Phase::Idle;
        self.conversation_id = None;
        self.detected_language = None;
        self.ticket = None;
        self.notice = None;
        self.translation_panel.reset();
        for slot in [Slot::Send, Slot::Translate, Slot::Panel] {
            self.slot_mut(slot).placeholder = None;
        }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
