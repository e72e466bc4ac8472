//! Knowledge-base search panel.
//!
//! DESIGN
//! ======
//! Searches go through the conversational service with the search intent
//! tag, inside a conversation of their own: the first search allocates it
//! and every later search reuses it, independent of the main chat. The
//! answer is parsed into question/answer pairs shown one per page.

pub mod pagination;
pub mod parse;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::chat::{ChatError, ChatService, Intent};
use crate::console::Outcome;
use crate::error::ErrorCode;

pub use pagination::{PageItem, Pagination};
pub use parse::{SearchResult, parse_results};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search query is empty")]
    EmptyQuery,

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl ErrorCode for SearchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "E_EMPTY_QUERY",
            Self::Chat(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::EmptyQuery => false,
            Self::Chat(e) => e.retryable(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchState {
    pub conversation_id: Option<String>,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub pagination: Pagination,
    #[serde(skip)]
    seq: u64,
}

impl SearchState {
    /// Result shown on the current page.
    #[must_use]
    pub fn current_result(&self) -> Option<&SearchResult> {
        self.pagination.current.checked_sub(1).and_then(|i| self.results.get(i))
    }

    fn clear_results(&mut self) {
        self.results.clear();
        self.pagination = Pagination::default();
    }
}

pub struct SearchPanel {
    chat: Arc<dyn ChatService>,
    state: Mutex<SearchState>,
}

impl SearchPanel {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatService>) -> Self {
        Self { chat, state: Mutex::new(SearchState::default()) }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SearchState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    #[must_use]
    pub fn snapshot(&self) -> SearchState {
        self.with_state(|state| state.clone())
    }

    /// Run one search and replace the results.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::EmptyQuery`] for a blank query (no request is
    /// made) and [`SearchError::Chat`] when the service call fails; results
    /// are cleared in that case.
    pub async fn search(&self, query: &str) -> Result<Outcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let (seq, conversation_id) = self.with_state(|state| {
            state.seq += 1;
            state.query = query.to_string();
            (state.seq, state.conversation_id.clone())
        });

        let result = self
            .chat
            .send(&Intent::Search.tagged(query), conversation_id.as_deref())
            .await;

        self.with_state(|state| {
            if state.seq != seq {
                return Ok(Outcome::Superseded);
            }
            match result {
                Ok(reply) => {
                    if state.conversation_id.is_none() && !reply.conversation_id.is_empty() {
                        state.conversation_id = Some(reply.conversation_id);
                    }
                    state.results = parse_results(&reply.answer);
                    state.pagination = Pagination::new(state.results.len());
                    info!(query, results = state.results.len(), "search: completed");
                    Ok(Outcome::Completed)
                }
                Err(e) => {
                    warn!(error = %e, query, "search: failed");
                    state.clear_results();
                    Err(SearchError::Chat(e))
                }
            }
        })
    }

    /// Apply the page-jump input. Returns whether the page changed.
    pub fn jump(&self, input: &str) -> bool {
        self.with_state(|state| state.pagination.jump(input))
    }

    /// Clear query and results; the search conversation is kept.
    pub fn reset(&self) {
        self.with_state(|state| {
            state.seq += 1;
            state.query.clear();
            state.clear_results();
        });
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
