//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the parsed configuration, the external-service clients behind
//! their traits, and a registry of live sessions. Each session pairs a
//! conversation [`Console`] with its own [`SearchPanel`]; both keep their
//! state in memory for the lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::console::{Console, ConsoleSettings};
use crate::search::SearchPanel;
use crate::tickets::TicketStore;

// =============================================================================
// SESSION
// =============================================================================

/// One agent workspace: the ticket conversation plus the search panel.
pub struct Session {
    pub console: Console,
    pub search: SearchPanel,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Client used by the edge proxy.
    pub http: reqwest::Client,
    /// `None` when the conversational API is not configured.
    pub chat: Option<Arc<dyn ChatService>>,
    pub tickets: Arc<dyn TicketStore>,
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        http: reqwest::Client,
        chat: Option<Arc<dyn ChatService>>,
        tickets: Arc<dyn TicketStore>,
    ) -> Self {
        Self { config: Arc::new(config), http, chat, tickets, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    fn console_settings(&self) -> ConsoleSettings {
        let response_mode = self
            .config
            .chat
            .as_ref()
            .map(|chat| chat.response_mode)
            .unwrap_or_default();
        ConsoleSettings {
            response_mode,
            user_id: self.config.ticket_user_id.clone(),
            record_workflow_steps: self.config.record_workflow_steps,
        }
    }

    /// Register a fresh session. `None` when chat is not configured.
    pub async fn create_session(&self) -> Option<(Uuid, Arc<Session>)> {
        let chat = self.chat.clone()?;
        let session = Arc::new(Session {
            console: Console::new(chat.clone(), self.tickets.clone(), self.console_settings()),
            search: SearchPanel::new(chat),
        });
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, session.clone());
        tracing::info!(session_id = %id, "sessions: created");
        Some((id, session))
    }

    pub async fn session(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drop a session from the registry. `false` when it was not there.
    pub async fn remove_session(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "sessions: removed");
        }
        removed
    }
}
