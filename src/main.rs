mod chat;
mod config;
mod console;
mod error;
mod languages;
mod routes;
mod search;
mod state;
mod tickets;

use std::sync::Arc;

use chat::{ChatService, HttpChatClient};
use tickets::HttpTicketStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let chat: Option<Arc<dyn ChatService>> = match config.chat.as_ref() {
        Some(chat_config) => Some(Arc::new(HttpChatClient::new(chat_config).expect("chat client init failed"))),
        None => {
            tracing::warn!("CHAT_API_BASE_URL or CHAT_API_KEY not set; chat and proxy requests will fail");
            None
        }
    };
    let tickets = Arc::new(
        HttpTicketStore::new(&config.ticket_api_base_url, config.timeouts).expect("ticket client init failed"),
    );
    let http = config.timeouts.http_client().expect("proxy client init failed");

    let state = state::AppState::new(config, http, chat, tickets);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "ticketdesk listening");
    axum::serve(listener, app).await.expect("server failed");
}
