//! Conversational-service client.
//!
//! DESIGN
//! ======
//! Business logic depends only on the [`ChatService`] trait. The HTTP
//! implementation is constructed once in `main` from [`ChatConfig`] and
//! shared behind an `Arc<dyn ChatService>`, so tests substitute mocks.
//!
//! [`ChatConfig`]: crate::config::ChatConfig

pub mod client;
pub mod stream;
pub mod types;

pub use client::HttpChatClient;
pub use types::{ChatError, ChatReply, ChatService, ChatStream, Intent, StreamEvent};
