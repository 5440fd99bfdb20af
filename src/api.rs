//! HTTP API for the chat service

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::ChatHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatHandle,
}

impl AppState {
    pub fn new(chat: ChatHandle) -> Self {
        Self { chat }
    }
}
