//! Shared application state.

use std::sync::Arc;

use huddle_bus::ChatBus;

use crate::mcp::sse::McpSessionRegistry;

/// State shared across handlers. Adapters see the bus and nothing else.
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<ChatBus>,
    pub mcp_sessions: Arc<McpSessionRegistry>,
}

impl AppState {
    pub fn new(bus: Arc<ChatBus>) -> Self {
        Self {
            bus,
            mcp_sessions: Arc::new(McpSessionRegistry::default()),
        }
    }
}
