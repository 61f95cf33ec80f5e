//! MCP adapter: JSON-RPC tools, resources, and prompts over the shared
//! core API, served over SSE (in-process with the REST listener) and over
//! stdio (the `huddle-stdio` binary).

pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod sse;
pub mod tools;

pub use protocol::JsonRpcRequest;
pub use server::McpServer;
