//! takc MCP Server
//!
//! Model Context Protocol server exposing compression, cached entries and
//! query answering to AI assistants.

pub mod protocol;
pub mod resources;
mod server;
pub mod tools;

pub use server::{start_server, McpServer};
