//! Gateway: HTTP server for the chat widget.
//!
//! Single port serves the widget page, a placeholder dashboard, and the JSON chat API
//! that forwards messages to the bot and returns sanitized HTML.

mod protocol;
mod server;

pub use protocol::{ChatErrorBody, ChatParams, ChatReply, HistoryItem};
pub use server::{router, run_gateway, serve, GatewayState, WIDGET_PATH};
