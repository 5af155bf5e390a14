//! Virtual assistant core library: bot client, markdown rendering, chat history,
//! and the gateway that serves the chat widget. Shared by the CLI.

pub mod bot;
pub mod chat;
pub mod config;
pub mod gateway;
pub mod init;
pub mod markdown;
