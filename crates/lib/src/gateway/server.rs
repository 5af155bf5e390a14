//! Gateway HTTP server (single port): widget pages and the chat API.

use crate::bot::{BotClient, BotQuery};
use crate::chat::{ChatEntry, ChatHistory, ChatRole};
use crate::config::Config;
use crate::gateway::protocol::{non_blank, ChatErrorBody, ChatParams, ChatReply, HistoryItem};
use crate::markdown::MarkdownRenderer;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

const WIDGET_HTML: &str = include_str!("../../assets/widget.html");
const COMING_SOON_HTML: &str = include_str!("../../assets/coming_soon.html");

/// Path of the chat widget; `/` redirects here.
pub const WIDGET_PATH: &str = "/virtual-assistants";

/// Shared state for the gateway (config, bot client, renderer, history).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub bot: BotClient,
    pub renderer: MarkdownRenderer,
    pub history: ChatHistory,
}

impl GatewayState {
    /// State around an already-built bot client, with a fresh history.
    pub fn new(config: Config, bot: BotClient) -> Self {
        Self {
            config: Arc::new(config),
            bot,
            renderer: MarkdownRenderer::new(),
            history: ChatHistory::new(),
        }
    }

    /// Build state from config. Fails when the bot endpoint is not configured.
    pub fn from_config(config: Config) -> Result<Self> {
        let bot = BotClient::from_config(&config.bot).context("configuring bot client")?;
        Ok(Self::new(config, bot))
    }
}

/// Routes served by the gateway.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(root_redirect))
        .route(WIDGET_PATH, get(widget_page))
        .route("/dashboard", get(dashboard_page))
        .route("/health", get(health_http))
        .route("/api/chat", get(chat_history).post(chat_send))
        .with_state(state)
}

/// Build state from config, bind, serve until SIGINT/SIGTERM, then return.
pub async fn run_gateway(config: Config) -> Result<()> {
    serve(GatewayState::from_config(config)?).await
}

/// Serve `state` on `state.config.gateway` until SIGINT/SIGTERM.
pub async fn serve(state: GatewayState) -> Result<()> {
    log::info!(
        "forwarding chat messages to {} (default mode {})",
        state.bot.endpoint_url(),
        state.bot.default_response_mode()
    );

    let bind_addr = format!(
        "{}:{}",
        state.config.gateway.bind.trim(),
        state.config.gateway.port
    );
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

async fn root_redirect() -> Redirect {
    Redirect::temporary(WIDGET_PATH)
}

async fn widget_page() -> Html<&'static str> {
    Html(WIDGET_HTML)
}

async fn dashboard_page() -> Html<&'static str> {
    Html(COMING_SOON_HTML)
}

/// GET /health returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}

/// GET /api/chat — full history; bot entries carry rendered HTML.
async fn chat_history(State(state): State<GatewayState>) -> Json<Vec<HistoryItem>> {
    let items = state
        .history
        .entries()
        .await
        .into_iter()
        .map(|entry| {
            let html = match entry.role {
                ChatRole::Bot => Some(state.renderer.render(&entry.content)),
                ChatRole::User => None,
            };
            HistoryItem {
                role: entry.role,
                content: entry.content,
                html,
            }
        })
        .collect();
    Json(items)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ChatErrorBody { error: error.into() })).into_response()
}

/// POST /api/chat — record the user message, ask the bot, record and return the rendered reply.
async fn chat_send(State(state): State<GatewayState>, Json(params): Json<ChatParams>) -> Response {
    let message = params.message.trim();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }
    state.history.append(ChatEntry::user(message)).await;

    let mut query = BotQuery::new(message)
        .conversation_id(non_blank(params.conversation_id))
        .parent_message_id(non_blank(params.parent_message_id));
    if let Some(mode) = params.response_mode {
        query = query.response_mode(mode);
    }

    match state.bot.send_query(query).await {
        Ok(res) => {
            let html = state.renderer.render(&res.answer);
            let conversation_id = res.conversation_id_text();
            let message_id = res.message_id_text();
            state.history.append(ChatEntry::bot(res.answer.clone())).await;
            Json(ChatReply {
                answer: res.answer,
                html,
                conversation_id,
                message_id,
            })
            .into_response()
        }
        Err(e) => {
            state.history.append(ChatEntry::bot(e.to_string())).await;
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}
