//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.mva/config.json`) and environment.
//! Environment variables override the file for the bot URL, identity and credentials.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bot::ResponseMode;

/// Endpoint path of the virtual assistant deployment.
pub const MVA_ENDPOINT_PATH: &str = "/mva/";
/// Endpoint path of the generic ask-bot deployment.
pub const ASK_BOT_ENDPOINT_PATH: &str = "/ask_bot";

/// Env var that supplies the bot base URL.
pub const BOT_URL_ENV: &str = "MPL_BOT_API_REQUEST_URL";
/// Env var that supplies the user identity sent with each request.
pub const BOT_USER_ENV: &str = "MPL_BOT_USER";
/// Env var holding a verbatim Authorization header value.
pub const BOT_AUTHORIZATION_ENV: &str = "MPL_BOT_AUTHORIZATION";
/// Env var holding the basic-auth password.
pub const BOT_PASSWORD_ENV: &str = "MPL_BOT_PASSWORD";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Remote bot endpoint settings.
    #[serde(default)]
    pub bot: BotConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the widget and chat API (default 8080).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Remote bot endpoint: where to POST and what to send with each request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// Base URL of the bot service. Overridden by MPL_BOT_API_REQUEST_URL env.
    pub base_url: Option<String>,

    /// Path appended to the base URL: "/mva/" (default) or "/ask_bot".
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,

    /// Response mode used when the caller does not pick one.
    #[serde(default)]
    pub default_response_mode: ResponseMode,

    /// User identity sent as `user`. Overridden by MPL_BOT_USER env.
    pub user: Option<String>,

    /// Per-request deadline in seconds. When absent only the HTTP client defaults apply.
    pub timeout_secs: Option<u64>,

    /// Authorization settings.
    #[serde(default)]
    pub auth: BotAuthConfig,
}

fn default_endpoint_path() -> String {
    MVA_ENDPOINT_PATH.to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            endpoint_path: default_endpoint_path(),
            default_response_mode: ResponseMode::default(),
            user: None,
            timeout_secs: None,
            auth: BotAuthConfig::default(),
        }
    }
}

/// How the Authorization header is produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotAuthConfig {
    #[serde(default)]
    pub mode: BotAuthMode,

    /// Verbatim header value for mode "header". Read from MPL_BOT_AUTHORIZATION at call time when that env is set.
    pub header: Option<String>,

    /// Username for mode "basic".
    pub username: Option<String>,

    /// Password for mode "basic". Overridden by MPL_BOT_PASSWORD env.
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotAuthMode {
    /// No Authorization header.
    #[default]
    None,

    /// Send a configured header value as-is.
    Header,

    /// Send `Basic base64(username:password)`.
    Basic,
}

/// Reads the process environment; the default lookup for the `resolve_*` helpers.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Non-blank, trimmed value of `name` from the `env` lookup.
pub fn non_empty_env(env: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    env(name).and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the bot base URL: env MPL_BOT_API_REQUEST_URL overrides config.
pub fn resolve_bot_base_url(
    bot: &BotConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    non_empty_env(env, BOT_URL_ENV).or_else(|| non_empty(bot.base_url.as_ref()))
}

/// Resolve the user identity: env MPL_BOT_USER overrides config.
pub fn resolve_bot_user(bot: &BotConfig, env: impl Fn(&str) -> Option<String>) -> Option<String> {
    non_empty_env(env, BOT_USER_ENV).or_else(|| non_empty(bot.user.as_ref()))
}

/// Resolve the basic-auth password: env MPL_BOT_PASSWORD overrides config.
pub fn resolve_bot_password(
    bot: &BotConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    non_empty_env(env, BOT_PASSWORD_ENV).or_else(|| non_empty(bot.auth.password.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MVA_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".mva").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or MVA_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 8080);
        assert_eq!(g.bind, "127.0.0.1");
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.bot.endpoint_path, MVA_ENDPOINT_PATH);
        assert_eq!(config.bot.default_response_mode, ResponseMode::Blocking);
        assert_eq!(config.bot.auth.mode, BotAuthMode::None);
        assert!(config.bot.base_url.is_none());
    }

    #[test]
    fn parses_camel_case_bot_section() {
        let config: Config = serde_json::from_str(
            r#"{
                "bot": {
                    "baseUrl": "http://bot.local",
                    "endpointPath": "/ask_bot",
                    "defaultResponseMode": "streaming",
                    "timeoutSecs": 30,
                    "auth": { "mode": "basic", "username": "svc", "password": "pw" }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.bot.base_url.as_deref(), Some("http://bot.local"));
        assert_eq!(config.bot.endpoint_path, ASK_BOT_ENDPOINT_PATH);
        assert_eq!(config.bot.default_response_mode, ResponseMode::Streaming);
        assert_eq!(config.bot.timeout_secs, Some(30));
        assert_eq!(config.bot.auth.mode, BotAuthMode::Basic);
        assert_eq!(config.bot.auth.username.as_deref(), Some("svc"));
    }

    #[test]
    fn blank_config_values_are_ignored() {
        let bot = BotConfig {
            user: Some("   ".to_string()),
            ..BotConfig::default()
        };
        assert_eq!(non_empty(bot.user.as_ref()), None);
    }

    fn fake_env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn env_overrides_config_values() {
        let bot = BotConfig {
            base_url: Some("http://from-config".to_string()),
            user: Some("config-user".to_string()),
            ..BotConfig::default()
        };
        let env = fake_env(&[
            (BOT_URL_ENV, "http://from-env"),
            (BOT_USER_ENV, " env-user "),
        ]);
        assert_eq!(resolve_bot_base_url(&bot, &env).as_deref(), Some("http://from-env"));
        assert_eq!(resolve_bot_user(&bot, &env).as_deref(), Some("env-user"));
    }

    #[test]
    fn blank_env_falls_back_to_config() {
        let mut bot = BotConfig {
            base_url: Some("http://from-config".to_string()),
            ..BotConfig::default()
        };
        bot.auth.password = Some("cfg-pw".to_string());
        let env = fake_env(&[(BOT_URL_ENV, "   "), (BOT_PASSWORD_ENV, "")]);
        assert_eq!(
            resolve_bot_base_url(&bot, &env).as_deref(),
            Some("http://from-config")
        );
        assert_eq!(resolve_bot_password(&bot, &env).as_deref(), Some("cfg-pw"));
        assert_eq!(resolve_bot_user(&bot, |_| None), None);
    }

    #[test]
    fn load_config_missing_file_is_default() {
        let path = std::env::temp_dir()
            .join(format!("mva-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.gateway.port, 8080);
    }
}
