//! Bot HTTP client: one POST per query, every failure collapsed into [`BotError::RequestFailed`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use reqwest::header::AUTHORIZATION;
use tokio_util::sync::CancellationToken;

use super::provider::{
    BasicCredentials, CredentialProvider, EnvCredentials, IdentityProvider, NoCredentials,
    ProviderError, StaticCredentials, StaticIdentity,
};
use super::types::{BotRequest, BotResponse, ResponseMode};
use crate::config::{self, BotAuthMode, BotConfig, MVA_ENDPOINT_PATH};

/// Identity used when neither config nor env names a user.
const DEFAULT_USER: &str = "anonymous";

/// Error seen by callers. Status codes and transport detail are logged, never returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BotError {
    #[error("Failed to fetch bot response.")]
    RequestFailed,
    #[error("bot request cancelled")]
    Cancelled,
}

/// Underlying cause of a failed call (logged only).
#[derive(Debug, thiserror::Error)]
enum SendFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("bot request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bot api error: {status} {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("bot response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("bot request exceeded deadline of {0:?}")]
    Deadline(Duration),
}

/// One query to the bot. Unset fields fall back to the client's defaults.
#[derive(Debug, Clone)]
pub struct BotQuery {
    text: String,
    response_mode: Option<ResponseMode>,
    conversation_id: Option<String>,
    parent_message_id: Option<String>,
    deadline: Option<Duration>,
}

impl BotQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            response_mode: None,
            conversation_id: None,
            parent_message_id: None,
            deadline: None,
        }
    }

    pub fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = Some(mode);
        self
    }

    pub fn conversation_id(mut self, id: Option<impl Into<String>>) -> Self {
        self.conversation_id = id.map(Into::into);
        self
    }

    pub fn parent_message_id(mut self, id: Option<impl Into<String>>) -> Self {
        self.parent_message_id = id.map(Into::into);
        self
    }

    /// Deadline for this call only; overrides the client timeout.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Client for the remote bot endpoint.
#[derive(Clone)]
pub struct BotClient {
    url: String,
    default_response_mode: ResponseMode,
    timeout: Option<Duration>,
    identity: Arc<dyn IdentityProvider>,
    credentials: Arc<dyn CredentialProvider>,
    client: reqwest::Client,
}

impl std::fmt::Debug for BotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotClient")
            .field("url", &self.url)
            .field("default_response_mode", &self.default_response_mode)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BotClient`].
pub struct BotClientBuilder {
    base_url: String,
    endpoint_path: String,
    default_response_mode: ResponseMode,
    timeout: Option<Duration>,
    identity: Option<Arc<dyn IdentityProvider>>,
    credentials: Arc<dyn CredentialProvider>,
    client: Option<reqwest::Client>,
}

impl BotClientBuilder {
    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    pub fn default_response_mode(mut self, mode: ResponseMode) -> Self {
        self.default_response_mode = mode;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    pub fn credentials(mut self, credentials: impl CredentialProvider + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    /// Share an existing connection pool.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<BotClient> {
        let base = self.base_url.trim();
        if base.is_empty() {
            bail!("bot base URL is empty");
        }
        let identity = self
            .identity
            .ok_or_else(|| anyhow!("bot client needs an identity provider"))?;
        Ok(BotClient {
            url: join_url(base, &self.endpoint_path),
            default_response_mode: self.default_response_mode,
            timeout: self.timeout,
            identity,
            credentials: self.credentials,
            client: self.client.unwrap_or_default(),
        })
    }
}

/// `{base}{path}` with exactly one slash between them.
fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim();
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

impl BotClient {
    pub fn builder(base_url: impl Into<String>) -> BotClientBuilder {
        BotClientBuilder {
            base_url: base_url.into(),
            endpoint_path: MVA_ENDPOINT_PATH.to_string(),
            default_response_mode: ResponseMode::default(),
            timeout: None,
            identity: None,
            credentials: Arc::new(NoCredentials),
            client: None,
        }
    }

    /// Build a client from the `bot` config section plus process env overrides.
    pub fn from_config(bot: &BotConfig) -> Result<Self> {
        Self::from_config_with_env(bot, config::process_env)
    }

    /// Like [`BotClient::from_config`], with env overrides read through `env`.
    pub fn from_config_with_env(
        bot: &BotConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let base_url = config::resolve_bot_base_url(bot, &env).ok_or_else(|| {
            anyhow!(
                "bot base URL not configured (set bot.baseUrl or {})",
                config::BOT_URL_ENV
            )
        })?;
        let user =
            config::resolve_bot_user(bot, &env).unwrap_or_else(|| DEFAULT_USER.to_string());
        let mut builder = Self::builder(base_url)
            .endpoint_path(bot.endpoint_path.clone())
            .default_response_mode(bot.default_response_mode)
            .identity(StaticIdentity::new(user));
        match bot.timeout_secs {
            Some(0) => bail!("bot.timeoutSecs must be greater than 0"),
            Some(secs) => builder = builder.timeout(Duration::from_secs(secs)),
            None => {}
        }
        let builder = match bot.auth.mode {
            BotAuthMode::None => builder,
            BotAuthMode::Header => {
                // A blank env value does not shadow the configured header.
                if config::non_empty_env(&env, config::BOT_AUTHORIZATION_ENV).is_some() {
                    builder.credentials(EnvCredentials::new(config::BOT_AUTHORIZATION_ENV))
                } else {
                    let value = bot
                        .auth
                        .header
                        .as_deref()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| {
                            anyhow!(
                                "bot.auth.mode is \"header\" but neither bot.auth.header nor {} is set",
                                config::BOT_AUTHORIZATION_ENV
                            )
                        })?;
                    builder.credentials(StaticCredentials::new(value))
                }
            }
            BotAuthMode::Basic => {
                let username = bot
                    .auth
                    .username
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| anyhow!("bot.auth.mode is \"basic\" but bot.auth.username is not set"))?;
                let password = config::resolve_bot_password(bot, &env).ok_or_else(|| {
                    anyhow!(
                        "bot.auth.mode is \"basic\" but neither bot.auth.password nor {} is set",
                        config::BOT_PASSWORD_ENV
                    )
                })?;
                builder.credentials(BasicCredentials::new(username, password))
            }
        };
        builder.build()
    }

    /// Full endpoint URL (`{baseUrl}{endpointPath}`).
    pub fn endpoint_url(&self) -> &str {
        &self.url
    }

    pub fn default_response_mode(&self) -> ResponseMode {
        self.default_response_mode
    }

    /// Send using the configured default response mode.
    pub async fn send(
        &self,
        query: &str,
        conversation_id: Option<&str>,
        parent_message_id: Option<&str>,
    ) -> Result<BotResponse, BotError> {
        self.send_query(
            BotQuery::new(query)
                .conversation_id(conversation_id)
                .parent_message_id(parent_message_id),
        )
        .await
    }

    /// Send with an explicit response mode.
    pub async fn send_with_mode(
        &self,
        query: &str,
        response_mode: ResponseMode,
        conversation_id: Option<&str>,
        parent_message_id: Option<&str>,
    ) -> Result<BotResponse, BotError> {
        self.send_query(
            BotQuery::new(query)
                .response_mode(response_mode)
                .conversation_id(conversation_id)
                .parent_message_id(parent_message_id),
        )
        .await
    }

    /// Send a query; fails with [`BotError::Cancelled`] as soon as `cancel` fires.
    pub async fn send_query_cancellable(
        &self,
        query: BotQuery,
        cancel: &CancellationToken,
    ) -> Result<BotResponse, BotError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("bot request to {} cancelled", self.url);
                Err(BotError::Cancelled)
            }
            res = self.send_query(query) => res,
        }
    }

    /// POST the query and return the reply verbatim.
    pub async fn send_query(&self, query: BotQuery) -> Result<BotResponse, BotError> {
        let deadline = query.deadline.or(self.timeout);
        let attempt = self.execute(query);
        let result = match deadline {
            Some(d) => match tokio::time::timeout(d, attempt).await {
                Ok(r) => r,
                Err(_) => Err(SendFailure::Deadline(d)),
            },
            None => attempt.await,
        };
        result.map_err(|e| {
            log::error!("bot request to {} failed: {}", self.url, e);
            BotError::RequestFailed
        })
    }

    async fn execute(&self, query: BotQuery) -> Result<BotResponse, SendFailure> {
        let user = self.identity.user_id().await?;
        let authorization = self.credentials.authorization().await?;
        let body = BotRequest {
            query: query.text,
            user,
            response_mode: query.response_mode.unwrap_or(self.default_response_mode),
            inputs: serde_json::Map::new(),
            conversation_id: query.conversation_id,
            parent_message_id: query.parent_message_id,
            files: None,
        };
        log::debug!(
            "POST {} (mode {}, conversation {:?})",
            self.url,
            body.response_mode,
            body.conversation_id
        );
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(value) = authorization {
            req = req.header(AUTHORIZATION, value);
        }
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(SendFailure::Status { status, body: text });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("http://bot/", "/mva/"), "http://bot/mva/");
        assert_eq!(join_url("http://bot", "ask_bot"), "http://bot/ask_bot");
        assert_eq!(join_url("http://bot/api//", "/ask_bot"), "http://bot/api/ask_bot");
        assert_eq!(join_url("http://bot", ""), "http://bot");
    }

    #[test]
    fn builder_defaults_to_mva_path_and_blocking() {
        let client = BotClient::builder("http://bot.local/")
            .identity(StaticIdentity::new("u"))
            .build()
            .unwrap();
        assert_eq!(client.endpoint_url(), "http://bot.local/mva/");
        assert_eq!(client.default_response_mode(), ResponseMode::Blocking);
    }

    #[test]
    fn builder_requires_identity_and_base_url() {
        assert!(BotClient::builder("http://bot.local").build().is_err());
        assert!(BotClient::builder("  ")
            .identity(StaticIdentity::new("u"))
            .build()
            .is_err());
    }

    #[test]
    fn from_config_basic_requires_username() {
        let mut bot = BotConfig {
            base_url: Some("http://bot.local".to_string()),
            ..BotConfig::default()
        };
        bot.auth.mode = BotAuthMode::Basic;
        bot.auth.password = Some("pw".to_string());
        assert!(BotClient::from_config_with_env(&bot, |_| None).is_err());
        bot.auth.username = Some("svc".to_string());
        assert!(BotClient::from_config_with_env(&bot, |_| None).is_ok());
    }

    #[test]
    fn from_config_uses_endpoint_path() {
        let bot = BotConfig {
            base_url: Some("http://bot.local".to_string()),
            endpoint_path: config::ASK_BOT_ENDPOINT_PATH.to_string(),
            default_response_mode: ResponseMode::Streaming,
            ..BotConfig::default()
        };
        let client = BotClient::from_config_with_env(&bot, |_| None).unwrap();
        assert_eq!(client.endpoint_url(), "http://bot.local/ask_bot");
        assert_eq!(client.default_response_mode(), ResponseMode::Streaming);
    }

    #[test]
    fn from_config_env_overrides_base_url() {
        let bot = BotConfig {
            base_url: Some("http://from-config".to_string()),
            ..BotConfig::default()
        };
        let client = BotClient::from_config_with_env(&bot, |name| {
            (name == config::BOT_URL_ENV).then(|| "http://from-env".to_string())
        })
        .unwrap();
        assert_eq!(client.endpoint_url(), "http://from-env/mva/");

        let unset = BotConfig::default();
        assert!(BotClient::from_config_with_env(&unset, |_| None).is_err());
    }

    #[test]
    fn from_config_rejects_zero_timeout() {
        let mut bot = BotConfig {
            base_url: Some("http://bot.local".to_string()),
            timeout_secs: Some(0),
            ..BotConfig::default()
        };
        let err = BotClient::from_config_with_env(&bot, |_| None).unwrap_err();
        assert!(err.to_string().contains("timeoutSecs"));
        bot.timeout_secs = Some(1);
        assert!(BotClient::from_config_with_env(&bot, |_| None).is_ok());
    }

    #[test]
    fn from_config_blank_authorization_env_falls_back_to_header() {
        let mut bot = BotConfig {
            base_url: Some("http://bot.local".to_string()),
            ..BotConfig::default()
        };
        bot.auth.mode = BotAuthMode::Header;
        bot.auth.header = Some("Bearer cfg".to_string());
        let blank = |name: &str| (name == config::BOT_AUTHORIZATION_ENV).then(|| "  ".to_string());
        assert!(BotClient::from_config_with_env(&bot, blank).is_ok());

        bot.auth.header = None;
        assert!(BotClient::from_config_with_env(&bot, blank).is_err());
    }

    #[test]
    fn error_message_is_generic() {
        assert_eq!(
            BotError::RequestFailed.to_string(),
            "Failed to fetch bot response."
        );
    }
}
