//! Identity and credential providers, resolved on every bot call.

use async_trait::async_trait;
use base64::Engine;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("identity unavailable: {0}")]
    Identity(String),
    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

/// Supplies the `user` sent with each request.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_id(&self) -> Result<String, ProviderError>;
}

/// Supplies the optional `Authorization` header value.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn authorization(&self) -> Result<Option<String>, ProviderError>;
}

/// Fixed identity from config or env.
#[derive(Debug, Clone)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    pub fn new(user: impl Into<String>) -> Self {
        Self(user.into())
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn user_id(&self) -> Result<String, ProviderError> {
        if self.0.trim().is_empty() {
            return Err(ProviderError::Identity("empty user id".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// No Authorization header.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    async fn authorization(&self) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}

/// Header value sent verbatim (e.g. "Bearer ...").
#[derive(Clone)]
pub struct StaticCredentials(String);

impl StaticCredentials {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticCredentials(..)")
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn authorization(&self) -> Result<Option<String>, ProviderError> {
        Ok(Some(self.0.clone()))
    }
}

/// HTTP Basic credentials: `Basic base64(username:password)`.
#[derive(Clone)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn header_value(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw.as_bytes())
        )
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialProvider for BasicCredentials {
    async fn authorization(&self) -> Result<Option<String>, ProviderError> {
        Ok(Some(self.header_value()))
    }
}

/// Reads the header value from an environment variable on every call, so a rotated secret is picked up without restart.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn authorization(&self) -> Result<Option<String>, ProviderError> {
        match std::env::var(&self.var) {
            Ok(v) if !v.trim().is_empty() => Ok(Some(v.trim().to_string())),
            _ => Err(ProviderError::Credentials(format!("{} is not set", self.var))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_credentials_encode_user_and_password() {
        let creds = BasicCredentials::new("mdp", "mdp");
        assert_eq!(
            creds.authorization().await.unwrap().as_deref(),
            Some("Basic bWRwOm1kcA==")
        );
    }

    #[tokio::test]
    async fn static_identity_rejects_blank_user() {
        assert!(StaticIdentity::new("  ").user_id().await.is_err());
        assert_eq!(StaticIdentity::new("u-7").user_id().await.unwrap(), "u-7");
    }

    #[tokio::test]
    async fn env_credentials_fail_when_unset() {
        let var = format!("MVA_TEST_UNSET_{}", uuid::Uuid::new_v4().simple());
        let err = EnvCredentials::new(var).authorization().await.unwrap_err();
        assert!(matches!(err, ProviderError::Credentials(_)));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let basic = format!("{:?}", BasicCredentials::new("svc", "hunter2"));
        assert!(!basic.contains("hunter2"));
        let header = format!("{:?}", StaticCredentials::new("Bearer abc"));
        assert!(!header.contains("abc"));
    }
}
