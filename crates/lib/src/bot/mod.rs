//! Remote bot client.
//!
//! One configurable client POSTs a query to `{baseUrl}{endpointPath}` and returns the bot's JSON reply.
//! Identity and credentials are resolved per call through injected providers.

mod client;
mod provider;
mod types;

pub use client::{BotClient, BotClientBuilder, BotError, BotQuery};
pub use provider::{
    BasicCredentials, CredentialProvider, EnvCredentials, IdentityProvider, NoCredentials,
    ProviderError, StaticCredentials, StaticIdentity,
};
pub use types::{BotRequest, BotResponse, ResponseMode};
