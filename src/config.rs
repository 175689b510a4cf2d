//! Per-client configuration.

use std::fmt;

use bon::Builder;
use secrecy::SecretString;
use url::Url;

use crate::Result;
use crate::error::Error;
use crate::ws::config::Config;

/// Default payload key the credential is sent under on join.
pub const DEFAULT_AUTH_FIELD: &str = "api_key";

/// Everything a [`crate::channel::Client`] needs, fixed for its lifetime.
///
/// # Example
///
/// ```
/// use phoenix_channel_client::config::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .url("ws://localhost:4000/ws/websocket")
///     .token("dummy123".to_owned())
///     .build();
///
/// assert_eq!(config.topics().lobby(), "games:lobby");
/// ```
#[non_exhaustive]
#[derive(Clone, Debug, Builder)]
pub struct ClientConfig {
    /// WebSocket endpoint of the server
    #[builder(into)]
    url: String,
    /// Credential merged into every join payload
    #[builder(into)]
    token: SecretString,
    /// Payload key the credential is sent under
    #[builder(default = DEFAULT_AUTH_FIELD.to_owned(), into)]
    auth_field: String,
    /// Builder for well-known topic names
    #[builder(default)]
    topics: TopicNames,
    /// Heartbeat, connect timeout and reconnection behavior
    #[builder(default)]
    connection: Config,
}

impl ClientConfig {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub fn auth_field(&self) -> &str {
        &self.auth_field
    }

    #[must_use]
    pub fn topics(&self) -> &TopicNames {
        &self.topics
    }

    #[must_use]
    pub fn connection(&self) -> &Config {
        &self.connection
    }

    /// Reject configurations the driver could never run with.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "unsupported URL scheme `{}`, expected ws or wss",
                url.scheme()
            )));
        }
        if self.connection.heartbeat_interval.is_zero() {
            return Err(Error::validation("heartbeat interval must be non-zero"));
        }
        if self.auth_field.is_empty() {
            return Err(Error::validation("auth field must not be empty"));
        }
        Ok(())
    }
}

/// Builds topic names of the form `{prefix}:{suffix}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicNames {
    prefix: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self::new("games")
    }
}

impl TopicNames {
    #[must_use]
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The well-known lobby topic.
    #[must_use]
    pub fn lobby(&self) -> String {
        self.entity("lobby")
    }

    /// Topic for one entity, e.g. `games:42`.
    #[must_use]
    pub fn entity<I: fmt::Display>(&self, id: I) -> String {
        format!("{}:{id}", self.prefix)
    }
}
