//! Client configuration and credentials.
//!
//! [`RobinConfig`] holds endpoints and presentation knobs, every field
//! defaulted so an empty TOML file is valid. [`Credentials`] are kept apart
//! from it and never written to logs.

use serde::Deserialize;
use std::env;
use std::path::Path;

use crate::error::RobinError;

/// Environment variable read when no username is passed explicitly.
pub const USERNAME_ENV: &str = "ROBIN_USERNAME";
/// Environment variable read when no password is passed explicitly.
pub const PASSWORD_ENV: &str = "ROBIN_PASSWORD";

/// Endpoint and behaviour settings for a [`crate::client::RobinClient`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobinConfig {
    /// Scheme and host of the chat service, without a trailing slash.
    pub base_url: String,
    /// Path of the room page that embeds the setup payload.
    pub room_path: String,
    /// Path the room page redirects to when the user is not in a room.
    pub join_redirect_path: String,
    /// Character that marks a chat message as a command.
    pub command_prefix: char,
    /// How many characters of the room name the connected notice shows.
    pub room_name_display_len: usize,
    /// User-Agent header sent on every HTTP request.
    pub user_agent: String,
    /// Name of the session cookie.
    pub session_cookie: String,
}

impl Default for RobinConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            room_path: "/robin".to_string(),
            join_redirect_path: "/robin/join".to_string(),
            command_prefix: '!',
            room_name_display_len: 50,
            user_agent: concat!("robin-bot/", env!("CARGO_PKG_VERSION")).to_string(),
            session_cookie: "reddit_session".to_string(),
        }
    }
}

impl RobinConfig {
    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, RobinError> {
        let config: RobinConfig =
            toml::from_str(text).map_err(|e| RobinError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, RobinError> {
        match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    RobinError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), RobinError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(RobinError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.command_prefix.is_whitespace() {
            return Err(RobinError::Config("command_prefix cannot be whitespace".into()));
        }
        Ok(())
    }

    /// Join `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Value of the `cookie` header carrying `session_token`.
    pub fn cookie_header(&self, session_token: &str) -> String {
        format!("{}={}", self.session_cookie, session_token)
    }
}

/// Login identity and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build credentials from explicit values, falling back to
    /// `ROBIN_USERNAME` / `ROBIN_PASSWORD`.
    pub fn resolve(username: Option<String>, password: Option<String>) -> Result<Self, RobinError> {
        let username = match username {
            Some(u) => u,
            None => env::var(USERNAME_ENV).map_err(|_| {
                RobinError::Config(format!("{USERNAME_ENV} not set. Export it or pass --username."))
            })?,
        };
        let password = match password {
            Some(p) => p,
            None => env::var(PASSWORD_ENV).map_err(|_| {
                RobinError::Config(format!("{PASSWORD_ENV} not set. Export it or pass --password."))
            })?,
        };
        if username.trim().is_empty() {
            return Err(RobinError::Config("username is empty".into()));
        }
        Ok(Self::new(username, password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
