//! Client configuration parsed from environment variables.

use std::collections::HashMap;
use std::env::VarError;
use std::time::Duration;

use url::Url;

use crate::error::ChatError;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io/";
pub const DEFAULT_TYPING_IDLE_MS: u64 = 1000;
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 10;

const ENV_KEYS: [&str; 4] =
    ["ROOMCHAT_BACKEND_URL", "ROOMCHAT_SOCKET_PATH", "ROOMCHAT_TYPING_IDLE_MS", "ROOMCHAT_JOIN_TIMEOUT_SECS"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub backend_url: String,
    pub socket_path: String,
    /// Quiet interval after the last keystroke before `stopTyping` is sent.
    pub typing_idle: Duration,
    /// Upper bound on connect plus the join handshake.
    pub join_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            socket_path: DEFAULT_SOCKET_PATH.to_owned(),
            typing_idle: Duration::from_millis(DEFAULT_TYPING_IDLE_MS),
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
        }
    }
}

impl ChatConfig {
    /// Build typed config from the process environment.
    ///
    /// Optional:
    /// - `ROOMCHAT_BACKEND_URL`: default `http://127.0.0.1:5000`
    /// - `ROOMCHAT_SOCKET_PATH`: default `/socket.io/`
    /// - `ROOMCHAT_TYPING_IDLE_MS`: default 1000
    /// - `ROOMCHAT_JOIN_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] when a variable is not valid UTF-8 or a
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self, ChatError> {
        let mut vars = HashMap::new();
        for key in ENV_KEYS {
            if let Some(value) = env_value(key, std::env::var(key))? {
                vars.insert(key, value);
            }
        }
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Same as [`ChatConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] when a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("ROOMCHAT_BACKEND_URL")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let socket_path = lookup("ROOMCHAT_SOCKET_PATH").unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_owned());
        let typing_idle_ms = parse_u64(&lookup, "ROOMCHAT_TYPING_IDLE_MS", DEFAULT_TYPING_IDLE_MS)?;
        let join_timeout_secs = parse_u64(&lookup, "ROOMCHAT_JOIN_TIMEOUT_SECS", DEFAULT_JOIN_TIMEOUT_SECS)?;

        Ok(Self {
            backend_url,
            socket_path,
            typing_idle: Duration::from_millis(typing_idle_ms),
            join_timeout: Duration::from_secs(join_timeout_secs),
        })
    }

    #[must_use]
    pub fn with_backend_url(mut self, backend_url: &str) -> Self {
        backend_url.trim_end_matches('/').clone_into(&mut self.backend_url);
        self
    }

    /// Websocket URL of the Socket.IO endpoint, e.g.
    /// `ws://host:5000/socket.io/?EIO=4&transport=websocket`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidEndpoint`] for schemes other than
    /// `http`, `https`, `ws` and `wss`, or for an unparsable URL.
    pub fn socket_url(&self) -> Result<Url, ChatError> {
        let base = self.backend_url.as_str();
        let ws_base = if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_owned()
        } else {
            return Err(ChatError::InvalidEndpoint(base.to_owned()));
        };

        let mut url = Url::parse(&ws_base).map_err(|e| ChatError::InvalidEndpoint(format!("{base}: {e}")))?;
        url.set_path(&self.socket_path);
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
        Ok(url)
    }
}

/// `None` for an unset variable; a set variable must be UTF-8.
fn env_value(key: &str, value: Result<String, VarError>) -> Result<Option<String>, ChatError> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(raw)) => Err(ChatError::Config(format!("{key} is not valid UTF-8: {raw:?}"))),
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ChatError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ChatError::Config(format!("{key} must be a non-negative integer, got {raw:?}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
