use std::env;

use chrono::Duration;
use thiserror::Error;

use crate::auth::AuthSettings;

pub const DEFAULT_DATABASE: &str = "settleup";
pub const DEFAULT_LOG_FILTER: &str = "settleup=info,actix_web=info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("You need to add {0} to the env")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    /// `None` keeps groups in memory only.
    pub mongodb_uri: Option<String>,
    pub database: String,
    pub bind: String,
    pub port: u16,
    pub auth_max_age: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bot_token = var("BOT_API_TOKEN").ok_or(ConfigError::Missing("BOT_API_TOKEN"))?;
        let port = match var("PORT") {
            Some(port) => port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: port,
            })?,
            None => 8080,
        };
        let auth_max_age = match var("AUTH_MAX_AGE_SECS") {
            Some(secs) => secs
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .and_then(Duration::try_seconds)
                .ok_or(ConfigError::Invalid {
                    key: "AUTH_MAX_AGE_SECS",
                    value: secs,
                })?,
            None => Duration::days(1),
        };

        Ok(Self {
            bot_token,
            mongodb_uri: var("MONGODB_URI"),
            database: var("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            bind: var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            auth_max_age,
        })
    }

    pub fn auth(&self) -> AuthSettings {
        AuthSettings {
            bot_token: self.bot_token.clone(),
            max_age: self.auth_max_age,
        }
    }
}
