//! Application configuration parsed from environment variables.
//!
//! Business logic never reads the environment: `main` parses an
//! [`AppConfig`] once and hands the pieces to the clients it constructs.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CHAT_USER: &str = "user";
pub const DEFAULT_TICKET_USER_ID: &str = "user";
pub const DEV_TICKET_API_BASE_URL: &str = "http://127.0.0.1:5003/api";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {var}")]
    MissingVar { var: String },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingVar { .. } => "E_CONFIG_MISSING",
            Self::Invalid(_) => "E_CONFIG_INVALID",
        }
    }
}

/// How ticket turns are requested from the conversational service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    #[default]
    Blocking,
    Streaming,
}

/// Optional network timeouts. `None` leaves the call unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: Option<u64>,
    pub connect_secs: Option<u64>,
}

impl Timeouts {
    /// Build a reqwest client, applying only the timeouts that are set.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the TLS backend cannot be initialised.
    pub fn http_client(self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.request_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.connect_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// Conversational API endpoint and credential. Also the proxy target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub user: String,
    pub response_mode: ResponseMode,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// `None` when the base URL or key is unset; chat features then fail per request.
    pub chat: Option<ChatConfig>,
    pub ticket_api_base_url: String,
    pub ticket_user_id: String,
    pub record_workflow_steps: bool,
    pub timeouts: Timeouts,
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// Required:
    /// - `TICKET_API_BASE_URL` (unless `APP_ENV=development`)
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `CHAT_API_BASE_URL` + `CHAT_API_KEY`: chat disabled when either is absent
    /// - `CHAT_USER`: default `user`
    /// - `CHAT_RESPONSE_MODE`: `blocking` (default) or `streaming`
    /// - `HTTP_REQUEST_TIMEOUT_SECS`, `HTTP_CONNECT_TIMEOUT_SECS`: unset means no timeout
    /// - `TICKET_USER_ID`: default `user`
    /// - `RECORD_WORKFLOW_STEPS`: default false
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a required value is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_number(get("PORT"), "PORT")?.unwrap_or(DEFAULT_PORT);
        let timeouts = Timeouts {
            request_secs: parse_number(get("HTTP_REQUEST_TIMEOUT_SECS"), "HTTP_REQUEST_TIMEOUT_SECS")?,
            connect_secs: parse_number(get("HTTP_CONNECT_TIMEOUT_SECS"), "HTTP_CONNECT_TIMEOUT_SECS")?,
        };
        let response_mode = parse_response_mode(get("CHAT_RESPONSE_MODE").as_deref())?;

        let chat = match (get("CHAT_API_BASE_URL"), get("CHAT_API_KEY")) {
            (Some(base_url), Some(api_key)) => Some(ChatConfig {
                base_url: trim_base_url(&base_url),
                api_key,
                user: get("CHAT_USER").unwrap_or_else(|| DEFAULT_CHAT_USER.to_string()),
                response_mode,
                timeouts,
            }),
            _ => None,
        };

        let development = get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("development"));
        let ticket_api_base_url = match get("TICKET_API_BASE_URL") {
            Some(url) => trim_base_url(&url),
            None if development => DEV_TICKET_API_BASE_URL.to_string(),
            None => return Err(ConfigError::MissingVar { var: "TICKET_API_BASE_URL".into() }),
        };

        let record_workflow_steps = parse_bool(get("RECORD_WORKFLOW_STEPS").as_deref(), "RECORD_WORKFLOW_STEPS")?;

        Ok(Self {
            port,
            chat,
            ticket_api_base_url,
            ticket_user_id: get("TICKET_USER_ID").unwrap_or_else(|| DEFAULT_TICKET_USER_ID.to_string()),
            record_workflow_steps,
            timeouts,
        })
    }
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_number<T: std::str::FromStr>(raw: Option<String>, key: &str) -> Result<Option<T>, ConfigError> {
    raw.map(|v| {
        v.parse::<T>()
            .map_err(|_| ConfigError::Invalid(format!("{key} must be a number, got '{v}'")))
    })
    .transpose()
}

fn parse_bool(raw: Option<&str>, key: &str) -> Result<bool, ConfigError> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None | Some("false" | "0" | "no") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some(other) => Err(ConfigError::Invalid(format!("{key} must be true or false, got '{other}'"))),
    }
}

fn parse_response_mode(raw: Option<&str>) -> Result<ResponseMode, ConfigError> {
    match raw.unwrap_or("blocking") {
        "blocking" => Ok(ResponseMode::Blocking),
        "streaming" => Ok(ResponseMode::Streaming),
        other => Err(ConfigError::Invalid(format!(
            "unsupported CHAT_RESPONSE_MODE '{other}' (expected 'blocking' or 'streaming')"
        ))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
