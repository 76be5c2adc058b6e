use crate::backend::BackendConfig;
use crate::ui::theme::ThemePreference;
use clap::Parser;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid endpoint '{url}': {reason}")] InvalidEndpoint {
        url: String,
        reason: String,
    },
    #[error("request timeout must be at least one second")]
    InvalidTimeout,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Backend Args ---
    /// URL of the chat backend that answers POSTed messages
    #[arg(long, env = "CHAT_ENDPOINT", default_value = "http://127.0.0.1:5001/")]
    pub endpoint: String,

    /// Seconds to wait for a reply before giving up on a request
    #[arg(long, env = "CHAT_REQUEST_TIMEOUT_SECS", default_value = "120")]
    pub request_timeout_secs: u64,

    // --- Conversation Args ---
    /// Send blank messages instead of ignoring them
    #[arg(long, env = "CHAT_ALLOW_BLANK", default_value = "false")]
    pub allow_blank: bool,

    /// Ask a single question, print the reply and exit
    #[arg(short = 'q', long)]
    pub query: Option<String>,

    // --- Display Args ---
    /// Colour theme (system, light, dark)
    #[arg(long, env = "CHAT_THEME", value_enum, default_value = "system")]
    pub theme: ThemePreference,

    /// Disable colours and text styling
    #[arg(long, env = "CHAT_PLAIN", default_value = "false")]
    pub plain: bool,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    pub allow_blank: bool,
    pub query: Option<String>,
    pub theme: ThemePreference,
    pub plain: bool,
}

impl TryFrom<&Args> for ClientConfig {
    type Error = ConfigError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let endpoint = url::Url
            ::parse(&args.endpoint)
            .map_err(|e| ConfigError::InvalidEndpoint {
                url: args.endpoint.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                url: args.endpoint.clone(),
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }
        if args.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(Self {
            backend: BackendConfig {
                endpoint,
                request_timeout: Duration::from_secs(args.request_timeout_secs),
            },
            allow_blank: args.allow_blank,
            query: args.query.clone(),
            theme: args.theme,
            plain: args.plain,
        })
    }
}
