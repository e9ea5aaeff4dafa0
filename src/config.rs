//! Service configuration, read once at startup and passed to the HTTP layer.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TOKEN_PATH: &str = "/oauth/token";
const DEFAULT_PORTFOLIO_PATH: &str = "/portfolio";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Remote trading API the proxy endpoints forward to.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub base_url: String,
    pub token_path: String,
    pub portfolio_path: String,
    /// Sent upstream as `X-API-Code` when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Raw JSON served by `/accounts`.
    pub accounts: Option<String>,
    pub broker: Option<BrokerConfig>,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            accounts: None,
            broker: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let broker = match get("BROKER_BASE_URL") {
            None => None,
            Some(base_url) => Some(BrokerConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                token_path: get("BROKER_TOKEN_PATH").unwrap_or_else(|| DEFAULT_TOKEN_PATH.into()),
                portfolio_path: get("BROKER_PORTFOLIO_PATH")
                    .unwrap_or_else(|| DEFAULT_PORTFOLIO_PATH.into()),
                api_key: get("BROKER_API_KEY"),
                timeout: Duration::from_secs(parse_or(
                    "BROKER_TIMEOUT_SECS",
                    get("BROKER_TIMEOUT_SECS"),
                    DEFAULT_TIMEOUT_SECS,
                )?),
            }),
        };

        Ok(Self {
            host: get("API_HOST").unwrap_or_else(|| DEFAULT_HOST.into()),
            port: parse_or("API_PORT", get("API_PORT"), DEFAULT_PORT)?,
            accounts: get("ACCOUNTS"),
            broker,
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                get("MAX_UPLOAD_BYTES"),
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "API_HOST",
                value: self.host.clone(),
            })
    }
}
