use std::env;
use std::time::Duration;

use tracing::debug;

use crate::auth::{ClientCredentials, ClientCredentialsConfig, StaticToken, TokenProvider};
use crate::error::ConfigError;

pub const API_URL_VAR: &str = "ROBOT_API_URL";
pub const AUTH_URL_VAR: &str = "ROBOT_AUTH_URL";
pub const AUTH_CLIENT_ID_VAR: &str = "ROBOT_AUTH_CLIENT_ID";
pub const AUTH_SCOPE_VAR: &str = "ROBOT_AUTH_SCOPE";
pub const AUTH_AUDIENCE_VAR: &str = "ROBOT_AUTH_AUDIENCE";
pub const TIMEOUT_VAR: &str = "ROBOT_API_TIMEOUT_SECS";

/// Trait for credential sources that read their secret from an environment variable
pub trait KeyFromEnv {
    /// The environment variable holding the secret
    const KEY_NAME: &'static str;

    /// Find the secret through an environment lookup. Blank values count as missing.
    fn find_key_with<F>(lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(Self::KEY_NAME).filter(|value| !value.trim().is_empty())
    }
}

/// How the client obtains its bearer token.
#[derive(Debug, Clone)]
pub enum CredentialSettings {
    /// A pre-issued token, used as is.
    Static(String),
    /// OAuth2 client credentials grant.
    ClientCredentials(ClientCredentialsConfig),
}

impl CredentialSettings {
    pub fn provider(&self) -> Box<dyn TokenProvider> {
        match self {
            Self::Static(token) => Box::new(StaticToken::new(token.clone())),
            Self::ClientCredentials(config) => Box::new(ClientCredentials::new(config.clone())),
        }
    }
}

/// Connection settings for the robot API.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub credentials: CredentialSettings,
    /// Request timeout handed to the HTTP client. `None` keeps reqwest's default.
    pub timeout: Option<Duration>,
}

impl Settings {
    /// Load settings from the environment, reading `.env` when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from any name -> value lookup.
    ///
    /// A static token (`ROBOT_API_TOKEN`) wins over client credentials when both are set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_url = get(API_URL_VAR).ok_or(ConfigError::Missing(API_URL_VAR))?;
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: API_URL_VAR,
                reason: format!("expected an http(s) URL, got '{api_url}'"),
            });
        }

        let credentials = if let Some(token) = StaticToken::find_key_with(&lookup) {
            debug!("Using static access token");
            CredentialSettings::Static(token)
        } else {
            let token_url = get(AUTH_URL_VAR).ok_or(ConfigError::Missing(AUTH_URL_VAR))?;
            let client_id = get(AUTH_CLIENT_ID_VAR).ok_or(ConfigError::Missing(AUTH_CLIENT_ID_VAR))?;
            let client_secret = ClientCredentials::find_key_with(&lookup)
                .ok_or(ConfigError::Missing(ClientCredentials::KEY_NAME))?;
            debug!(token_url = %token_url, "Using client credentials grant");
            CredentialSettings::ClientCredentials(ClientCredentialsConfig {
                token_url,
                client_id,
                client_secret,
                scope: get(AUTH_SCOPE_VAR),
                audience: get(AUTH_AUDIENCE_VAR),
            })
        };

        let timeout = match get(TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: TIMEOUT_VAR,
                    reason: format!("'{raw}' is not a whole number of seconds"),
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self { api_url, credentials, timeout })
    }
}
