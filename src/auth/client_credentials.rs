use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

use super::{AccessToken, TokenProvider};
use crate::config::KeyFromEnv;
use crate::error::AuthError;

/// Settings for the OAuth2 client credentials grant
#[derive(Clone)]
pub struct ClientCredentialsConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
    pub audience: Option<String>,
}

impl std::fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Fetches tokens from an OAuth2 token endpoint with `grant_type=client_credentials`.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    config: ClientCredentialsConfig,
    client: Client,
}

impl KeyFromEnv for ClientCredentials {
    const KEY_NAME: &'static str = "ROBOT_AUTH_CLIENT_SECRET";
}

impl ClientCredentials {
    pub fn new(config: ClientCredentialsConfig) -> Self {
        info!(token_url = %config.token_url, client_id = %config.client_id, "Creating client credentials provider");
        Self { config, client: Client::new() }
    }

    fn form(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if let Some(scope) = &self.config.scope {
            params.push(("scope", scope.as_str()));
        }
        if let Some(audience) = &self.config.audience {
            params.push(("audience", audience.as_str()));
        }
        params
    }
}

#[async_trait]
impl TokenProvider for ClientCredentials {
    #[instrument(skip(self), fields(token_url = %self.config.token_url))]
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        debug!("Requesting access token");
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&self.form())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Token request failed");
                AuthError::Http(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, body = %body, "Token endpoint rejected the request");
            return Err(AuthError::Rejected { status: status.as_u16(), body });
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse token response JSON");
            AuthError::MalformedResponse(e.to_string())
        })?;

        if let Some(kind) = &token.token_type {
            if !kind.eq_ignore_ascii_case("bearer") {
                error!(token_type = %kind, "Token endpoint issued a non-bearer token");
                return Err(AuthError::MalformedResponse(format!("unsupported token type '{kind}'")));
            }
        }
        if token.access_token.is_empty() {
            return Err(AuthError::MalformedResponse("empty access_token".to_string()));
        }

        let mut access = AccessToken::new(token.access_token);
        if let Some(expires_at) = token
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| Utc::now().checked_add_signed(delta))
        {
            access = access.with_expiry(expires_at);
        }

        info!(expires_at = ?access.expires_at(), "Obtained access token");
        Ok(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(scope: Option<&str>) -> ClientCredentialsConfig {
        ClientCredentialsConfig {
            token_url: "https://login.example.com/token".to_string(),
            client_id: "fleet".to_string(),
            client_secret: "s3cret".to_string(),
            scope: scope.map(str::to_string),
            audience: None,
        }
    }

    #[test]
    fn form_includes_optional_scope() {
        let provider = ClientCredentials::new(config(Some("robots.read")));
        let form = provider.form();
        assert!(form.contains(&("grant_type", "client_credentials")));
        assert!(form.contains(&("scope", "robots.read")));
        assert!(!form.iter().any(|(k, _)| *k == "audience"));
    }

    #[test]
    fn debug_redacts_client_secret() {
        let rendered = format!("{:?}", config(None));
        assert!(!rendered.contains("s3cret"));
    }
}
