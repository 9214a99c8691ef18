use async_trait::async_trait;

use super::{AccessToken, TokenProvider};
use crate::config::KeyFromEnv;
use crate::error::AuthError;

/// Hands out the same pre-issued token every time.
///
/// Reauthentication with a static token rebuilds the session with the same
/// credentials, so a rejected token still fails after the single retry.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl KeyFromEnv for StaticToken {
    const KEY_NAME: &'static str = "ROBOT_API_TOKEN";
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        Ok(AccessToken::new(self.token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_configured_token() {
        let provider = StaticToken::new("fixed");
        let token = provider.access_token().await.unwrap();
        assert_eq!(token.secret(), "fixed");
        assert_eq!(token.expires_at(), None);
    }
}
