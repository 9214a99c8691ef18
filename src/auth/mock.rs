use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{AccessToken, TokenProvider};
use crate::error::AuthError;

/// Scripted token provider for tests.
///
/// Issues the configured tokens in order and keeps repeating the last one.
/// Clones share the call counter, so a test can keep a handle after moving
/// the provider into a client.
#[derive(Debug, Clone)]
pub struct MockTokenProvider {
    tokens: Arc<Vec<String>>,
    fail_from: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl MockTokenProvider {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: Arc::new(tokens.into_iter().map(Into::into).collect()),
            fail_from: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A provider that never produces a token.
    pub fn failing() -> Self {
        Self::new(Vec::<String>::new()).fail_after(0)
    }

    /// Fail every call after the first `successes` calls.
    pub fn fail_after(mut self, successes: usize) -> Self {
        self.fail_from = Some(successes);
        self
    }

    /// Number of tokens requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_from.is_some_and(|limit| call >= limit) {
            return Err(AuthError::Http("mock token endpoint unavailable".to_string()));
        }
        let token = self
            .tokens
            .get(call)
            .or_else(|| self.tokens.last())
            .ok_or_else(|| AuthError::MalformedResponse("mock has no tokens".to_string()))?;
        Ok(AccessToken::new(token.clone()))
    }
}
