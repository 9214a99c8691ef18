//! Access token acquisition for the robot API.
//!
//! The query client only needs "a fresh bearer token" and asks its
//! [`TokenProvider`] for one at construction and on every reauthentication.

use std::fmt::{self, Debug};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthError;

pub mod client_credentials;
pub mod mock;
pub mod static_token;

pub use client_credentials::{ClientCredentials, ClientCredentialsConfig};
pub use mock::MockTokenProvider;
pub use static_token::StaticToken;

/// A bearer token plus its expiry when the issuer told us.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into(), expires_at: None }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.secret)
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of short-lived access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync + Debug {
    async fn access_token(&self) -> Result<AccessToken, AuthError>;
}
