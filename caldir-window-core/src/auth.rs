//! Authentication collaborator consumed by the sync engine.
//!
//! Token refresh itself lives outside the core. The engine only asks whether
//! someone is signed in and for a fresh token right before each fetch.

use std::fmt;

use async_trait::async_trait;

/// Snapshot of the signed-in state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub signed_in: bool,
    /// Account identifier (e.g., email), when the provider has one
    pub account: Option<String>,
}

impl AuthState {
    pub fn signed_in(account: Option<String>) -> Self {
        AuthState {
            signed_in: true,
            account,
        }
    }

    pub fn signed_out() -> Self {
        AuthState::default()
    }
}

/// An access token handed to the remote for one fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Token(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

#[async_trait]
pub trait Auth: Send + Sync {
    /// Consulted before scheduling anything at all.
    fn current_auth_state(&self) -> AuthState;

    /// A token valid for an immediate request, or `None` if one is not
    /// available right now. May fail transiently while a refresh is racing.
    async fn fresh_token(&self) -> Option<Token>;
}
