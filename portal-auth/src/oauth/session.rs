//! Handoff from a completed login to the caller's session layer.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::token::TokenSet;
use super::user_info::UserIdentity;
use crate::error::Error;

/// Opaque reference to the session a login was bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for binding an authenticated identity to a caller session.
///
/// How the session is issued and persisted (cookies, a session store) is up to
/// the implementation. Implementations report failures as
/// `ErrorKind::Session(SessionErrorKind::BindingFailed)`, e.g. through
/// [`crate::error::session_error`].
#[async_trait]
pub trait SessionBinder: Send + Sync {
    /// Called exactly once per successful login, after the identity is resolved.
    ///
    /// Ownership of the tokens passes to the binder.
    async fn on_authenticated(
        &self,
        identity: &UserIdentity,
        tokens: TokenSet,
    ) -> Result<SessionHandle, Error>;
}
