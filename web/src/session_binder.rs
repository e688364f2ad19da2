//! Binds a completed OAuth login to the browser's tower-sessions session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use portal_auth::error::{session_error, Error as AuthError};
use portal_auth::oauth::{SessionBinder, SessionHandle, TokenSet, UserIdentity};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

pub(crate) const IDENTITY_KEY: &str = "portal.identity";
pub(crate) const TOKENS_KEY: &str = "portal.tokens";

/// Provider tokens as kept in the server-side session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub obtained_at: DateTime<Utc>,
}

impl From<TokenSet> for SessionTokens {
    fn from(tokens: TokenSet) -> Self {
        Self {
            access_token: tokens.access_token.expose_secret().to_string(),
            refresh_token: tokens
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            obtained_at: tokens.obtained_at,
        }
    }
}

impl From<SessionTokens> for TokenSet {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: SecretString::new(tokens.access_token),
            refresh_token: tokens.refresh_token.map(SecretString::new),
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            obtained_at: tokens.obtained_at,
        }
    }
}

pub struct TowerSessionBinder {
    session: Session,
}

impl TowerSessionBinder {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl SessionBinder for TowerSessionBinder {
    async fn on_authenticated(
        &self,
        identity: &UserIdentity,
        tokens: TokenSet,
    ) -> Result<SessionHandle, AuthError> {
        // New id on privilege change
        self.session.cycle_id().await.map_err(|e| {
            warn!("Failed to cycle session id: {e:?}");
            session_error("failed to cycle session id")
        })?;

        self.session
            .insert(IDENTITY_KEY, identity)
            .await
            .map_err(|e| {
                warn!("Failed to store identity in session: {e:?}");
                session_error("failed to store identity")
            })?;
        self.session
            .insert(TOKENS_KEY, SessionTokens::from(tokens))
            .await
            .map_err(|e| {
                warn!("Failed to store tokens in session: {e:?}");
                session_error("failed to store tokens")
            })?;

        self.session.save().await.map_err(|e| {
            warn!("Failed to save session: {e:?}");
            session_error("failed to save session")
        })?;

        let id = self
            .session
            .id()
            .ok_or_else(|| session_error("session has no id after save"))?;

        Ok(SessionHandle::new(id.to_string()))
    }
}
