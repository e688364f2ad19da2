//! CSRF state management for OAuth flows.
//!
//! Each in-flight login attempt is tracked by a random CSRF token that maps to the
//! PKCE verifier and redirect URI the attempt was started with. Entries are
//! single-use: [`StateStore::consume`] removes the entry whatever happens next.

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::{rngs::OsRng, RngCore};
use tokio::task::JoinHandle;
use tracing::debug;

use super::pkce::PkceVerifier;
use crate::clock::{Clock, SystemClock};
use crate::error::{oauth_error, Error, OAuthErrorKind};

/// Default lifetime of an in-flight login attempt.
pub const DEFAULT_STATE_TTL_SECS: i64 = 600;

/// Opaque CSRF token round-tripped through the provider as `state`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Generate a cryptographically random state token (256 bits, hex encoded).
    pub fn generate() -> Self {
        let mut random_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut random_bytes);
        Self(hex::encode(random_bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State data stored during one OAuth login attempt.
#[derive(Debug, Clone)]
pub struct FlowState {
    pub csrf_token: String,
    /// PKCE verifier whose challenge went out in the authorization URL.
    pub verifier: PkceVerifier,
    pub created_at: DateTime<Utc>,
    /// Redirect URI sent with the authorization request; the token request must repeat it.
    pub redirect_uri: String,
}

impl FlowState {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }
}

/// Store for in-flight login state with expiration.
///
/// Cheap to clone; clones share the same underlying map. Construct one per
/// process (or per test) and inject it where it is needed.
#[derive(Clone)]
pub struct StateStore {
    states: Arc<DashMap<String, FlowState>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl StateStore {
    /// Create a state store with a custom TTL and time source.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            ttl,
            clock,
        }
    }

    /// Create a state store on the system clock with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// Time source shared with the rest of the login flow.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Record the state of a new login attempt. An existing entry under the same
    /// token is replaced.
    pub fn put(&self, csrf_token: &str, verifier: PkceVerifier, redirect_uri: &str) {
        let data = FlowState {
            csrf_token: csrf_token.to_string(),
            verifier,
            created_at: self.clock.now(),
            redirect_uri: redirect_uri.to_string(),
        };

        self.states.insert(csrf_token.to_string(), data);
    }

    /// Validate and consume a state token.
    ///
    /// The entry is removed atomically, so of several concurrent callers presenting
    /// the same token at most one receives the state.
    ///
    /// # Errors
    ///
    /// `InvalidOrExpiredState` if the token is unknown, already consumed, or older
    /// than the TTL.
    pub fn consume(&self, csrf_token: &str) -> Result<FlowState, Error> {
        let (_, data) = self.states.remove(csrf_token).ok_or_else(|| {
            oauth_error(
                OAuthErrorKind::InvalidOrExpiredState,
                "Unknown or already used login state",
            )
        })?;

        if data.is_expired(self.clock.now(), self.ttl) {
            debug!("Discarding expired login state");
            return Err(oauth_error(
                OAuthErrorKind::InvalidOrExpiredState,
                "Login state expired",
            ));
        }

        Ok(data)
    }

    /// Remove expired states, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.states.len();
        self.states.retain(|_, data| !data.is_expired(now, self.ttl));
        before.saturating_sub(self.states.len())
    }

    /// Periodically purge expired states on the current tokio runtime.
    pub fn spawn_purge_task(&self, every: StdDuration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!("Purged {} expired login states", purged);
                }
            }
        })
    }

    /// Number of entries physically held, expired ones included.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_STATE_TTL_SECS))
    }
}
