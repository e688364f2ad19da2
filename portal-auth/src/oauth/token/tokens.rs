//! OAuth token types.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;

/// Tokens issued by the provider for one authenticated user.
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Access token for API requests.
    pub access_token: SecretString,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: Option<SecretString>,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Lifetime in seconds as reported by the provider.
    pub expires_in: Option<i64>,
    /// When the provider handed out these tokens.
    pub obtained_at: DateTime<Utc>,
}

/// Access tokens this close to expiry are treated as expired.
const EXPIRY_LEEWAY_SECS: i64 = 5 * 60;

impl TokenSet {
    /// When the access token expires, if the provider said.
    ///
    /// A lifetime too large to represent is treated as no expiry.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = Duration::try_seconds(self.expires_in?)?;
        self.obtained_at.checked_add_signed(lifetime)
    }

    /// Check if the access token is expired at `now`, or will expire within 5 minutes.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at()
            .map(|expires| {
                expires
                    .checked_sub_signed(Duration::seconds(EXPIRY_LEEWAY_SECS))
                    .map_or(true, |refresh_after| refresh_after <= now)
            })
            .unwrap_or(false)
    }
}
