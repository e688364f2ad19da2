//! Error types for the `portal-auth` crate.
//!
//! Follows the platform pattern of a root Error struct holding a tree of error kind enums.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for portal-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in portal-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    OAuth(OAuthErrorKind),
    Session(SessionErrorKind),
    Http(HttpErrorKind),
    Config,
}

/// Errors from the login flow against the identity provider.
#[derive(Debug, PartialEq)]
pub enum OAuthErrorKind {
    /// Unknown, replayed or expired CSRF state. The user must restart login.
    InvalidOrExpiredState,
    /// The provider rejected the grant (code/verifier pair or refresh token).
    TokenExchangeFailed { reason: String },
    /// The user-info endpoint failed or returned an unusable body.
    UserInfoFetchFailed,
    /// Transport failure or timeout talking to the provider.
    Network,
}

/// Errors raised by a `SessionBinder` implementation.
#[derive(Debug, PartialEq)]
pub enum SessionErrorKind {
    BindingFailed,
}

/// Errors from setting up the HTTP client.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
}

impl Error {
    /// Returns true when the failure only dooms the current login attempt and the
    /// user should be sent back to start a fresh one. False means a configuration
    /// or server-side problem that retrying will not fix.
    pub fn is_restartable(&self) -> bool {
        match &self.error_kind {
            ErrorKind::OAuth(_) => true,
            ErrorKind::Http(_) | ErrorKind::Session(_) | ErrorKind::Config => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed { reason }) => {
                write!(f, "OAuth error: token exchange failed ({reason})")
            }
            ErrorKind::OAuth(kind) => write!(f, "OAuth error: {:?}", kind),
            ErrorKind::Session(kind) => write!(f, "Session error: {:?}", kind),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
            ErrorKind::Config => write!(f, "Configuration error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else {
            ErrorKind::OAuth(OAuthErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

/// Helper function to create OAuth errors.
pub fn oauth_error(kind: OAuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::OAuth(kind),
    }
}

/// Helper function to create a `TokenExchangeFailed` error carrying the provider's reason.
pub fn token_exchange_error(reason: impl Into<String>) -> Error {
    let reason = reason.into();
    Error {
        source: Some(reason.clone().into()),
        error_kind: ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed { reason }),
    }
}

/// Helper function to wrap a transport failure as an OAuth network error.
pub fn network_error(err: reqwest::Error) -> Error {
    Error {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::OAuth(OAuthErrorKind::Network),
    }
}

/// Helper function to create session binding errors.
pub fn session_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Session(SessionErrorKind::BindingFailed),
    }
}

/// Helper function to create configuration errors.
pub fn config_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config,
    }
}
