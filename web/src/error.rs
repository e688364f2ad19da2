use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use portal_auth::error::{Error as AuthError, ErrorKind, OAuthErrorKind};

extern crate log;
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Auth(AuthError),
    Web(WebErrorKind),
}

/// Failures that originate in the web layer itself.
#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// Missing or malformed request parameters.
    Input,
    /// No authenticated portal session.
    Unauthenticated,
    /// The session store could not be read or written.
    Session,
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Auth(auth_error) => match &auth_error.error_kind {
                ErrorKind::OAuth(oauth_error_kind) => match oauth_error_kind {
                    OAuthErrorKind::InvalidOrExpiredState => StatusCode::UNAUTHORIZED,
                    OAuthErrorKind::TokenExchangeFailed { .. } => StatusCode::UNAUTHORIZED,
                    OAuthErrorKind::UserInfoFetchFailed => StatusCode::BAD_GATEWAY,
                    OAuthErrorKind::Network => StatusCode::BAD_GATEWAY,
                },
                ErrorKind::Http(_) => StatusCode::BAD_GATEWAY,
                ErrorKind::Session(_) | ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Web(web_error_kind) => match web_error_kind {
                WebErrorKind::Input => StatusCode::BAD_REQUEST,
                WebErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                WebErrorKind::Session => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        } else {
            debug!("Request rejected: {self}");
        }

        let reason = status.canonical_reason().unwrap_or("ERROR").to_uppercase();
        (status, reason).into_response()
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Auth(err)
    }
}

impl From<tower_sessions::session::Error> for Error {
    fn from(err: tower_sessions::session::Error) -> Self {
        warn!("Session store error: {err:?}");
        Error::Web(WebErrorKind::Session)
    }
}
