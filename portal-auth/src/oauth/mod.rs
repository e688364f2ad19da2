//! OAuth 2.0 authentication infrastructure.
//!
//! Provides the authorization code flow with PKCE security for portal logins.

mod authorize;
mod config;
mod flow;
mod pkce;
mod session;
mod state;
mod user_info;

pub mod token;

pub use authorize::AuthorizationUrlBuilder;
pub use config::{ProviderConfig, DEFAULT_SCOPES};
pub use flow::{LoginFlow, LoginOutcome, LoginRedirect};
pub use pkce::{PkceChallenge, PkcePair, PkceVerifier};
pub use session::{SessionBinder, SessionHandle};
pub use state::{CsrfToken, FlowState, StateStore, DEFAULT_STATE_TTL_SECS};
pub use token::{TokenExchanger, TokenSet};
pub use user_info::{UserIdentity, UserInfoFetcher};
