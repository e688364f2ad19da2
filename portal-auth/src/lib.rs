//! # portal-auth
//!
//! OAuth 2.0 Authorization Code + PKCE login for the captive portal:
//! - PKCE verifier/challenge and CSRF token generation
//! - Ephemeral, single-use login state with expiry
//! - Authorization URL construction
//! - Token exchange, refresh and revocation against the identity provider
//! - User info resolution
//! - A `SessionBinder` seam handing the authenticated identity to the caller's session layer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portal_auth::oauth::{LoginFlow, ProviderConfig, StateStore};
//!
//! let flow = LoginFlow::new(provider_config, StateStore::default())?;
//! let redirect = flow.begin_login();
//! // ... browser goes to redirect.url, provider calls back with code + state ...
//! let outcome = flow.complete_login(&code, &state, &binder).await?;
//! ```

pub mod clock;
pub mod error;
pub mod http;
pub mod oauth;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
