//! Controller for the portal's OAuth login.
//!
//! Both endpoints are reached through browser redirects, so they take no
//! custom headers and answer with redirects rather than JSON.

use crate::error::WebErrorKind;
use crate::session_binder::TowerSessionBinder;
use crate::{AppState, Error};

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect};
use log::*;
use serde::Deserialize;
use tower_sessions::Session;

/// Query parameters the provider appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /login
///
/// Starts a login attempt and sends the browser to the provider's authorize endpoint.
pub async fn login(State(app_state): State<AppState>) -> impl IntoResponse {
    let redirect = app_state.login_flow.begin_login();
    Redirect::to(&redirect.url)
}

/// GET /oauth/callback
///
/// Completes the login started by `/login`, binds the user to this browser's
/// session, then redirects to the post-login page.
pub async fn callback(
    State(app_state): State<AppState>,
    session: Session,
    Query(params): Query<OAuthCallback>,
) -> Result<impl IntoResponse, Error> {
    if let Some(error) = &params.error {
        warn!(
            "Provider denied the login: {error} ({})",
            params.error_description.as_deref().unwrap_or("no description")
        );
        // Abandoned attempts must not leave a usable state behind.
        if let Some(state) = params.state.as_deref() {
            let _ = app_state.login_flow.state_store().consume(state);
        }
        return Err(Error::Web(WebErrorKind::Input));
    }

    let (Some(code), Some(state)) = (params.code.as_deref(), params.state.as_deref()) else {
        return Err(Error::Web(WebErrorKind::Input));
    };

    let binder = TowerSessionBinder::new(session);
    let outcome = app_state
        .login_flow
        .complete_login(code, state, &binder)
        .await?;

    debug!("Bound user {} to session {}", outcome.identity.id, outcome.session);
    Ok(Redirect::to(&app_state.config.post_login_redirect_url))
}
