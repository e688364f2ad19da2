use crate::controller::ApiResponse;
use crate::error::{Error as WebError, Result as WebResult, WebErrorKind};
use crate::session_binder::{SessionTokens, IDENTITY_KEY, TOKENS_KEY};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use log::*;
use portal_auth::error::{ErrorKind, OAuthErrorKind};
use portal_auth::oauth::{TokenSet, UserIdentity};
use tower_sessions::Session;

/// Returns the identity bound to the current session.
///
/// Provider tokens close to expiry are refreshed on the way. A session whose
/// refresh token the provider rejects is destroyed.
///
/// Test this with curl: curl -v \
/// --header "Cookie: id=07bbbe54-bd35-425f-8e63-618a8d8612df" \
/// --request GET http://localhost:4000/me
pub async fn me(State(app_state): State<AppState>, session: Session) -> WebResult<impl IntoResponse> {
    let identity: UserIdentity = session
        .get(IDENTITY_KEY)
        .await?
        .ok_or(WebError::Web(WebErrorKind::Unauthenticated))?;

    let tokens: Option<SessionTokens> = session.get(TOKENS_KEY).await?;
    if let Some(tokens) = tokens {
        match app_state
            .login_flow
            .refresh_if_expired(&TokenSet::from(tokens))
            .await
        {
            Ok(Some(refreshed)) => {
                debug!("Refreshed provider tokens for user {}", identity.id);
                session
                    .insert(TOKENS_KEY, SessionTokens::from(refreshed))
                    .await?;
            }
            Ok(None) => {}
            Err(e) if matches!(
                e.error_kind,
                ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed { .. })
            ) =>
            {
                warn!("Provider rejected the refresh token, ending session: {e}");
                session.flush().await?;
                return Err(WebError::Web(WebErrorKind::Unauthenticated));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), identity)))
}

/// Logs the user out of the portal.
///
/// Revoking the provider tokens is best effort. The session is always destroyed.
pub async fn logout(
    State(app_state): State<AppState>,
    session: Session,
) -> WebResult<impl IntoResponse> {
    trace!("UserSessionController::logout()");

    let tokens: Option<SessionTokens> = session.get(TOKENS_KEY).await?;
    if let Some(tokens) = tokens {
        revoke_best_effort(&app_state, "access", &tokens.access_token).await;
        if let Some(refresh_token) = &tokens.refresh_token {
            revoke_best_effort(&app_state, "refresh", refresh_token).await;
        }
    }

    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_best_effort(app_state: &AppState, kind: &str, token: &str) {
    match app_state.login_flow.logout(token).await {
        Ok(true) => debug!("Provider revoked the {kind} token"),
        Ok(false) => warn!("Provider declined to revoke the {kind} token"),
        Err(e) => warn!("Revoking the {kind} token failed: {e}"),
    }
}
