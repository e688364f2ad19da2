//! Login flow orchestration.
//!
//! Ties the PKCE, state, authorization URL, token and user-info components into
//! the two request-driven steps of a login: starting it and completing the
//! provider callback.

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use super::authorize::AuthorizationUrlBuilder;
use super::config::ProviderConfig;
use super::pkce::PkcePair;
use super::session::{SessionBinder, SessionHandle};
use super::state::{CsrfToken, StateStore};
use super::token::{TokenExchanger, TokenSet};
use super::user_info::{UserIdentity, UserInfoFetcher};
use crate::clock::Clock;
use crate::error::{Error, ErrorKind, SessionErrorKind};
use crate::http::ProviderClientBuilder;

/// Where to send the browser to start a login.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub url: String,
    pub csrf_token: CsrfToken,
}

/// Result of a completed login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: UserIdentity,
    pub session: SessionHandle,
}

/// OAuth 2.0 authorization code flow with PKCE against a single provider.
#[derive(Clone)]
pub struct LoginFlow {
    redirect_uri: String,
    state_store: StateStore,
    url_builder: AuthorizationUrlBuilder,
    exchanger: TokenExchanger,
    user_info: UserInfoFetcher,
}

impl LoginFlow {
    /// # Errors
    ///
    /// * `Config` if the authorize URL is invalid.
    /// * `Http(BuilderFailed)` if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig, state_store: StateStore) -> Result<Self, Error> {
        let http = ProviderClientBuilder::new()
            .with_timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            url_builder: AuthorizationUrlBuilder::from_config(&config)?,
            exchanger: TokenExchanger::new(http.clone(), &config, state_store.clock()),
            user_info: UserInfoFetcher::new(http, &config),
            redirect_uri: config.redirect_uri,
            state_store,
        })
    }

    pub fn state_store(&self) -> &StateStore {
        &self.state_store
    }

    /// Start a login attempt with a fresh verifier and CSRF token.
    pub fn begin_login(&self) -> LoginRedirect {
        self.begin_login_with(PkcePair::generate(), CsrfToken::generate())
    }

    fn begin_login_with(&self, pkce: PkcePair, csrf_token: CsrfToken) -> LoginRedirect {
        self.state_store
            .put(csrf_token.as_str(), pkce.verifier, &self.redirect_uri);

        let url = self.url_builder.build_login_url(
            &self.redirect_uri,
            csrf_token.as_str(),
            pkce.challenge.as_str(),
        );

        debug!("Started OAuth login attempt");
        LoginRedirect { url, csrf_token }
    }

    /// Complete a login from the provider's callback parameters.
    ///
    /// The state is consumed before anything else, so a callback can never be
    /// replayed even when a later step fails. On success `binder` is invoked
    /// exactly once.
    pub async fn complete_login(
        &self,
        code: &str,
        state: &str,
        binder: &dyn SessionBinder,
    ) -> Result<LoginOutcome, Error> {
        let flow_state = self.state_store.consume(state).map_err(|e| {
            warn!("OAuth callback presented an invalid or expired state");
            e
        })?;

        let tokens = self
            .exchanger
            .exchange_code(code, &flow_state.redirect_uri, &flow_state.verifier)
            .await?;

        let identity = self
            .user_info
            .fetch_user_info(tokens.access_token.expose_secret(), &tokens.token_type)
            .await?;

        let session = binder
            .on_authenticated(&identity, tokens)
            .await
            .map_err(|e| match e.error_kind {
                ErrorKind::Session(_) => e,
                _ => Error {
                    source: Some(Box::new(e)),
                    error_kind: ErrorKind::Session(SessionErrorKind::BindingFailed),
                },
            })?;

        info!("OAuth login completed for user {}", identity.id);
        Ok(LoginOutcome { identity, session })
    }

    /// Obtain new tokens with a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, Error> {
        self.exchanger.refresh(refresh_token).await
    }

    /// Refresh `tokens` if the access token is expired or about to expire.
    ///
    /// Returns `None` when the tokens are still good, or when they have expired
    /// but carry no refresh token.
    pub async fn refresh_if_expired(&self, tokens: &TokenSet) -> Result<Option<TokenSet>, Error> {
        if !tokens.is_expired(self.state_store.clock().now()) {
            return Ok(None);
        }

        match &tokens.refresh_token {
            Some(refresh_token) => self.refresh(refresh_token.expose_secret()).await.map(Some),
            None => {
                debug!("Access token expired without a refresh token");
                Ok(None)
            }
        }
    }

    /// Revoke a token at the provider. See [`TokenExchanger::revoke`].
    pub async fn logout(&self, token: &str) -> Result<bool, Error> {
        self.exchanger.revoke(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{session_error, OAuthErrorKind};
    use secrecy::SecretString;
    use std::sync::Arc;
    use crate::oauth::pkce::{PkceChallenge, PkceVerifier};
    use async_trait::async_trait;
    use mockito::{Matcher, Server, ServerGuard};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use url::Url;

    #[derive(Default)]
    struct RecordingBinder {
        calls: AtomicUsize,
        identities: Mutex<Vec<UserIdentity>>,
        fail: bool,
    }

    #[async_trait]
    impl SessionBinder for RecordingBinder {
        async fn on_authenticated(
            &self,
            identity: &UserIdentity,
            tokens: TokenSet,
        ) -> Result<SessionHandle, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(session_error("session store unavailable"));
            }
            assert_eq!(tokens.access_token.expose_secret(), "a");
            self.identities.lock().unwrap().push(identity.clone());
            Ok(SessionHandle::new("session-1"))
        }
    }

    fn flow_for(server: &ServerGuard) -> LoginFlow {
        let config = ProviderConfig::new("abc", "shh", &server.url(), "https://portal.example/cb");
        LoginFlow::new(config, StateStore::default()).unwrap()
    }

    fn query_param(url: &str, name: &str) -> String {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    async fn mock_provider(server: &mut ServerGuard, verifier: &str) -> (mockito::Mock, mockito::Mock) {
        let token = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "https://portal.example/cb".into()),
                Matcher::UrlEncoded("code_verifier".into(), verifier.into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"access_token":"a","refresh_token":"b","token_type":"Bearer","expires_in":3600}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let user = server
            .mock("GET", "/api/user")
            .match_header("authorization", "Bearer a")
            .with_status(200)
            .with_body(r#"{"id":"guest-7","email":"guest@example.com"}"#)
            .expect(1)
            .create_async()
            .await;
        (token, user)
    }

    #[tokio::test]
    async fn test_begin_login_url_carries_challenge_of_stored_verifier() {
        let server = Server::new_async().await;
        let flow = flow_for(&server);

        let redirect = flow.begin_login();
        let state = query_param(&redirect.url, "state");
        let challenge = query_param(&redirect.url, "code_challenge");
        assert_eq!(state, redirect.csrf_token.as_str());
        assert_eq!(query_param(&redirect.url, "redirect_uri"), "https://portal.example/cb");

        let stored = flow.state_store().consume(&state).unwrap();
        assert_eq!(stored.verifier.challenge().as_str(), challenge);
        assert!(PkceVerifier::is_valid_grammar(stored.verifier.as_str()));
    }

    #[tokio::test]
    async fn test_full_login_binds_session_once() {
        let mut server = Server::new_async().await;
        let flow = flow_for(&server);

        let pkce = PkcePair::generate();
        let verifier = pkce.verifier.as_str().to_string();
        let expected_challenge = PkceChallenge::from_verifier(&pkce.verifier);
        let (token_mock, user_mock) = mock_provider(&mut server, &verifier).await;

        let redirect = flow.begin_login_with(pkce, CsrfToken::generate());
        assert_eq!(
            query_param(&redirect.url, "code_challenge"),
            expected_challenge.as_str()
        );

        let binder = RecordingBinder::default();
        let outcome = flow
            .complete_login("the-code", redirect.csrf_token.as_str(), &binder)
            .await
            .unwrap();

        assert_eq!(outcome.identity.id, "guest-7");
        assert_eq!(outcome.session, SessionHandle::new("session-1"));
        assert_eq!(binder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(binder.identities.lock().unwrap()[0], outcome.identity);
        assert!(flow.state_store().is_empty());
        token_mock.assert_async().await;
        user_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_replayed_callback_is_rejected() {
        let mut server = Server::new_async().await;
        let flow = flow_for(&server);
        let pkce = PkcePair::generate();
        let verifier = pkce.verifier.as_str().to_string();
        let _mocks = mock_provider(&mut server, &verifier).await;

        let redirect = flow.begin_login_with(pkce, CsrfToken::generate());
        let binder = RecordingBinder::default();
        flow.complete_login("the-code", redirect.csrf_token.as_str(), &binder)
            .await
            .unwrap();

        let err = flow
            .complete_login("the-code", redirect.csrf_token.as_str(), &binder)
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::OAuth(OAuthErrorKind::InvalidOrExpiredState)
        );
        assert_eq!(binder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_state_never_reaches_provider() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;
        let flow = flow_for(&server);
        let binder = RecordingBinder::default();

        let err = flow
            .complete_login("the-code", "forged", &binder)
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::OAuth(OAuthErrorKind::InvalidOrExpiredState)
        );
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_exchange_still_consumes_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;
        let flow = flow_for(&server);
        let redirect = flow.begin_login();
        let binder = RecordingBinder::default();

        let err = flow
            .complete_login("bad-code", redirect.csrf_token.as_str(), &binder)
            .await
            .unwrap_err();

        assert!(matches!(
            err.error_kind,
            ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed { .. })
        ));
        assert!(flow.state_store().is_empty());
        assert_eq!(binder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_binding_failure_is_reported() {
        let mut server = Server::new_async().await;
        let flow = flow_for(&server);
        let pkce = PkcePair::generate();
        let verifier = pkce.verifier.as_str().to_string();
        let _mocks = mock_provider(&mut server, &verifier).await;

        let redirect = flow.begin_login_with(pkce, CsrfToken::generate());
        let binder = RecordingBinder {
            fail: true,
            ..Default::default()
        };

        let err = flow
            .complete_login("the-code", redirect.csrf_token.as_str(), &binder)
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Session(SessionErrorKind::BindingFailed)
        );
        assert!(!err.is_restartable());
    }

    #[test]
    fn test_invalid_authorize_url_rejected_at_construction() {
        let mut config = ProviderConfig::new("abc", "shh", "https://id.example.com", "https://x/cb");
        config.authorize_url = "::nope".to_string();
        let err = LoginFlow::new(config, StateStore::default()).err().unwrap();
        assert_eq!(err.error_kind, ErrorKind::Config);
    }

    fn issued_tokens(clock: &ManualClock, refresh_token: Option<&str>) -> TokenSet {
        TokenSet {
            access_token: SecretString::new("a".to_string()),
            refresh_token: refresh_token.map(|t| SecretString::new(t.to_string())),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            obtained_at: clock.now(),
        }
    }

    fn flow_with_clock(server: &ServerGuard, clock: Arc<ManualClock>) -> LoginFlow {
        let config = ProviderConfig::new("abc", "shh", &server.url(), "https://portal.example/cb");
        let store = StateStore::new(chrono::Duration::minutes(10), clock);
        LoginFlow::new(config, store).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_if_expired_leaves_fresh_tokens_alone() {
        let mut server = Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;
        let clock = Arc::new(ManualClock::default());
        let flow = flow_with_clock(&server, clock.clone());

        let refreshed = flow
            .refresh_if_expired(&issued_tokens(&clock, Some("b")))
            .await
            .unwrap();

        assert!(refreshed.is_none());
        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_if_expired_uses_refresh_token() {
        let mut server = Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "b".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"a2","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;
        let clock = Arc::new(ManualClock::default());
        let flow = flow_with_clock(&server, clock.clone());
        let tokens = issued_tokens(&clock, Some("b"));

        clock.advance(chrono::Duration::hours(1));
        let refreshed = flow.refresh_if_expired(&tokens).await.unwrap().unwrap();

        assert_eq!(refreshed.access_token.expose_secret(), "a2");
        assert_eq!(refreshed.obtained_at, clock.now());
        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_if_expired_without_refresh_token() {
        let server = Server::new_async().await;
        let clock = Arc::new(ManualClock::default());
        let flow = flow_with_clock(&server, clock.clone());
        let tokens = issued_tokens(&clock, None);

        clock.advance(chrono::Duration::hours(2));

        assert!(flow.refresh_if_expired(&tokens).await.unwrap().is_none());
    }
}
