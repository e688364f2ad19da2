use std::sync::Arc;

use log::*;
use portal_auth::oauth::LoginFlow;
use service::config::Config;
use time::Duration;
use tokio::net::TcpListener;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

mod controller;
mod error;
pub(crate) mod router;
mod session_binder;

pub use error::{Error, Result, WebErrorKind};
pub use session_binder::{SessionTokens, TowerSessionBinder};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub login_flow: Arc<LoginFlow>,
}

impl AppState {
    pub fn new(config: Config, login_flow: LoginFlow) -> Self {
        Self {
            config,
            login_flow: Arc::new(login_flow),
        }
    }
}

/// Cookie-backed session layer. Secure cookies are only required in production.
pub fn session_layer(config: &Config) -> SessionManagerLayer<MemoryStore> {
    let session_store = MemoryStore::default();
    let expiry_secs = i64::try_from(config.backend_session_expiry_seconds).unwrap_or(i64::MAX);

    SessionManagerLayer::new(session_store)
        .with_secure(config.is_production())
        .with_expiry(Expiry::OnInactivity(Duration::seconds(expiry_secs)))
}

/// Build the full application: routes plus the session layer.
pub fn app(app_state: AppState) -> axum::Router {
    let session_layer = session_layer(&app_state.config);
    router::define_routes(app_state).layer(session_layer)
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{host}:{}", app_state.config.port);

    let listener = TcpListener::bind(&server_url).await?;
    info!("Captive portal listening on {server_url}");

    axum::serve(listener, app(app_state)).await
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use clap::Parser;
    use portal_auth::clock::SystemClock;
    use portal_auth::oauth::StateStore;

    /// App state pointed at a provider running at `provider_url`.
    pub fn app_state(provider_url: &str) -> AppState {
        let config = Config::try_parse_from([
            "captive_portal_rs",
            "--oauth-client-id",
            "portal",
            "--oauth-client-secret",
            "portal-secret",
            "--oauth-provider-url",
            provider_url,
            "--oauth-redirect-uri",
            "https://portal.example/oauth/callback",
            "--post-login-redirect-url",
            "/welcome",
        ])
        .unwrap();

        let provider = config.provider_config().unwrap();
        let state_store = StateStore::new(
            chrono::Duration::seconds(config.oauth_state_ttl_secs),
            Arc::new(SystemClock),
        );
        let login_flow = LoginFlow::new(provider, state_store).unwrap();
        AppState::new(config, login_flow)
    }
}
