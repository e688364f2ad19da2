//! Identity provider settings injected into the login components.

use std::time::Duration;

use secrecy::SecretString;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 3] = ["read", "write", "openid"];

/// Client credentials and endpoints of the identity provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Browser-facing authorize endpoint.
    pub authorize_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub user_info_url: String,
    /// Callback URL registered with the provider.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Upper bound on every outbound provider call.
    pub http_timeout: Duration,
}

impl ProviderConfig {
    /// Build a configuration with the default scopes and a 10 second timeout.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: &str,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            authorize_url: format!("{base_url}/oauth/authorize"),
            token_url: format!("{base_url}/oauth/token"),
            revoke_url: format!("{base_url}/oauth/revoke"),
            user_info_url: format!("{base_url}/api/user"),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            http_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}
