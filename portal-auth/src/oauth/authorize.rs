//! Authorization URL construction.

use url::Url;

use super::config::ProviderConfig;
use crate::error::{config_error, Error};

/// Builds the browser redirect to the provider's authorize endpoint.
#[derive(Debug, Clone)]
pub struct AuthorizationUrlBuilder {
    authorize_url: Url,
    client_id: String,
    scope: String,
}

impl AuthorizationUrlBuilder {
    /// # Errors
    ///
    /// A `Config` error if `authorize_url` is not an absolute URL.
    pub fn new(authorize_url: &str, client_id: &str, scopes: &[String]) -> Result<Self, Error> {
        let authorize_url = Url::parse(authorize_url)
            .map_err(|_| config_error("OAuth authorize URL is not a valid absolute URL"))?;

        Ok(Self {
            authorize_url,
            client_id: client_id.to_string(),
            scope: scopes.join(" "),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, Error> {
        Self::new(&config.authorize_url, &config.client_id, &config.scopes)
    }

    /// Compose the authorization URL for one login attempt.
    ///
    /// All values are form-urlencoded, so the space-separated scope list renders
    /// as `read+write+openid`.
    pub fn build_login_url(&self, redirect_uri: &str, csrf_token: &str, challenge: &str) -> String {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", csrf_token)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256");
        url.into()
    }
}
