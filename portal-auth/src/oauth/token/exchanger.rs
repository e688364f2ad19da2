//! Token endpoint client: code exchange, refresh and revocation.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::TokenSet;
use crate::clock::Clock;
use crate::error::{network_error, token_exchange_error, Error};
use crate::oauth::config::ProviderConfig;
use crate::oauth::pkce::PkceVerifier;

/// Raw token endpoint response. Providers report failures either through the
/// HTTP status, an `error` field, or both.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Request to exchange authorization code for tokens
#[derive(Serialize)]
struct CodeExchangeRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    code_verifier: &'a str,
}

/// Request to refresh access token
#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Serialize)]
struct RevokeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    token: &'a str,
}

/// Client for the provider's token and revoke endpoints.
///
/// None of the operations retry. Authorization codes are single-use, so a failed
/// exchange means the whole login attempt has to start over.
#[derive(Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    token_url: String,
    revoke_url: String,
    client_id: String,
    client_secret: SecretString,
    clock: Arc<dyn Clock>,
}

impl TokenExchanger {
    /// Issued tokens are stamped with `clock`'s time as `obtained_at`.
    pub fn new(http: reqwest::Client, config: &ProviderConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            clock,
            token_url: config.token_url.clone(),
            revoke_url: config.revoke_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Exchange an authorization code for tokens, proving possession of the PKCE verifier.
    ///
    /// # Errors
    ///
    /// * `TokenExchangeFailed` if the provider answers with a non-2xx status, an
    ///   `error` field, or a body without an access token.
    /// * `Network` on transport failure or timeout.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        verifier: &PkceVerifier,
    ) -> Result<TokenSet, Error> {
        let request = CodeExchangeRequest {
            grant_type: "authorization_code",
            code,
            redirect_uri,
            client_id: &self.client_id,
            client_secret: self.client_secret.expose_secret(),
            code_verifier: verifier.as_str(),
        };

        debug!("Exchanging OAuth authorization code for tokens");

        let tokens = self.request_tokens(&request, None).await?;
        info!("Successfully exchanged OAuth authorization code for tokens");
        Ok(tokens)
    }

    /// Obtain a fresh access token with a refresh token.
    ///
    /// When the provider does not rotate the refresh token, the presented one is
    /// carried over into the returned set.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, Error> {
        let request = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
            client_id: &self.client_id,
            client_secret: self.client_secret.expose_secret(),
        };

        debug!("Refreshing OAuth access token");

        let tokens = self.request_tokens(&request, Some(refresh_token)).await?;
        info!("Successfully refreshed OAuth access token");
        Ok(tokens)
    }

    /// Revoke an access or refresh token.
    ///
    /// Returns whether the provider acknowledged the revocation with a 2xx status.
    /// Any provider-side refusal (including an already invalid token) is `Ok(false)`;
    /// only transport failures are errors.
    pub async fn revoke(&self, token: &str) -> Result<bool, Error> {
        let request = RevokeRequest {
            client_id: &self.client_id,
            client_secret: self.client_secret.expose_secret(),
            token,
        };

        let response = self
            .http
            .post(&self.revoke_url)
            .form(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to reach OAuth revoke endpoint: {:?}", e);
                network_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("OAuth token revocation answered with {}", status);
        }
        Ok(status.is_success())
    }

    async fn request_tokens<T: Serialize>(
        &self,
        form: &T,
        presented_refresh_token: Option<&str>,
    ) -> Result<TokenSet, Error> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to reach OAuth token endpoint: {:?}", e);
                network_error(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!("Failed to read OAuth token response: {:?}", e);
            network_error(e)
        })?;

        let parsed = serde_json::from_str::<TokenResponse>(&body).ok();

        if let Some(error) = parsed.as_ref().and_then(|p| p.error.as_deref()) {
            let reason = match parsed.as_ref().and_then(|p| p.error_description.as_deref()) {
                Some(description) => format!("{error}: {description}"),
                None => error.to_string(),
            };
            warn!("OAuth token endpoint rejected the grant: {}", reason);
            return Err(token_exchange_error(reason));
        }

        if !status.is_success() {
            warn!("OAuth token endpoint answered with {}", status);
            return Err(token_exchange_error(format!("token endpoint returned {status}")));
        }

        let parsed = parsed.ok_or_else(|| {
            warn!("Failed to parse OAuth token response");
            token_exchange_error("malformed token response")
        })?;

        let access_token = parsed
            .access_token
            .ok_or_else(|| token_exchange_error("token response has no access_token"))?;

        let refresh_token = parsed
            .refresh_token
            .or_else(|| presented_refresh_token.map(str::to_string))
            .map(SecretString::new);

        Ok(TokenSet {
            access_token: SecretString::new(access_token),
            refresh_token,
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: parsed.expires_in,
            obtained_at: self.clock.now(),
        })
    }
}
