//! User info resolution.

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::config::ProviderConfig;
use crate::error::{network_error, oauth_error, Error, ErrorKind, OAuthErrorKind};

/// User identity retrieved from the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Provider's unique user identifier. Numeric ids are normalized to strings.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Every other attribute of the provider's user object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a non-empty string or number id, got {other}"
        ))),
    }
}

/// Client for the provider's user-info endpoint.
#[derive(Clone)]
pub struct UserInfoFetcher {
    http: reqwest::Client,
    user_info_url: String,
}

impl UserInfoFetcher {
    pub fn new(http: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            user_info_url: config.user_info_url.clone(),
        }
    }

    /// Resolve an access token to the identity it was issued for.
    ///
    /// # Errors
    ///
    /// * `UserInfoFetchFailed` on a non-2xx status or a body that is not a user object.
    /// * `Network` on transport failure or timeout.
    pub async fn fetch_user_info(
        &self,
        access_token: &str,
        token_type: &str,
    ) -> Result<UserIdentity, Error> {
        debug!("Fetching OAuth user info");

        let response = self
            .http
            .get(&self.user_info_url)
            .header(AUTHORIZATION, format!("{token_type} {access_token}"))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to reach OAuth user info endpoint: {:?}", e);
                network_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("OAuth user info endpoint answered with {}", status);
            return Err(oauth_error(
                OAuthErrorKind::UserInfoFetchFailed,
                &format!("user info endpoint returned {status}"),
            ));
        }

        let body = response.text().await.map_err(|e| {
            warn!("Failed to read OAuth user info response: {:?}", e);
            network_error(e)
        })?;

        serde_json::from_str::<UserIdentity>(&body).map_err(|e| {
            warn!("Failed to parse OAuth user info: {:?}", e);
            Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::OAuth(OAuthErrorKind::UserInfoFetchFailed),
            }
        })
    }
}
