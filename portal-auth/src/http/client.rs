//! HTTP client builder for calls to the identity provider.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

/// Default timeout for every provider call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for the provider HTTP client.
///
/// No retry middleware is installed. Authorization codes and CSRF states are
/// single-use, so failed calls go straight back to the caller.
pub struct ProviderClientBuilder {
    timeout: Duration,
    user_agent: String,
}

impl ProviderClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("portal-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the configured HTTP client.
    pub fn build(self) -> Result<reqwest::Client, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .default_headers(headers)
            .use_rustls_tls()
            .build()
    }
}

impl Default for ProviderClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
