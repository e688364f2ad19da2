use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use portal_auth::error::{config_error, Error as AuthError};
use portal_auth::oauth::ProviderConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// OAuth client id registered with the identity provider
    #[arg(long, env)]
    oauth_client_id: Option<String>,

    /// OAuth client secret registered with the identity provider
    #[arg(long, env, hide_env_values = true)]
    oauth_client_secret: Option<String>,

    /// Base URL of the identity provider. Endpoints not set explicitly are derived from it.
    #[arg(long, env)]
    oauth_provider_url: Option<String>,

    /// Authorize endpoint override
    #[arg(long, env)]
    oauth_authorize_url: Option<String>,

    /// Token endpoint override
    #[arg(long, env)]
    oauth_token_url: Option<String>,

    /// Revoke endpoint override
    #[arg(long, env)]
    oauth_revoke_url: Option<String>,

    /// User info endpoint override
    #[arg(long, env)]
    oauth_user_info_url: Option<String>,

    /// Callback URL registered with the identity provider
    #[arg(long, env, default_value = "http://localhost:4000/oauth/callback")]
    pub oauth_redirect_uri: String,

    /// Scopes requested at login
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "read,write,openid"
    )]
    pub oauth_scopes: Vec<String>,

    /// Seconds a started login may take before its state expires
    #[arg(long, env, default_value_t = 600)]
    pub oauth_state_ttl_secs: i64,

    /// Seconds between sweeps of expired login states
    #[arg(long, env, default_value_t = 60)]
    pub oauth_state_purge_interval_secs: u64,

    /// Timeout in seconds for every request to the identity provider
    #[arg(long, env, default_value_t = 10)]
    pub oauth_http_timeout_secs: u64,

    /// Where the browser lands after a successful login
    #[arg(long, env, default_value = "/")]
    pub post_login_redirect_url: String,

    /// Session expiry duration in seconds (default: 24 hours = 86400 seconds)
    #[arg(long, env, default_value_t = 86400)]
    pub backend_session_expiry_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }

    pub fn oauth_provider_url(&self) -> Option<String> {
        self.oauth_provider_url.clone()
    }

    pub fn state_purge_interval(&self) -> Duration {
        Duration::from_secs(self.oauth_state_purge_interval_secs.max(1))
    }

    /// Assemble the identity provider settings handed to the login flow.
    ///
    /// Fails with a configuration error if the client credentials or provider URL
    /// are missing, or if the state TTL or HTTP timeout is not positive.
    pub fn provider_config(&self) -> Result<ProviderConfig, AuthError> {
        if self.oauth_state_ttl_secs <= 0 {
            return Err(config_error("OAUTH_STATE_TTL_SECS must be positive"));
        }
        if self.oauth_http_timeout_secs == 0 {
            return Err(config_error("OAUTH_HTTP_TIMEOUT_SECS must be positive"));
        }

        let client_id = self
            .oauth_client_id
            .as_deref()
            .ok_or_else(|| config_error("OAUTH_CLIENT_ID is not set"))?;
        let client_secret = self
            .oauth_client_secret
            .as_deref()
            .ok_or_else(|| config_error("OAUTH_CLIENT_SECRET is not set"))?;
        let provider_url = self
            .oauth_provider_url
            .as_deref()
            .ok_or_else(|| config_error("OAUTH_PROVIDER_URL is not set"))?;

        let mut provider = ProviderConfig::new(
            client_id,
            client_secret,
            provider_url,
            self.oauth_redirect_uri.clone(),
        )
        .with_scopes(self.oauth_scopes.clone())
        .with_http_timeout(Duration::from_secs(self.oauth_http_timeout_secs));

        if let Some(url) = &self.oauth_authorize_url {
            provider.authorize_url = url.clone();
        }
        if let Some(url) = &self.oauth_token_url {
            provider.token_url = url.clone();
        }
        if let Some(url) = &self.oauth_revoke_url {
            provider.revoke_url = url.clone();
        }
        if let Some(url) = &self.oauth_user_info_url {
            provider.user_info_url = url.clone();
        }

        Ok(provider)
    }
}
