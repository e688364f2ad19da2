use std::sync::Arc;

use log::*;
use portal_auth::clock::SystemClock;
use portal_auth::oauth::{LoginFlow, StateStore};
use service::{config::Config, logging::Logger};
use web::AppState;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
        std::process::exit(1);
    }

    info!("Starting captive portal [{}]...", config.runtime_env());

    let provider = match config.provider_config() {
        Ok(provider) => provider,
        Err(e) => {
            error!("Invalid OAuth provider configuration: {e}");
            std::process::exit(1);
        }
    };

    let state_store = StateStore::new(
        chrono::Duration::seconds(config.oauth_state_ttl_secs),
        Arc::new(SystemClock),
    );
    let _purge_task = state_store.spawn_purge_task(config.state_purge_interval());

    let login_flow = match LoginFlow::new(provider, state_store) {
        Ok(login_flow) => login_flow,
        Err(e) => {
            error!("Failed to set up the OAuth login flow: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = web::init_server(AppState::new(config, login_flow)).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
