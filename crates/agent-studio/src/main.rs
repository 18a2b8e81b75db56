//! Serves `/api/chat` with the configuration from the environment.

#[macro_use]
extern crate tracing;

use std::process;

use agent_studio::{AppState, ServerConfig, router};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };
    if config.openai.is_none() {
        warn!("OPENAI_API_KEY is not set, chat requests will fail");
    }
    if config.composio.is_none() {
        warn!("COMPOSIO_API_KEY is not set, chat requests will fail");
    }
    debug!("server config: {config:?}");

    let listener = match TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind {}: {err}", config.addr);
            process::exit(1);
        }
    };
    info!("listening on {}", config.addr);

    let app = router(AppState::from_config(&config));
    if let Err(err) = axum::serve(listener, app).await {
        error!("server error: {err}");
        process::exit(1);
    }
}
