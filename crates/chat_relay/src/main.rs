mod cli;
mod config;
mod directives;
mod dispatcher;
mod hub;
mod logging;
mod protocol;
mod relay;
mod server;
mod tools;


use crate::cli::Args;
use crate::config::RelayConfig;
use crate::logging::setup_logging;
use crate::server::AppState;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // Values from .env become defaults for the environment backed arguments
    dotenv::dotenv().ok();

    let args = Args::parse();
    setup_logging(args.verbose);

    let config = RelayConfig::from_args(&args);
    let state = AppState::from_config(&config);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;

    server::serve(listener, state).await
}
