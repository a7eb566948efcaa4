mod config;
mod handler;
mod pr;
mod review;
mod webhook;

use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// PR Review Bot: a GitHub App that reviews every newly opened pull request
/// with Gemini and posts the review as a comment.
#[derive(Parser, Debug)]
#[command(name = "pr-review-bot", version, about)]
struct Cli {
    /// Config file (defaults to .pr-review-bot.toml in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = config::Config::load(cli.config.as_deref())?;
    let secrets = config.secrets()?;

    let credentials =
        pr::AppCredentials::from_pem(secrets.app_id, secrets.private_key_pem.as_bytes())?;
    debug!(app_id = credentials.app_id(), api_base = %config.github.api_base(), "GitHub App credentials loaded");
    let host = pr::GitHubApp::new(credentials, config.github.api_base());

    let gemini = review::GeminiClient::new(
        &config.gemini,
        SecretString::from(secrets.generation_credential),
    );
    debug!(endpoint = gemini.endpoint(), "generation client ready");

    let handler = handler::EventHandler::new(
        Arc::new(host),
        review::ReviewGenerator::new(Arc::new(gemini)),
    );
    let state = Arc::new(webhook::AppState {
        handler: Arc::new(handler),
        webhook_secret: SecretString::from(secrets.webhook_secret),
    });
    let app = webhook::router(state, &config.server.webhook_path);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Server is listening for events at: {}", config.server.webhook_url());
    info!("Press Ctrl + C to quit.");

    axum::serve(listener, app).await?;

    Ok(())
}
