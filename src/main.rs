use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use seglarklubb::config::Config;
use seglarklubb::state::AppState;
use seglarklubb::{build_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::connect(&config.database_url).await?;
    let bind_address = config.bind_address.clone();
    if config.mail.mailgun_token.is_none() {
        tracing::warn!("MAILGUN_TOKEN is not set, emails will only be logged");
    }
    if config.turnstile.secret.is_none() {
        tracing::warn!("TURNSTILE_SECRET is not set, bot checks are off");
    }

    let app = build_app(AppState::new(pool, config)).await?;
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to listen on {bind_address}"))?;
    tracing::info!(address = %bind_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
}
