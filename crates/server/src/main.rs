mod app;

use anyhow::{Context, Result};
use mbtichat_core::{config::get_config, get_completion_model};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mbtichat_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = get_config(None).context("Failed to load configuration")?;
    let model = get_completion_model(config.chat.model.clone())
        .context("Failed to initialize completion model")?;

    let state = Arc::new(app::AppState { model });
    let router = app::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind server address")?;
    axum::serve(listener, router).await.context("Server error")?;

    Ok(())
}
