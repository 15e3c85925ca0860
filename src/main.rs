use anyhow::{Context, Result};
use chartboard::api::{self, AppState};
use chartboard::blob_store::FilesystemBlobStore;
use chartboard::config::Config;
use chartboard::storage::TableStore;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chartboard=info,server=info,tower_http=info".into()),
        )
        .init();

    config.validate()?;

    let store = Arc::new(
        TableStore::open(&config.data_dir).context("Failed to open table store")?,
    );
    let blobs = Arc::new(FilesystemBlobStore::new(
        config.blob_dir(),
        &config.public_url,
    )?);
    let files_dir = blobs.root().to_path_buf();

    let state = Arc::new(AppState::new(
        store.clone(),
        blobs,
        config.auth_settings(),
    ));
    let app = api::router(state, Some(files_dir));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!("chartboard listening on http://{}", addr);
    tracing::info!("data directory: {}", config.data_dir.display());
    if config.auth_settings().owner_open_id.is_none() {
        tracing::warn!("no owner identity configured; nobody will be admin");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await?;
    tracing::info!("chartboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
