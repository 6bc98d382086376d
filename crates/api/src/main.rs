use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use teamgate_api::config::AppConfig;
use teamgate_infra::{PostgresStore, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be populated.
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env()?;
    teamgate_observability::init(config.log_format);

    let tokens = config.token_service()?;

    let mut postgres = None;
    let storage = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            let store = PostgresStore::new(pool);
            store.ensure_schema().await?;
            info!("using postgres storage");
            let store = Arc::new(store);
            postgres = Some(store.clone());
            Storage::from_shared(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory storage (data is lost on exit)");
            Storage::in_memory()
        }
    };

    let app = teamgate_api::app::build_app(storage, tokens);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(store) = postgres {
        store.close().await;
        info!("postgres pool closed");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
