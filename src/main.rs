use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use snaplink::analytics::AnalyticsAggregator;
use snaplink::api::handlers::AppState;
use snaplink::clicks::ClickRecorder;
use snaplink::config::{Config, DatabaseBackend};
use snaplink::redirect::handlers::RedirectState;
use snaplink::service::LinkService;
use snaplink::shortcode::CodeGenerator;
use snaplink::storage::{CachedStore, LinkStore, PostgresStore, SqliteStore};
use snaplink::{api, redirect};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let backend: Arc<dyn LinkStore> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStore::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStore::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    info!("Initializing database...");
    backend.init().await?;
    info!("Database initialized successfully");

    let store: Arc<dyn LinkStore> =
        Arc::new(CachedStore::new(backend, config.cache_max_entries));

    let recorder = Arc::new(ClickRecorder::new(
        Arc::clone(&store),
        config.click_queue_capacity,
        config.click_flush_interval_secs,
    ));

    let service = Arc::new(LinkService::new(
        Arc::clone(&store),
        Arc::clone(&recorder),
        CodeGenerator::new(config.short_code_length),
        config.generation_max_attempts,
    ));
    let analytics = Arc::new(AnalyticsAggregator::new(Arc::clone(&store)));

    let api_router = api::create_api_router(Arc::new(AppState {
        service: Arc::clone(&service),
        analytics,
    }));
    let redirect_router = redirect::create_redirect_router(Arc::new(RedirectState { service }));

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("Redirect server listening on http://{}", redirect_addr);

    tokio::try_join!(
        axum::serve(
            api_listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal()),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal()),
    )?;

    // Buffered counter increments survive only if this runs before exit.
    info!("Shutting down, flushing click recorder");
    recorder.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
