//! HTTP server initialization and runtime setup.
//!
//! Handles store selection, worker spawning, and the Axum server lifecycle.

use crate::application::services::{ClickPolicy, ClickTracker, LinkService};
use crate::config::{Config, StoreBackend};
use crate::domain::click_worker::{ClickWorkerSettings, run_click_worker};
use crate::domain::repositories::{ClickRepository, LinkRepository};
use crate::infrastructure::persistence::{
    MemoryClickRepository, MemoryLinkRepository, PgClickRepository, PgLinkRepository,
};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long queued clicks may take to flush after the server stops.
const CLICK_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

type Repositories = (Arc<dyn LinkRepository>, Arc<dyn ClickRepository>);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - The link and click stores (PostgreSQL with migrations, or in-memory)
/// - Background click worker
/// - Axum HTTP server with graceful shutdown
///
/// On SIGINT/SIGTERM the server stops accepting connections, the click queue
/// is closed and the worker gets [`CLICK_DRAIN_TIMEOUT`] to persist what is
/// still queued.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let (link_repository, click_repository) = build_repositories(&config).await?;

    let (click_tx, click_rx) = mpsc::channel(config.click_queue_capacity);

    let worker = tokio::spawn(run_click_worker(
        click_rx,
        click_repository.clone(),
        ClickWorkerSettings {
            concurrency: config.click_worker_concurrency,
            retry_attempts: config.click_retry_attempts,
        },
    ));
    tracing::info!("Click worker started");

    let tracker = ClickTracker::new(click_tx, ClickPolicy::from(&config.shortener));
    let link_service = LinkService::new(
        link_repository,
        click_repository,
        tracker,
        &config.shortener,
        config.store_timeout(),
    )
    .context("Failed to build link service")?;

    let state = AppState::new(Arc::new(link_service), &config.base_url);
    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped, draining click queue");

    match tokio::time::timeout(CLICK_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => tracing::info!("Click queue drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Click worker panicked"),
        Err(_) => tracing::warn!(
            timeout_secs = CLICK_DRAIN_TIMEOUT.as_secs(),
            "Click queue not drained in time, remaining clicks are lost"
        ),
    }

    Ok(())
}

async fn build_repositories(config: &Config) -> Result<Repositories> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;

            let pool = connect_pool(config, database_url).await?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            let pool = Arc::new(pool);
            let links: Arc<dyn LinkRepository> = Arc::new(PgLinkRepository::new(pool.clone()));
            let clicks: Arc<dyn ClickRepository> = Arc::new(PgClickRepository::new(pool));
            Ok((links, clicks))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, links are lost on restart");
            let links: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
            let clicks: Arc<dyn ClickRepository> = Arc::new(MemoryClickRepository::new());
            Ok((links, clicks))
        }
    }
}

/// Opens a connection pool sized from the `DB_*` settings.
pub async fn connect_pool(config: &Config, database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Some(Duration::from_secs(config.db_idle_timeout)))
        .max_lifetime(Some(Duration::from_secs(config.db_max_lifetime)))
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
