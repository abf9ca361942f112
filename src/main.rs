use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadgen::api::metrics::init_metrics;
use leadgen::api::rate_limit::spawn_cleanup_task;
use leadgen::cli::{run_command, Cli};
use leadgen::config::Config;
use leadgen::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.command.is_some() {
        init_logging(cli.log_level.as_deref().unwrap_or("warn"));
        return run_command(&cli).await;
    }

    // Load configuration
    let config = Config::load(&cli.config)?;

    init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));

    tracing::info!("Starting LeadGenPro v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.server.data_dir.display()
        )
    })?;

    // Initialize database
    let db = leadgen::db::init(&config.server.data_dir).await?;

    // Ensure an admin account exists
    leadgen::db::ensure_admin_user(&db, &config.auth).await?;

    let file_store = leadgen::storage::from_config(&config).await?;
    tracing::info!(store = file_store.kind(), "Attachment storage ready");

    let mut state = AppState::new(config.clone(), db, file_store);
    match init_metrics() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed, /metrics disabled"),
    }
    if !state.mailer.is_enabled() {
        tracing::warn!("SMTP is not configured, lead e-mails will be skipped");
    }
    let state = Arc::new(state);

    // Background tasks
    let shutdown = CancellationToken::new();
    spawn_cleanup_task(
        state.rate_limiter.clone(),
        config.rate_limit.cleanup_interval,
        shutdown.clone(),
    );
    if config.monitor.summary_interval > 0 {
        state
            .monitor
            .start(Duration::from_secs(config.monitor.summary_interval));
    }

    let app = leadgen::api::create_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown.cancel();
    state.monitor.stop().await;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
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
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
