//! # flagd
//!
//! HTTP server for tile flags: loads settings, wires the configured store
//! into the services, and serves the axum router.

mod backend;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_adapters::{build_router, AppState};
use chrono::Duration;
use clap::Parser;
use configs::{LogFormat, LogSettings, Settings};
use domains::{Clock, SystemClock};
use services::{FlagLister, FlagService, FlagStore, RateLimitPolicy, RateLimiter};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flagd", version, about = "Tile flag moderation server")]
struct Args {
    /// Configuration file; missing files are skipped.
    #[arg(short, long, default_value = configs::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load_file(&args.config).context("failed to load configuration")?;
    init_tracing(&settings.log);

    info!("flagd v{}", env!("CARGO_PKG_VERSION"));

    let tables = backend::connect(&settings).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = FlagStore::new(tables.flags, clock.clone())
        .with_ttl(Duration::days(settings.flags.ttl_days));
    let limiter = RateLimiter::new(
        tables.rate_limits,
        clock.clone(),
        RateLimitPolicy {
            max_per_window: settings.rate_limit.max_per_window,
            window_secs: settings.rate_limit.window_secs,
            counter_ttl_secs: settings.rate_limit.counter_ttl_secs,
        },
    );
    let state = AppState::new(
        FlagService::new(store.clone(), limiter),
        FlagLister::new(store, clock),
    );

    let router = build_router(state, &settings.server.cors_origin)
        .context("server.cors_origin is not a valid header value")?;
    let addr = settings.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, backend = ?settings.store.backend, "listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    Ok(())
}
