//! Arena server binary
//!
//! Boots the fixed-rate simulation, then serves the WebSocket endpoint, the
//! liveness/debug routes and the static client bundle until a shutdown signal.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use arena_server::app::AppState;
use arena_server::config::Config;
use arena_server::http::build_router;
use arena_server::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config.log_level);
    init_server_time();

    info!(
        addr = %config.server_addr,
        tick_rate = config.simulation.tick_rate,
        public_dir = %config.public_dir.display(),
        "Starting arena server"
    );

    let (state, simulation) = AppState::new(config.clone());
    let simulation = tokio::spawn(simulation.run());

    let listener = TcpListener::bind(config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    info!(ws = %format!("ws://{}/ws", config.server_addr), "Accepting connections");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    simulation.abort();
    info!("Arena server stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level when set
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
