//! `crawl-relay`: same-origin relay for operator-triggered crawl requests.

mod config;
mod logging;
mod routes;

use anyhow::Context as _;
use clap::Parser as _;
use config::Config;
use crawl_relay_core::Relay;
use routes::AppState;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(&config.log_level, config.log_format)?;

    let safety = config.outbound_safety();
    info!(
        allowed_hosts = ?safety.allowed_hosts,
        allow_private_networks = safety.allow_private_networks,
        max_response_bytes = ?safety.max_response_bytes,
        "outbound policy"
    );
    let relay = Relay::http(safety).context("build outbound HTTP client")?;

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    info!(addr = %listener.local_addr()?, "crawl relay listening");

    axum::serve(listener, routes::router(AppState::new(relay)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    info!("crawl relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
