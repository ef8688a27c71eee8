use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Channel-hub signaling server: named channel advertisements and
/// pad-request brokerage between a channel's owner and requesters.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Address to bind the WebSocket listener on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8081")]
    bind: String,

    /// `tracing` filter directive, e.g. `info` or `channel_hub_server=debug`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log_level))
        .init();

    let state = Arc::new(channel_hub_server::ChannelHubState::new());
    let router = channel_hub_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .expect("failed to bind");
    info!(addr = %cli.bind, "channel-hub server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("channel-hub server shut down gracefully");
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
