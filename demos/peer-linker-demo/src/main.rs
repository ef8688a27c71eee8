//! A small interactive client for `peer-linker-server`: registers a pad,
//! optionally links to a target pad, then relays stdin lines to the linked
//! peer as passthrough frames and prints whatever it receives back.

mod hooks;
mod ws_transport;

use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use signal_client::{PeerLinkerSession, StartParams};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Demo client for the peer-linker signaling server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// WebSocket URL of the peer-linker server.
    #[arg(long, default_value = "ws://127.0.0.1:8080/")]
    server: String,

    /// Name to register this pad under.
    #[arg(long)]
    pad_name: String,

    /// Pad name to link to on startup. If omitted, this pad only waits to
    /// be linked to by another pad.
    #[arg(long)]
    target: Option<String>,

    /// Shared secret offered/expected during the link handshake.
    #[arg(long, default_value = "demo-secret")]
    secret: String,

    /// `tracing` filter directive.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Application-defined packet type used for this demo's passthrough chat
/// frames; any value the peer-linker/channel-hub wire formats do not
/// themselves reserve works, since passthrough forwards type codes opaquely.
const CHAT_PACKET_TYPE: u16 = 4096;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log_level.clone()))
        .init();

    let (sender, receiver) = match ws_transport::connect(&cli.server, "peer-linker").await {
        Ok(pair) => pair,
        Err(err) => {
            error!(%err, "failed to connect to peer-linker server");
            std::process::exit(1);
        }
    };

    let hooks = Arc::new(hooks::DemoHooks::new(cli.secret.into_bytes()));
    let session = PeerLinkerSession::spawn(sender, receiver, hooks);

    let started = session
        .start(StartParams { pad_name: cli.pad_name.clone(), target_pad_name: cli.target.clone() })
        .await;
    if !started {
        error!("failed to register or link pad");
        std::process::exit(1);
    }
    info!(pad_name = %cli.pad_name, target = ?cli.target, "ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while session.is_connected() {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !session.send_passthrough(CHAT_PACKET_TYPE, Bytes::from(line)).await {
                    error!("failed to send; connection likely closed");
                    break;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }

    session.stop().await;
}
