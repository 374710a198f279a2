mod constants;
mod fetcher;
mod routes;

use clap::Parser;
use fetcher::HttpChainFetcher;
use ledger_core::{Ledger, LedgerConfig};
use routes::{router, AppState};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "LEDGER_LISTEN", default_value = constants::DEFAULT_LISTEN)]
    listen: String,

    /// Leading zero hex characters required of a block hash
    #[arg(long, env = "INITIAL_DIFFICULTY", default_value_t = ledger_core::constants::DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Give up on a block after this many nonces
    #[arg(long, env = "LEDGER_MAX_ATTEMPTS")]
    max_attempts: Option<u64>,

    /// Per-peer timeout for chain fetches during consensus
    #[arg(long, env = "LEDGER_PEER_TIMEOUT_MS", default_value_t = ledger_core::constants::DEFAULT_PEER_TIMEOUT_MS)]
    peer_timeout_ms: u64,

    /// Peers to register at startup (comma separated)
    #[arg(long = "peer", env = "LEDGER_PEERS", value_delimiter = ',')]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let peer_timeout = Duration::from_millis(args.peer_timeout_ms);
    let config = LedgerConfig {
        difficulty: args.difficulty,
        max_attempts: args.max_attempts,
        peer_timeout,
    };
    config.validate()?;
    let ledger = Arc::new(Ledger::new(config));
    for address in &args.peers {
        if let Err(e) = ledger.register_peer(address) {
            warn!("ignoring peer: {e}");
        }
    }

    let state = AppState {
        ledger,
        fetcher: Arc::new(HttpChainFetcher::new(peer_timeout)?),
    };
    let app = router(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
