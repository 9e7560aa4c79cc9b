//! Chain TCP server binary

use std::sync::Arc;

use chain_core::actor::spawn_ledger_actor;
use chain_core::command::CommandDispatcher;
use chain_core::metrics::Metrics;
use chain_core::server::ChainServer;
use chain_core::{Block, Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting DID Chain Server");

    // Load configuration: explicit file if given, environment otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Mine the genesis block before the listener binds
    let mut ledger = Ledger::new();
    ledger.append_block(Block::new(
        0,
        chrono::Utc::now(),
        config.genesis.payload.clone(),
        config.genesis.difficulty,
    ));
    tracing::info!(
        difficulty = config.genesis.difficulty,
        head_hash = %ledger.head_hash(),
        "genesis block mined"
    );

    let metrics = Arc::new(Metrics::new()?);
    let handle = spawn_ledger_actor(ledger);
    let dispatcher = CommandDispatcher::new(handle.clone(), metrics.clone());

    let server = ChainServer::bind(&config, dispatcher, metrics.clone()).await?;

    tokio::select! {
        result = server.serve() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down chain server");
        }
    }

    handle.shutdown().await.ok();
    tracing::info!(
        requests = metrics.requests_total.get(),
        unauthorized = metrics.unauthorized_total.get(),
        blocks = metrics.blocks_total.get(),
        "final request counts"
    );
    Ok(())
}
