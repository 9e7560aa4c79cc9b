//! TCP transport for signed commands
//!
//! One request and one response per connection: the server reads a single
//! JSON line, hands it to the command dispatcher, writes a single JSON line
//! back, and closes the connection. Transport failures are logged and never
//! affect subsequently accepted connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::command::{CommandDispatcher, CommandReply};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::types::SignedCommand;
use crate::Result;

/// TCP server for the chain service.
pub struct ChainServer {
    listener: TcpListener,
    dispatcher: CommandDispatcher,
    metrics: Arc<Metrics>,
}

impl ChainServer {
    /// Bind the configured listen address.
    pub async fn bind(
        config: &Config,
        dispatcher: CommandDispatcher,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        Ok(Self {
            listener,
            dispatcher,
            metrics,
        })
    }

    /// The address actually bound; resolves port 0 to the assigned port.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Each connection runs on its own task; the ledger itself
    /// stays serialized behind the actor, so concurrent connections only
    /// parallelize parsing and I/O.
    pub async fn serve(self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "chain server listening");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let dispatcher = self.dispatcher.clone();
                    let metrics = self.metrics.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, &dispatcher, &metrics).await {
                            tracing::warn!(%peer, error = %err, "connection failed");
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                }
            }
        }
    }
}

/// Read one JSON line, execute it, write one JSON line, close.
async fn handle_connection(
    stream: TcpStream,
    dispatcher: &CommandDispatcher,
    metrics: &Metrics,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).await?;

    metrics.record_request();
    let start = Instant::now();
    let reply = match serde_json::from_str::<SignedCommand>(line.trim_end()) {
        Ok(cmd) => dispatcher.execute(cmd).await,
        Err(err) => {
            tracing::warn!(error = %err, "unparseable request");
            CommandReply::error(format!("bad request: {}", err))
        }
    };
    metrics.observe_request_duration(start.elapsed().as_secs_f64());

    let body = serde_json::to_string(&reply).unwrap_or_else(|err| {
        tracing::error!(error = %err, "response encoding failed");
        r#"{"error":"internal error"}"#.to_string()
    });
    writer.write_all(body.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
