//! Actor-based single-writer ownership of the ledger
//!
//! All six operations, reads included, execute on one task that owns the
//! [`Ledger`], so no two operations ever interleave. Proof-of-work, repair,
//! and the one-second hash-rate benchmark run inline on that task and hold
//! up every queued request for their full, unbounded duration; that is the
//! intended processing model, not an accident.

use tokio::sync::{mpsc, oneshot};

use crate::ledger::Ledger;
use crate::types::{Block, StatusView};
use crate::{Error, Result};

/// Mailbox depth; senders get backpressure beyond this.
const MAILBOX_CAPACITY: usize = 256;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Read size, hash rate, and tip metadata
    Status {
        /// Reply channel
        response: oneshot::Sender<StatusView>,
    },

    /// Mine and append a new block
    Append {
        /// Full payload to store
        payload: String,
        /// Required leading hex zeros
        difficulty: u32,
        /// Reply channel
        response: oneshot::Sender<()>,
    },

    /// Run the validity scan
    Validate {
        /// Reply channel
        response: oneshot::Sender<bool>,
    },

    /// Render the entire ledger
    Dump {
        /// Reply channel
        response: oneshot::Sender<String>,
    },

    /// Overwrite one block's payload
    Tamper {
        /// Target block
        index: usize,
        /// Replacement payload
        payload: String,
        /// Reply channel; carries the stored payload back
        response: oneshot::Sender<Result<String>>,
    },

    /// Re-mine the chain back to consistency
    Repair {
        /// Reply channel
        response: oneshot::Sender<()>,
    },

    /// Stop the actor
    Shutdown,
}

/// Actor that owns the ledger and processes messages sequentially
pub struct LedgerActor {
    ledger: Ledger,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create a new actor around an already-initialized ledger
    pub fn new(ledger: Ledger, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor loop until shutdown or all handles drop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                other => self.handle_message(other),
            }
        }
        tracing::debug!("ledger actor stopped");
    }

    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Status { response } => {
                let (difficulty, nonce) = match self.ledger.latest_block() {
                    Some(block) => (block.difficulty, block.nonce.to_string()),
                    None => (0, "0".to_string()),
                };
                let view = StatusView {
                    size: self.ledger.len() as u64,
                    hash_rate: self.ledger.hashes_per_second(),
                    difficulty,
                    nonce,
                    head_hash: self.ledger.head_hash().to_string(),
                };
                let _ = response.send(view);
            }

            LedgerMessage::Append {
                payload,
                difficulty,
                response,
            } => {
                let index = self.ledger.latest_block().map(|b| b.index + 1).unwrap_or(0);
                let block = Block::new(index, chrono::Utc::now(), payload, difficulty);
                self.ledger.append_block(block);
                tracing::info!(index, difficulty, head_hash = %self.ledger.head_hash(), "block appended");
                let _ = response.send(());
            }

            LedgerMessage::Validate { response } => {
                let _ = response.send(self.ledger.is_valid());
            }

            LedgerMessage::Dump { response } => {
                let _ = response.send(self.ledger.to_string());
            }

            LedgerMessage::Tamper {
                index,
                payload,
                response,
            } => {
                let result = self
                    .ledger
                    .tamper_block(index, payload)
                    .map(|block| block.payload.clone());
                let _ = response.send(result);
            }

            LedgerMessage::Repair { response } => {
                self.ledger.repair();
                tracing::info!(head_hash = %self.ledger.head_hash(), "chain repaired");
                let _ = response.send(());
            }

            LedgerMessage::Shutdown => {
                // Handled in the main loop.
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    fn request<T>(&self) -> (oneshot::Sender<T>, oneshot::Receiver<T>) {
        oneshot::channel()
    }

    async fn send(&self, msg: LedgerMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("actor mailbox closed".to_string()))
    }

    /// Read size, hash rate, and tip metadata
    pub async fn status(&self) -> Result<StatusView> {
        let (tx, rx) = self.request();
        self.send(LedgerMessage::Status { response: tx }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))
    }

    /// Mine and append a block carrying `payload` at `difficulty`
    pub async fn append(&self, payload: String, difficulty: u32) -> Result<()> {
        let (tx, rx) = self.request();
        self.send(LedgerMessage::Append {
            payload,
            difficulty,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))
    }

    /// Run the validity scan
    pub async fn validate(&self) -> Result<bool> {
        let (tx, rx) = self.request();
        self.send(LedgerMessage::Validate { response: tx }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))
    }

    /// Render the entire ledger
    pub async fn dump(&self) -> Result<String> {
        let (tx, rx) = self.request();
        self.send(LedgerMessage::Dump { response: tx }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))
    }

    /// Overwrite one block's payload; returns the stored payload
    pub async fn tamper(&self, index: usize, payload: String) -> Result<String> {
        let (tx, rx) = self.request();
        self.send(LedgerMessage::Tamper {
            index,
            payload,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))?
    }

    /// Re-mine the chain back to consistency
    pub async fn repair(&self) -> Result<()> {
        let (tx, rx) = self.request();
        self.send(LedgerMessage::Repair { response: tx }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.send(LedgerMessage::Shutdown).await
    }
}

/// Spawn the ledger actor, taking ownership of the ledger
pub fn spawn_ledger_actor(ledger: Ledger) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let actor = LedgerActor::new(ledger, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle { sender: tx }
}
