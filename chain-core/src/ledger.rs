//! The digest-linked ledger
//!
//! An ordered sequence of blocks plus a running head digest. Two invariants
//! hold between mutations:
//!
//! - every successor's `previous_hash` equals the digest of its predecessor
//! - `head_hash` equals the digest of the last block
//!
//! Only [`Ledger::tamper_block`] can break them; [`Ledger::repair`] restores
//! them unconditionally by re-mining.

use std::fmt;
use std::time::{Duration, Instant};

use crate::crypto;
use crate::types::Block;
use crate::{Error, Result};

/// Fixed input for the hash-rate benchmark.
const BENCH_INPUT: &[u8] = b"00000000";

/// Ordered blocks plus the authoritative tip digest.
#[derive(Debug, Default)]
pub struct Ledger {
    blocks: Vec<Block>,
    head_hash: String,
}

impl Ledger {
    /// An empty ledger; callers append a genesis block before serving.
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            head_hash: String::new(),
        }
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True before the genesis block has been appended.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Digest of the current tip; empty before genesis.
    pub fn head_hash(&self) -> &str {
        &self.head_hash
    }

    /// Read-only view of the blocks.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The most recent block, if any.
    pub fn latest_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Wire the block to the current tip, run its proof-of-work, and append
    /// it. The head hash becomes the freshly mined digest. Unbounded for the
    /// duration of the nonce search.
    pub fn append_block(&mut self, mut block: Block) {
        block.previous_hash = self.head_hash.clone();
        self.head_hash = block.proof_of_work();
        self.blocks.push(block);
    }

    /// Forward scan of both invariants. Reports invalid at the first
    /// mismatch; a genesis-only ledger is valid iff the genesis digest
    /// equals the head hash.
    pub fn is_valid(&self) -> bool {
        for pair in self.blocks.windows(2) {
            if pair[1].previous_hash != pair[0].compute_digest() {
                return false;
            }
        }
        match self.blocks.last() {
            Some(last) => last.compute_digest() == self.head_hash,
            None => self.head_hash.is_empty(),
        }
    }

    /// Re-establish structural consistency. Wherever a successor's pointer
    /// no longer matches its predecessor's recomputed digest, the
    /// predecessor is re-mined under its current payload and the pointer
    /// rewired; a stale head hash is re-mined the same way. This is a
    /// "make consistent" pass, not an audit: it neither detects nor
    /// reports what changed.
    pub fn repair(&mut self) {
        for i in 0..self.blocks.len() {
            if i + 1 < self.blocks.len() {
                if self.blocks[i + 1].previous_hash != self.blocks[i].compute_digest() {
                    let mined = self.blocks[i].proof_of_work();
                    self.blocks[i + 1].previous_hash = mined;
                }
            } else if self.blocks[i].compute_digest() != self.head_hash {
                self.head_hash = self.blocks[i].proof_of_work();
            }
        }
    }

    /// Overwrite one block's payload in place, without re-mining. The sole
    /// intended way the ledger invariants can be broken; exists to exercise
    /// [`Ledger::is_valid`] and [`Ledger::repair`].
    pub fn tamper_block(&mut self, index: usize, new_payload: impl Into<String>) -> Result<&Block> {
        let block = self
            .blocks
            .get_mut(index)
            .ok_or_else(|| Error::BadRequest(format!("block index {} out of range", index)))?;
        block.payload = new_payload.into();
        Ok(&*block)
    }

    /// Count digests of a fixed input over a one-second wall-clock window.
    /// Advisory throughput number for the status view; blocks the caller
    /// for the full second.
    pub fn hashes_per_second(&self) -> u64 {
        let start = Instant::now();
        let mut count = 0u64;
        while start.elapsed() < Duration::from_secs(1) {
            let _ = crypto::sha256(BENCH_INPUT);
            count += 1;
        }
        count
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::json!({
            "blocks": self.blocks.iter().map(Block::to_json).collect::<Vec<_>>(),
            "head_hash": self.head_hash,
        });
        write!(f, "{}", rendered)
    }
}
