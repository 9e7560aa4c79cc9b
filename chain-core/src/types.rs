//! Core types for the chain
//!
//! - [`Block`]: a digest-linked ledger entry that owns its proof-of-work search
//! - [`Opcode`] / [`SignedCommand`]: the signed request envelope
//! - Per-opcode response views returned to callers

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto;

/// A single ledger entry, immutable once mined except through the explicit
/// tamper operation on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Position on the chain; genesis is 0.
    pub index: u64,

    /// Creation time; hashed via its canonical string form, so the
    /// rendering must stay byte-exact.
    pub created_at: DateTime<Utc>,

    /// Opaque transaction text.
    pub payload: String,

    /// Hex digest of the parent block; empty for genesis.
    pub previous_hash: String,

    /// Found by the proof-of-work search; arbitrary precision.
    pub nonce: BigUint,

    /// Required count of leading hex '0' characters in this block's digest.
    pub difficulty: u32,
}

impl Block {
    /// Create an unmined block. The previous-hash pointer and nonce are
    /// assigned by the ledger when the block is appended.
    pub fn new(index: u64, created_at: DateTime<Utc>, payload: impl Into<String>, difficulty: u32) -> Self {
        Self {
            index,
            created_at,
            payload: payload.into(),
            previous_hash: String::new(),
            nonce: BigUint::from(0u32),
            difficulty,
        }
    }

    /// Canonical timestamp rendering. Fixed-width milliseconds, UTC.
    pub fn canonical_timestamp(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }

    /// SHA-256 over the canonical concatenation of all six fields,
    /// hex-encoded lowercase.
    pub fn compute_digest(&self) -> String {
        let preimage = format!(
            "{},{},{},{},{},{}",
            self.index,
            self.canonical_timestamp(),
            self.payload,
            self.previous_hash,
            self.nonce,
            self.difficulty
        );
        crypto::sha256_hex(preimage.as_bytes())
    }

    /// Search for a nonce whose digest carries `difficulty` leading hex
    /// zeros. Starts from nonce 0, increments by 1, and does not give up:
    /// expected cost grows as 16^difficulty digest evaluations. Returns the
    /// qualifying digest, leaving the nonce at the winning value.
    pub fn proof_of_work(&mut self) -> String {
        self.nonce = BigUint::from(0u32);
        let target = "0".repeat(self.difficulty as usize);
        loop {
            let digest = self.compute_digest();
            if digest.starts_with(&target) {
                return digest;
            }
            self.nonce += 1u32;
        }
    }
}

impl Block {
    /// JSON view used by the ledger dump.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "index": self.index,
            "timestamp": self.canonical_timestamp(),
            "payload": self.payload,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce.to_string(),
            "difficulty": self.difficulty,
        })
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// The six remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    /// Read chain size, hash rate, and tip metadata.
    Status,
    /// Derive a DID from the supplied key material and append a block.
    Append,
    /// Run the full-chain validity scan.
    Validate,
    /// Render the entire ledger.
    Dump,
    /// Overwrite one block's payload in place.
    Tamper,
    /// Re-mine the chain back to structural consistency.
    Repair,
}

impl Opcode {
    /// Wire name; also the form hashed into the signed message.
    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::Status => "status",
            Opcode::Append => "append",
            Opcode::Validate => "validate",
            Opcode::Dump => "dump",
            Opcode::Tamper => "tamper",
            Opcode::Repair => "repair",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The request envelope. Big integers travel as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedCommand {
    /// Claimed short identity (40 lowercase hex characters).
    pub identity: String,

    /// Public exponent, decimal.
    pub exponent: String,

    /// Modulus, decimal.
    pub modulus: String,

    /// Operand: key material for append, new payload for tamper, a fixed
    /// placeholder for the operand-less opcodes.
    pub operand: String,

    /// RSA signature over the canonical message, decimal.
    pub signature: String,

    /// Requested operation.
    pub opcode: Opcode,

    /// Required leading hex zeros for append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u32>,

    /// Target block for tamper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl SignedCommand {
    /// The exact byte sequence a caller signs. Exponent and modulus appear
    /// in canonical decimal with a single `;` between them; the numeric
    /// difficulty/index fields are not part of the message.
    pub fn canonical_message(
        identity: &str,
        exponent: &BigUint,
        modulus: &BigUint,
        operand: &str,
        opcode: Opcode,
    ) -> String {
        format!("{}{};{}{}{}", identity, exponent, modulus, operand, opcode.as_str())
    }
}

/// Result of the status opcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusView {
    /// Number of blocks, genesis included.
    pub size: u64,
    /// Digests per second measured over a one-second window.
    pub hash_rate: u64,
    /// Difficulty of the most recent block.
    pub difficulty: u32,
    /// Nonce of the most recent block, decimal.
    pub nonce: String,
    /// Digest of the current tip.
    pub head_hash: String,
}

/// Result of the append opcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendOutcome {
    /// DID derived from the supplied key material.
    pub did: String,
    /// The payload actually stored: `material,did`.
    pub payload: String,
    /// Wall-clock time spent appending, proof-of-work included.
    pub elapsed_ms: u64,
}

/// Result of the validate opcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Whether every hash pointer and the head hash check out.
    pub valid: bool,
    /// Wall-clock time spent scanning.
    pub elapsed_ms: u64,
}

/// Result of the dump opcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpView {
    /// Full textual rendering of the ledger.
    pub ledger: String,
}

/// Result of the tamper opcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperOutcome {
    /// The payload now held by the target block.
    pub payload: String,
}

/// Result of the repair opcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairOutcome {
    /// Wall-clock time spent re-mining.
    pub elapsed_ms: u64,
}
