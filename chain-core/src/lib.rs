//! DID Chain Core
//!
//! Signature-gated proof-of-work ledger with short-identity derivation.
//!
//! # Architecture
//!
//! - **Digest-Linked Blocks**: every block carries the hash of its predecessor
//! - **Proof-of-Work**: appends are gated by a leading-zero nonce search
//! - **Single Writer**: one actor owns the ledger, so mutations never interleave
//! - **Signed Commands**: every remote operation requires identity binding
//!   plus an RSA signature over the canonical request
//!
//! # Invariants
//!
//! - Hash linkage: each successor's previous-hash equals its predecessor's digest
//! - Head hash: the running tip digest always matches the last block
//! - Mined-once: blocks are mined inside append; only the explicit tamper
//!   operation can break the linkage, and repair restores it

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod types;
pub mod ledger;
pub mod crypto;
pub mod error;
pub mod actor;
pub mod command;
pub mod server;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{Block, Opcode, SignedCommand};
pub use ledger::Ledger;
pub use config::Config;
