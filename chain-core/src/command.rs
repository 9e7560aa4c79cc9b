//! Command authorization and dispatch
//!
//! Every inbound request passes two checks before any ledger method runs:
//! identity binding (the claimed identity must re-derive from the claimed
//! public key material) and signature verification over the canonical
//! message. Either check failing alone rejects the request and leaves the
//! ledger untouched. Authorized requests dispatch to the matching ledger
//! operation through the actor handle, timed where the response requires it.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use num_bigint::BigUint;
use serde::Serialize;

use crate::actor::LedgerHandle;
use crate::crypto;
use crate::metrics::Metrics;
use crate::types::{
    AppendOutcome, DumpView, Opcode, RepairOutcome, SignedCommand, StatusView, TamperOutcome,
    ValidationOutcome,
};
use crate::{Error, Result};

/// Failure reply: a single error field.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReply {
    /// Human-readable reason.
    pub error: String,
}

/// What goes back over the wire, one JSON object per request.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    /// Status result
    Status(StatusView),
    /// Append result
    Append(AppendOutcome),
    /// Validate result
    Validation(ValidationOutcome),
    /// Dump result
    Dump(DumpView),
    /// Tamper result
    Tamper(TamperOutcome),
    /// Repair result
    Repair(RepairOutcome),
    /// Any failure
    Error(ErrorReply),
}

impl CommandReply {
    /// Build a failure reply.
    pub fn error(reason: impl Into<String>) -> Self {
        CommandReply::Error(ErrorReply {
            error: reason.into(),
        })
    }
}

/// Authorizes commands and routes them to the ledger actor.
#[derive(Clone)]
pub struct CommandDispatcher {
    handle: LedgerHandle,
    metrics: Arc<Metrics>,
}

impl CommandDispatcher {
    /// Create a dispatcher over an actor handle.
    pub fn new(handle: LedgerHandle, metrics: Arc<Metrics>) -> Self {
        Self { handle, metrics }
    }

    /// Authorize and run one command, converting every failure into an
    /// error reply at this boundary. Never panics the caller's task.
    pub async fn execute(&self, cmd: SignedCommand) -> CommandReply {
        match self.try_execute(&cmd).await {
            Ok(reply) => reply,
            Err(err) => {
                match &err {
                    Error::Unauthorized(reason) => {
                        self.metrics.record_unauthorized();
                        tracing::warn!(opcode = %cmd.opcode, %reason, "request rejected");
                    }
                    Error::BadRequest(reason) => {
                        tracing::warn!(opcode = %cmd.opcode, %reason, "malformed request");
                    }
                    other => {
                        tracing::error!(opcode = %cmd.opcode, error = %other, "request failed");
                    }
                }
                CommandReply::error(err.client_reply())
            }
        }
    }

    async fn try_execute(&self, cmd: &SignedCommand) -> Result<CommandReply> {
        authorize(cmd)?;

        match cmd.opcode {
            Opcode::Status => Ok(CommandReply::Status(self.handle.status().await?)),

            Opcode::Append => {
                let difficulty = cmd
                    .difficulty
                    .ok_or_else(|| Error::BadRequest("append requires a difficulty".to_string()))?;
                let did = crypto::derive_identity(&cmd.operand);
                let payload = format!("{},{}", cmd.operand, did);

                let start = Instant::now();
                self.handle.append(payload.clone(), difficulty).await?;
                self.metrics.record_block();

                Ok(CommandReply::Append(AppendOutcome {
                    did,
                    payload,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }))
            }

            Opcode::Validate => {
                let start = Instant::now();
                let valid = self.handle.validate().await?;
                Ok(CommandReply::Validation(ValidationOutcome {
                    valid,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }))
            }

            Opcode::Dump => Ok(CommandReply::Dump(DumpView {
                ledger: self.handle.dump().await?,
            })),

            Opcode::Tamper => {
                let index = cmd
                    .index
                    .ok_or_else(|| Error::BadRequest("tamper requires a block index".to_string()))?;
                let payload = self.handle.tamper(index, cmd.operand.clone()).await?;
                Ok(CommandReply::Tamper(TamperOutcome { payload }))
            }

            Opcode::Repair => {
                let start = Instant::now();
                self.handle.repair().await?;
                Ok(CommandReply::Repair(RepairOutcome {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }))
            }
        }
    }
}

/// Run both authorization checks. The identity must re-derive from the
/// claimed key material, and the signature must verify over the canonical
/// message; either failing alone is a rejection.
pub fn authorize(cmd: &SignedCommand) -> Result<()> {
    let exponent = parse_biguint("exponent", &cmd.exponent)?;
    let modulus = parse_biguint("modulus", &cmd.modulus)?;
    let signature = parse_biguint("signature", &cmd.signature)?;

    let bound = crypto::derive_identity(&format!("{}{}", exponent, modulus));
    if bound != cmd.identity {
        return Err(Error::Unauthorized(
            "identity does not match public key".to_string(),
        ));
    }

    let message =
        SignedCommand::canonical_message(&cmd.identity, &exponent, &modulus, &cmd.operand, cmd.opcode);
    if !crypto::verify(message.as_bytes(), &signature, &exponent, &modulus) {
        return Err(Error::Unauthorized("signature mismatch".to_string()));
    }

    Ok(())
}

fn parse_biguint(field: &str, value: &str) -> Result<BigUint> {
    BigUint::from_str(value)
        .map_err(|_| Error::BadRequest(format!("{} must be a base-10 integer", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_ledger_actor;
    use crate::crypto::RsaKeyPair;
    use crate::ledger::Ledger;
    use crate::types::Block;
    use chrono::Utc;
    use std::sync::OnceLock;

    fn test_keypair() -> &'static RsaKeyPair {
        static KEYPAIR: OnceLock<RsaKeyPair> = OnceLock::new();
        KEYPAIR.get_or_init(|| RsaKeyPair::generate(256).unwrap())
    }

    fn signed(
        keypair: &RsaKeyPair,
        opcode: Opcode,
        operand: &str,
        difficulty: Option<u32>,
        index: Option<usize>,
    ) -> SignedCommand {
        let identity = keypair.identity();
        let message = SignedCommand::canonical_message(
            &identity,
            keypair.public_exponent(),
            keypair.modulus(),
            operand,
            opcode,
        );
        let signature = keypair.sign(message.as_bytes());
        SignedCommand {
            identity,
            exponent: keypair.public_exponent().to_string(),
            modulus: keypair.modulus().to_string(),
            operand: operand.to_string(),
            signature: signature.to_string(),
            opcode,
            difficulty,
            index,
        }
    }

    fn dispatcher() -> CommandDispatcher {
        let mut ledger = Ledger::new();
        ledger.append_block(Block::new(0, Utc::now(), "Genesis", 2));
        let handle = spawn_ledger_actor(ledger);
        CommandDispatcher::new(handle, Arc::new(Metrics::new().unwrap()))
    }

    #[test]
    fn test_authorize_accepts_well_formed_command() {
        let cmd = signed(test_keypair(), Opcode::Validate, "value", None, None);
        assert!(authorize(&cmd).is_ok());
    }

    #[test]
    fn test_authorize_rejects_wrong_identity() {
        let mut cmd = signed(test_keypair(), Opcode::Validate, "value", None, None);
        cmd.identity = crypto::derive_identity("someone else");
        let err = authorize(&cmd).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_authorize_rejects_altered_opcode() {
        // Signed for append, replayed as tamper: the opcode is inside the
        // signed message, so verification fails.
        let mut cmd = signed(test_keypair(), Opcode::Append, "mallory-key", Some(1), None);
        cmd.opcode = Opcode::Tamper;
        cmd.index = Some(0);
        let err = authorize(&cmd).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_authorize_rejects_altered_operand() {
        let mut cmd = signed(test_keypair(), Opcode::Append, "alice-key", Some(1), None);
        cmd.operand = "mallory-key".to_string();
        assert!(matches!(authorize(&cmd).unwrap_err(), Error::Unauthorized(_)));
    }

    #[test]
    fn test_authorize_rejects_malformed_modulus() {
        let mut cmd = signed(test_keypair(), Opcode::Validate, "value", None, None);
        cmd.modulus = "not-a-number".to_string();
        assert!(matches!(authorize(&cmd).unwrap_err(), Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_append_and_validate_flow() {
        let dispatcher = dispatcher();
        let keypair = test_keypair();

        let reply = dispatcher
            .execute(signed(keypair, Opcode::Append, "alice-key", Some(1), None))
            .await;
        let expected_did = crypto::derive_identity("alice-key");
        match reply {
            CommandReply::Append(outcome) => {
                assert_eq!(outcome.did, expected_did);
                assert_eq!(outcome.payload, format!("alice-key,{}", expected_did));
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        let reply = dispatcher
            .execute(signed(keypair, Opcode::Validate, "value", None, None))
            .await;
        match reply {
            CommandReply::Validation(outcome) => assert!(outcome.valid),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tamper_then_repair_flow() {
        let dispatcher = dispatcher();
        let keypair = test_keypair();

        dispatcher
            .execute(signed(keypair, Opcode::Append, "alice-key", Some(1), None))
            .await;

        let reply = dispatcher
            .execute(signed(keypair, Opcode::Tamper, "mallory", None, Some(0)))
            .await;
        match reply {
            CommandReply::Tamper(outcome) => assert_eq!(outcome.payload, "mallory"),
            other => panic!("unexpected reply: {:?}", other),
        }

        let reply = dispatcher
            .execute(signed(keypair, Opcode::Validate, "value", None, None))
            .await;
        match reply {
            CommandReply::Validation(outcome) => assert!(!outcome.valid),
            other => panic!("unexpected reply: {:?}", other),
        }

        dispatcher
            .execute(signed(keypair, Opcode::Repair, "value", None, None))
            .await;

        let reply = dispatcher
            .execute(signed(keypair, Opcode::Validate, "value", None, None))
            .await;
        match reply {
            CommandReply::Validation(outcome) => assert!(outcome.valid),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_command_leaves_ledger_untouched() {
        let dispatcher = dispatcher();
        let keypair = test_keypair();

        let mut cmd = signed(keypair, Opcode::Append, "intruder-key", Some(1), None);
        cmd.signature = "12345".to_string();
        let reply = dispatcher.execute(cmd).await;
        match reply {
            CommandReply::Error(reply) => assert!(reply.error.contains("unauthorized")),
            other => panic!("unexpected reply: {:?}", other),
        }

        let reply = dispatcher
            .execute(signed(keypair, Opcode::Dump, "value", None, None))
            .await;
        match reply {
            CommandReply::Dump(view) => {
                let value: serde_json::Value = serde_json::from_str(&view.ledger).unwrap();
                assert_eq!(value["blocks"].as_array().unwrap().len(), 1);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_append_without_difficulty_is_bad_request() {
        let dispatcher = dispatcher();
        let reply = dispatcher
            .execute(signed(test_keypair(), Opcode::Append, "alice-key", None, None))
            .await;
        match reply {
            CommandReply::Error(reply) => assert!(reply.error.contains("difficulty")),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tamper_out_of_range_is_bad_request() {
        let dispatcher = dispatcher();
        let reply = dispatcher
            .execute(signed(test_keypair(), Opcode::Tamper, "x", None, Some(42)))
            .await;
        match reply {
            CommandReply::Error(reply) => assert!(reply.error.contains("out of range")),
            other => panic!("unexpected reply: {:?}", other),
        }
    }
}
