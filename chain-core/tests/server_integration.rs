//! End-to-end TCP tests
//!
//! Each test boots the full stack (mined genesis, ledger actor, dispatcher,
//! TCP server on an ephemeral port) and drives it the way the client does:
//! one signed JSON line per connection, one JSON line back.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use chain_core::actor::spawn_ledger_actor;
use chain_core::command::CommandDispatcher;
use chain_core::crypto::RsaKeyPair;
use chain_core::metrics::Metrics;
use chain_core::server::ChainServer;
use chain_core::types::{Opcode, SignedCommand};
use chain_core::{Block, Config, Ledger};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

fn session_keypair() -> &'static RsaKeyPair {
    static KEYPAIR: OnceLock<RsaKeyPair> = OnceLock::new();
    KEYPAIR.get_or_init(|| RsaKeyPair::generate(256).unwrap())
}

/// Boot a server over a fresh genesis chain; returns its bound address.
async fn start_server() -> SocketAddr {
    let config = Config {
        listen_addr: "127.0.0.1:0".to_string(),
        ..Config::default()
    };

    let mut ledger = Ledger::new();
    ledger.append_block(Block::new(0, chrono::Utc::now(), "Genesis", 2));

    let metrics = Arc::new(Metrics::new().unwrap());
    let handle = spawn_ledger_actor(ledger);
    let dispatcher = CommandDispatcher::new(handle, metrics.clone());

    let server = ChainServer::bind(&config, dispatcher, metrics).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());
    addr
}

fn sign_command(
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

/// One request, one response, connection closed.
async fn round_trip(addr: SocketAddr, line: &str) -> serde_json::Value {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();

    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    writer.flush().await.unwrap();

    let mut reply = String::new();
    BufReader::new(reader).read_line(&mut reply).await.unwrap();
    serde_json::from_str(&reply).unwrap()
}

async fn send(addr: SocketAddr, cmd: &SignedCommand) -> serde_json::Value {
    round_trip(addr, &serde_json::to_string(cmd).unwrap()).await
}

#[tokio::test]
async fn test_status_round_trip() {
    let addr = start_server().await;
    let keypair = session_keypair();

    let reply = send(addr, &sign_command(keypair, Opcode::Status, "value", None, None)).await;
    assert_eq!(reply["size"], 1);
    assert!(reply["hash_rate"].as_u64().unwrap() > 0);
    assert_eq!(reply["difficulty"], 2);
    assert!(reply["head_hash"].as_str().unwrap().starts_with("00"));
}

#[tokio::test]
async fn test_append_validate_dump() {
    let addr = start_server().await;
    let keypair = session_keypair();

    let reply = send(
        addr,
        &sign_command(keypair, Opcode::Append, "alice-key", Some(1), None),
    )
    .await;
    let did = reply["did"].as_str().unwrap();
    assert_eq!(did.len(), 40);
    assert_eq!(reply["payload"], format!("alice-key,{}", did));

    let reply = send(addr, &sign_command(keypair, Opcode::Validate, "value", None, None)).await;
    assert_eq!(reply["valid"], true);

    let reply = send(addr, &sign_command(keypair, Opcode::Dump, "value", None, None)).await;
    let ledger: serde_json::Value =
        serde_json::from_str(reply["ledger"].as_str().unwrap()).unwrap();
    assert_eq!(ledger["blocks"].as_array().unwrap().len(), 2);
    assert!(ledger["blocks"][1]["payload"]
        .as_str()
        .unwrap()
        .starts_with("alice-key,"));
}

#[tokio::test]
async fn test_tamper_repair_cycle() {
    let addr = start_server().await;
    let keypair = session_keypair();

    send(
        addr,
        &sign_command(keypair, Opcode::Append, "alice-key", Some(1), None),
    )
    .await;

    let reply = send(
        addr,
        &sign_command(keypair, Opcode::Tamper, "mallory", None, Some(0)),
    )
    .await;
    assert_eq!(reply["payload"], "mallory");

    let reply = send(addr, &sign_command(keypair, Opcode::Validate, "value", None, None)).await;
    assert_eq!(reply["valid"], false);

    let reply = send(addr, &sign_command(keypair, Opcode::Repair, "value", None, None)).await;
    assert!(reply["elapsed_ms"].is_u64());

    let reply = send(addr, &sign_command(keypair, Opcode::Validate, "value", None, None)).await;
    assert_eq!(reply["valid"], true);
}

#[tokio::test]
async fn test_opcode_replay_is_rejected() {
    let addr = start_server().await;
    let keypair = session_keypair();

    // Signed for append, resent as tamper.
    let mut cmd = sign_command(keypair, Opcode::Append, "alice-key", Some(1), None);
    cmd.opcode = Opcode::Tamper;
    cmd.difficulty = None;
    cmd.index = Some(0);

    let reply = send(addr, &cmd).await;
    assert!(reply["error"].as_str().unwrap().contains("unauthorized"));

    // The ledger was left untouched.
    let reply = send(addr, &sign_command(keypair, Opcode::Dump, "value", None, None)).await;
    let ledger: serde_json::Value =
        serde_json::from_str(reply["ledger"].as_str().unwrap()).unwrap();
    assert_eq!(ledger["blocks"].as_array().unwrap().len(), 1);
    assert_eq!(ledger["blocks"][0]["payload"], "Genesis");
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let addr = start_server().await;
    let keypair = session_keypair();

    let mut cmd = sign_command(keypair, Opcode::Append, "intruder-key", Some(1), None);
    cmd.signature = "12345".to_string();

    let reply = send(addr, &cmd).await;
    assert!(reply["error"].as_str().unwrap().contains("unauthorized"));
}

#[tokio::test]
async fn test_malformed_request_gets_error_reply() {
    let addr = start_server().await;

    let reply = round_trip(addr, "this is not json").await;
    assert!(reply["error"].as_str().unwrap().contains("bad request"));

    // The server keeps serving after a malformed request.
    let keypair = session_keypair();
    let reply = send(addr, &sign_command(keypair, Opcode::Validate, "value", None, None)).await;
    assert_eq!(reply["valid"], true);
}

#[tokio::test]
async fn test_missing_difficulty_is_bad_request() {
    let addr = start_server().await;
    let keypair = session_keypair();

    let reply = send(addr, &sign_command(keypair, Opcode::Append, "alice-key", None, None)).await;
    assert!(reply["error"].as_str().unwrap().contains("difficulty"));
}
