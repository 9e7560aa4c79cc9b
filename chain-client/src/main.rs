//! Interactive menu client for the chain server
//!
//! Generates a session keypair at startup, signs every request with it, and
//! renders the server's per-opcode responses. Deliberately synchronous: the
//! protocol is one request and one response per connection, driven from a
//! prompt loop.

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

use anyhow::{Context, Result};
use chain_core::crypto::RsaKeyPair;
use chain_core::types::{Opcode, SignedCommand};

/// Prime size for session keypairs. Larger than the test keys, still far
/// from production grade.
const SESSION_PRIME_BITS: usize = 512;

const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:7777";

/// Operand sent with the opcodes that carry no caller data.
const PLACEHOLDER_OPERAND: &str = "value";

fn main() -> Result<()> {
    let addr =
        std::env::var("CHAIN_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string());

    println!("Generating session keypair...");
    let keypair = RsaKeyPair::generate(SESSION_PRIME_BITS)?;
    println!("Session identity: {}", keypair.identity());

    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        println!();
        println!("0. View basic chain status.");
        println!("1. Add a public key and DID to the chain. The DID is computed, not entered.");
        println!("2. Verify the chain.");
        println!("3. View the chain.");
        println!("4. Corrupt the chain.");
        println!("5. Hide the corruption by recomputing hashes.");
        println!("6. Exit.");

        let choice = read_trimmed(&mut input)?;
        match choice.as_str() {
            "0" => run_status(&addr, &keypair)?,
            "1" => run_append(&addr, &keypair, &mut input)?,
            "2" => run_validate(&addr, &keypair)?,
            "3" => run_dump(&addr, &keypair)?,
            "4" => run_tamper(&addr, &keypair, &mut input)?,
            "5" => run_repair(&addr, &keypair)?,
            "6" => {
                println!("Client side quitting. The chain server is still running.");
                return Ok(());
            }
            other => println!("Unknown option: {}", other),
        }
    }
}

fn run_status(addr: &str, keypair: &RsaKeyPair) -> Result<()> {
    let cmd = build_command(keypair, Opcode::Status, PLACEHOLDER_OPERAND, None, None);
    let reply = exchange(addr, &cmd)?;
    if let Some(error) = reply["error"].as_str() {
        println!("{}", error);
        return Ok(());
    }
    println!("Chain status");
    println!("Current size of chain: {}", reply["size"]);
    println!("Current hashes per second by this machine: {}", reply["hash_rate"]);
    println!("Difficulty of most recent block: {}", reply["difficulty"]);
    println!("Nonce for most recent block: {}", field_str(&reply, "nonce"));
    println!("Head hash: {}", field_str(&reply, "head_hash"));
    Ok(())
}

fn run_append(addr: &str, keypair: &RsaKeyPair, input: &mut impl BufRead) -> Result<()> {
    println!("Add a public key and decentralized identifier to the chain");
    println!("Enter difficulty > 0 of this block");
    let difficulty: u32 = match read_trimmed(input)?.parse() {
        Ok(value) => value,
        Err(_) => {
            println!("Difficulty must be a non-negative integer.");
            return Ok(());
        }
    };
    println!("Enter RSA modulus (public key) in base 10");
    let material = read_trimmed(input)?;
    println!("Public key: {}", material);

    let cmd = build_command(keypair, Opcode::Append, &material, Some(difficulty), None);
    let reply = exchange(addr, &cmd)?;
    if let Some(error) = reply["error"].as_str() {
        println!("{}", error);
        return Ok(());
    }
    println!(
        "This is the computed decentralized identifier (DID): {}",
        field_str(&reply, "did")
    );
    println!("Adding {}", field_str(&reply, "payload"));
    println!(
        "Total execution time to add this block was {} milliseconds",
        reply["elapsed_ms"]
    );
    Ok(())
}

fn run_validate(addr: &str, keypair: &RsaKeyPair) -> Result<()> {
    println!("Verifying entire chain");
    let cmd = build_command(keypair, Opcode::Validate, PLACEHOLDER_OPERAND, None, None);
    let reply = exchange(addr, &cmd)?;
    if let Some(error) = reply["error"].as_str() {
        println!("{}", error);
        return Ok(());
    }
    println!("Chain verification: {}", reply["valid"]);
    println!(
        "Total execution time required to verify the chain was {} milliseconds",
        reply["elapsed_ms"]
    );
    Ok(())
}

fn run_dump(addr: &str, keypair: &RsaKeyPair) -> Result<()> {
    println!("View the chain");
    let cmd = build_command(keypair, Opcode::Dump, PLACEHOLDER_OPERAND, None, None);
    let reply = exchange(addr, &cmd)?;
    if let Some(error) = reply["error"].as_str() {
        println!("{}", error);
        return Ok(());
    }
    println!("{}", field_str(&reply, "ledger"));
    Ok(())
}

fn run_tamper(addr: &str, keypair: &RsaKeyPair, input: &mut impl BufRead) -> Result<()> {
    println!("Corrupt the chain");
    println!("Enter block ID of block to corrupt");
    let index: usize = match read_trimmed(input)?.parse() {
        Ok(value) => value,
        Err(_) => {
            println!("Block ID must be a non-negative integer.");
            return Ok(());
        }
    };
    println!("Enter new data for block {}", index);
    println!("Enter new public key followed by a comma followed by a new DID");
    let new_data = read_trimmed(input)?;

    let cmd = build_command(keypair, Opcode::Tamper, &new_data, None, Some(index));
    let reply = exchange(addr, &cmd)?;
    if let Some(error) = reply["error"].as_str() {
        println!("{}", error);
        return Ok(());
    }
    println!("Block {} now holds {}", index, field_str(&reply, "payload"));
    Ok(())
}

fn run_repair(addr: &str, keypair: &RsaKeyPair) -> Result<()> {
    println!("Repairing the entire chain");
    let cmd = build_command(keypair, Opcode::Repair, PLACEHOLDER_OPERAND, None, None);
    let reply = exchange(addr, &cmd)?;
    if let Some(error) = reply["error"].as_str() {
        println!("{}", error);
        return Ok(());
    }
    println!(
        "Total execution time required to repair the chain was {} milliseconds",
        reply["elapsed_ms"]
    );
    Ok(())
}

/// Sign the canonical message and assemble the wire envelope.
fn build_command(
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
fn exchange(addr: &str, cmd: &SignedCommand) -> Result<serde_json::Value> {
    let stream = TcpStream::connect(addr).with_context(|| format!("connecting to {}", addr))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    serde_json::to_writer(&mut writer, cmd)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    let mut reply = String::new();
    reader
        .read_line(&mut reply)
        .context("reading server reply")?;
    serde_json::from_str(&reply).context("parsing server reply")
}

fn read_trimmed(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn field_str<'a>(reply: &'a serde_json::Value, field: &str) -> &'a str {
    reply[field].as_str().unwrap_or("")
}
