//! Cryptographic operations for the chain
//!
//! This module provides:
//! - RSA-style keypair generation from probable primes
//! - Short-digest signing and verification over big integers
//! - Short-identity (DID) derivation from public key material
//! - SHA-256 hashing helpers used by blocks and the ledger

use crate::{Error, Result};
use glass_pumpkin::prime;
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

/// Public exponent used by every keypair.
pub const PUBLIC_EXPONENT: u32 = 65537;

/// Identities are the trailing 20 bytes of a SHA-256 digest.
const IDENTITY_BYTES: usize = 20;

/// Signatures cover only this many leading digest bytes; see
/// [`short_digest_integer`].
const SIGN_DIGEST_BYTES: usize = 31;

/// Hash arbitrary bytes using SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256, hex-encoded lowercase.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derive the short identity for a piece of public key material: the last
/// 20 bytes of its SHA-256 digest, hex-encoded lowercase.
///
/// For a keypair the material is the decimal public exponent immediately
/// followed by the decimal modulus. The append operation applies the same
/// derivation to the operand string as supplied.
pub fn derive_identity(material: &str) -> String {
    let digest = sha256(material.as_bytes());
    hex::encode(&digest[digest.len() - IDENTITY_BYTES..])
}

/// The integer actually signed: a zero guard byte keeps the value
/// non-negative, and only the leading 31 digest bytes participate; the
/// final digest byte is never copied, so the integer is always a multiple
/// of 256 and fits below any modulus of 512 bits or more.
fn short_digest_integer(message: &[u8]) -> BigUint {
    let digest = sha256(message);
    let mut buf = [0u8; SIGN_DIGEST_BYTES + 2];
    buf[1..=SIGN_DIGEST_BYTES].copy_from_slice(&digest[..SIGN_DIGEST_BYTES]);
    BigUint::from_bytes_be(&buf)
}

/// RSA keypair over probable primes.
#[derive(Debug, Clone)]
pub struct RsaKeyPair {
    modulus: BigUint,
    public_exponent: BigUint,
    private_exponent: BigUint,
}

impl RsaKeyPair {
    /// Generate a keypair from two independent probable primes of
    /// `prime_bits` bits each (so the modulus is roughly twice that). If
    /// the fixed public exponent has no inverse modulo the totient, both
    /// primes are discarded and freshly drawn.
    pub fn generate(prime_bits: usize) -> Result<Self> {
        let e = BigUint::from(PUBLIC_EXPONENT);
        loop {
            let p = prime::new(prime_bits).map_err(|err| Error::Crypto(err.to_string()))?;
            let q = prime::new(prime_bits).map_err(|err| Error::Crypto(err.to_string()))?;
            if p == q {
                continue;
            }
            let modulus = &p * &q;
            let totient = (&p - 1u32) * (&q - 1u32);
            match e.modinv(&totient) {
                Some(private_exponent) => {
                    return Ok(Self {
                        modulus,
                        public_exponent: e,
                        private_exponent,
                    })
                }
                None => continue,
            }
        }
    }

    /// The modulus.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// The public exponent (always 65537).
    pub fn public_exponent(&self) -> &BigUint {
        &self.public_exponent
    }

    /// Short identity bound to this keypair.
    pub fn identity(&self) -> String {
        derive_identity(&format!("{}{}", self.public_exponent, self.modulus))
    }

    /// Sign a message with the private exponent.
    pub fn sign(&self, message: &[u8]) -> BigUint {
        short_digest_integer(message).modpow(&self.private_exponent, &self.modulus)
    }

    /// Verify a signature against this keypair's public half.
    pub fn verify(&self, message: &[u8], signature: &BigUint) -> bool {
        verify(message, signature, &self.public_exponent, &self.modulus)
    }
}

/// Verify a signature with explicit public key material.
pub fn verify(message: &[u8], signature: &BigUint, public_exponent: &BigUint, modulus: &BigUint) -> bool {
    signature.modpow(public_exponent, modulus) == short_digest_integer(message)
}
