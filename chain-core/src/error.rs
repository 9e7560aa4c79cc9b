//! Error types for the chain

use thiserror::Error;

/// Result type for chain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chain errors
#[derive(Error, Debug)]
pub enum Error {
    /// Identity binding or signature check failed
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Missing or malformed request field
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Key generation or other cryptographic failure
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Actor mailbox closed or reply dropped
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Message surfaced to remote callers. Rejections explain themselves;
    /// internal failures are reported generically and the detail stays in
    /// the server log.
    pub fn client_reply(&self) -> String {
        match self {
            Error::Unauthorized(_) | Error::BadRequest(_) => self.to_string(),
            _ => "internal error".to_string(),
        }
    }
}
