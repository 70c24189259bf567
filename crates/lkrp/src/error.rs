//! Error types for trustchain operations.

use lkrp_core::{CryptoError, ParseError};
use thiserror::Error;

/// Errors that can occur while loading or using a trustchain.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// Codec error outside any particular stream.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Crypto backend error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The server response is not a JSON object of strings.
    #[error("invalid server response: {0}")]
    Response(#[from] serde_json::Error),

    /// A stream's payload is not valid hex.
    #[error("stream {path} is not valid hex: {source}")]
    InvalidHex {
        path: String,
        source: hex::FromHexError,
    },

    /// A stream's bytes do not parse as blocks.
    #[error("stream {path} is malformed: {source}")]
    MalformedStream { path: String, source: ParseError },

    /// A stream parses but its chain does not link up.
    #[error("stream {path} failed validation")]
    InvalidStream { path: String },

    /// No stream at the requested path.
    #[error("stream not found: {0}")]
    StreamNotFound(String),
}

/// Result type for trustchain operations.
pub type Result<T> = std::result::Result<T, KeyringError>;
