//! Error types for the LKRP core codec.

use thiserror::Error;

use crate::tags::GeneralTag;

/// Structural TLV errors. Every variant carries the byte offset where the
/// problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    #[error("unexpected end of TLV at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("invalid end of TLV at offset {offset}, expected length")]
    MissingLength { offset: usize },

    #[error("invalid end of TLV value at offset {offset}: expected {expected} bytes, {available} available")]
    TruncatedValue {
        offset: usize,
        expected: usize,
        available: usize,
    },

    #[error("invalid null length {length} at offset {offset}")]
    InvalidNullLength { offset: usize, length: u8 },

    #[error("unsupported integer length {length} at offset {offset}")]
    UnsupportedIntegerLength { offset: usize, length: u8 },

    #[error("empty string value at offset {offset}")]
    EmptyString { offset: usize },

    #[error("invalid utf-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("expected {expected} at offset {offset}, found tag 0x{found:02x}")]
    UnexpectedTag {
        offset: usize,
        expected: GeneralTag,
        found: u8,
    },

    #[error("value of {length} bytes for tag 0x{tag:02x} exceeds 255 bytes")]
    ValueTooLong { tag: u8, length: usize },
}

/// Errors raised while interpreting commands, blocks and streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no data")]
    NoData,

    #[error(transparent)]
    Tlv(#[from] TlvError),

    #[error("failed to read {field}: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: TlvError,
    },

    #[error("{field} at offset {offset} is out of range: {value}")]
    IntOutOfRange {
        field: &'static str,
        offset: usize,
        value: u32,
    },

    #[error("invalid command type: 0x{0:02x}")]
    InvalidCommandType(u8),

    #[error("unsupported command type: 0x{0:02x}")]
    UnsupportedCommandType(u8),

    #[error("{count} trailing bytes at offset {offset}")]
    TrailingBytes { offset: usize, count: usize },

    #[error("a block holds at most 255 commands, got {0}")]
    TooManyCommands(usize),

    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for ParseError {
    fn from(e: hex::FromHexError) -> Self {
        ParseError::InvalidHex(e.to_string())
    }
}

/// Errors raised by a cryptographic capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("decryption error: {0}")]
    DecryptionError(String),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, ParseError>;
