//! # LKRP Core
//!
//! Codec for the Ledger Key-Ring Protocol: a compact TLV format carrying
//! signed, hash-linked blocks that describe a key-ring's members and
//! encrypted key material.
//!
//! This crate performs no I/O and links no cryptographic backend. Hashing,
//! ECDH, AEAD and signature checks go through the [`CryptoService`] and
//! [`KeyPair`] traits.
//!
//! ## Layers
//!
//! - [`tlv`] - tag-length-value reader and writer
//! - [`Command`] - typed payloads (Seed, AddMember, PublishKey, Derive)
//! - [`Block`] - header, commands and signature; content-hashed
//! - [`BlockStream`] - chain of blocks; validation, path, membership,
//!   published-key recovery

pub mod block;
pub mod command;
pub mod crypto;
pub mod error;
pub mod path;
pub mod stream;
pub mod tags;
pub mod tlv;
pub mod types;

pub use block::{Block, BlockData, ParsedBlock};
pub use command::{
    AddMemberData, Command, CommandData, DeriveData, EncryptedPublishedKey, PublishKeyData,
    SeedData, UnsignedCommandData, OWNER_PERMISSIONS,
};
pub use crypto::{CryptoService, KeyPair};
pub use error::{CryptoError, ParseError, Result, TlvError};
pub use stream::{BlockStream, BlockTemplate};
pub use tags::{CommandTag, GeneralTag};
pub use tlv::{TlvReader, TlvValue, TlvWriter};
pub use types::{BlockHash, PublishedKey};
