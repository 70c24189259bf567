//! # LKRP
//!
//! The Ledger Key-Ring Protocol: signed, hash-linked blocks describing the
//! members of a key-ring and the key material encrypted for them.
//!
//! ## Overview
//!
//! - **Command**: a typed TLV payload (Seed, AddMember, PublishKey, Derive)
//! - **Block**: a parent hash, an issuer, commands and a signature
//! - **BlockStream**: blocks concatenated; each cites the previous hash
//! - **Trustchain**: streams keyed by path, `m/` for the root and
//!   `m/{appId}'` per application
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lkrp::{NativeCryptoService, Secp256k1KeyPair, Trustchain, TrustchainConfig};
//!
//! async fn example(response: &str) -> lkrp::Result<()> {
//!     let crypto = Arc::new(NativeCryptoService);
//!     let trustchain =
//!         Trustchain::from_response(crypto, "my-trustchain", response, TrustchainConfig::default())
//!             .await?;
//!
//!     let me = Secp256k1KeyPair::from_secret(&[0x11; 32])?;
//!     if let Some(key) = trustchain.published_key(16, &me).await? {
//!         println!("chain code: {}", hex::encode(&key.chain_code));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `lkrp::core` - TLV codec, commands, blocks, streams
//! - `lkrp::crypto` - secp256k1 / AES-GCM backend

pub mod config;
pub mod error;
pub mod trustchain;

// Re-export component crates
pub use lkrp_core as core;
pub use lkrp_crypto as crypto;

pub use config::TrustchainConfig;
pub use error::{KeyringError, Result};
pub use trustchain::{app_path, Trustchain, ROOT_PATH};

// Re-export commonly used types
pub use lkrp_core::{
    Block, BlockHash, BlockStream, Command, CommandData, CryptoService, KeyPair, ParseError,
    PublishedKey,
};
pub use lkrp_crypto::{NativeCryptoService, Secp256k1KeyPair};
