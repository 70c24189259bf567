//! # LKRP Crypto
//!
//! Default cryptographic backend for the key-ring codec:
//!
//! - secp256k1 ECDSA (prehashed SHA-256, DER signatures) and ECDH
//! - SHA-256 and HMAC-SHA256
//! - AES-256-GCM with a 16-byte nonce
//! - OS randomness

pub mod keypair;
pub mod service;

pub use keypair::Secp256k1KeyPair;
pub use service::{seal_xpriv, NativeCryptoService, SealedKey};
