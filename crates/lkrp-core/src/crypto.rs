//! Cryptographic capabilities consumed by the codec.
//!
//! The codec never links a concrete backend. Blocks and streams hold an
//! `Arc<dyn CryptoService>`, and published-key recovery takes a
//! `&dyn KeyPair`. Both traits are async so a host backend may suspend.
//!
//! The free functions here are the byte conventions shared by every
//! backend: IV sizing, shared-secret slicing and DER signature framing.

use async_trait::async_trait;

use crate::error::CryptoError;

/// Length of the symmetric IV (used as a 16-byte AES-GCM nonce).
pub const IV_LEN: usize = 16;

/// Length of the symmetric key derived from an ECDH shared point.
pub const SHARED_KEY_LEN: usize = 32;

/// Length of a compressed secp256k1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Hashing, MAC, AEAD, randomness and signature verification.
#[async_trait]
pub trait CryptoService: Send + Sync {
    /// SHA-256 digest.
    async fn sha256(&self, data: &[u8]) -> [u8; 32];

    /// HMAC-SHA256.
    async fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Result<[u8; 32], CryptoError>;

    /// Fill a buffer of `len` bytes from a secure source.
    fn random_bytes(&self, len: usize) -> Vec<u8>;

    /// Fresh random keypair.
    fn generate_keypair(&self) -> Box<dyn KeyPair>;

    /// Keypair from a 32-byte secret scalar.
    fn keypair_from_secret(&self, secret: &[u8]) -> Result<Box<dyn KeyPair>, CryptoError>;

    /// AES-256-GCM encrypt. Output is ciphertext followed by the tag.
    async fn encrypt(
        &self,
        key: &[u8; SHARED_KEY_LEN],
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// AES-256-GCM decrypt of ciphertext followed by the tag.
    async fn decrypt(
        &self,
        key: &[u8; SHARED_KEY_LEN],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Verify a DER ECDSA signature over a 32-byte digest.
    async fn verify(
        &self,
        digest: &[u8; 32],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, CryptoError>;
}

/// A secp256k1 keypair able to sign and run ECDH.
#[async_trait]
pub trait KeyPair: Send + Sync {
    /// Compressed public key (33 bytes).
    fn public_key(&self) -> &[u8];

    fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// ECDH with a peer key. Returns the uncompressed SEC1 encoding of the
    /// shared point (`04 || x || y`).
    async fn derive_shared_secret(&self, peer_public_key: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Sign a 32-byte digest, returning a DER signature.
    async fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError>;
}

/// Fit an IV of any length to [`IV_LEN`] bytes: truncate or zero-pad.
pub fn normalize_iv(iv: &[u8]) -> [u8; IV_LEN] {
    let mut out = [0u8; IV_LEN];
    let n = iv.len().min(IV_LEN);
    out[..n].copy_from_slice(&iv[..n]);
    out
}

/// Symmetric key from an ECDH shared point: skip the SEC1 format byte and
/// take the x-coordinate.
pub fn shared_key(shared_point: &[u8]) -> Result<[u8; SHARED_KEY_LEN], CryptoError> {
    if shared_point.len() < 1 + SHARED_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: 1 + SHARED_KEY_LEN,
            actual: shared_point.len(),
        });
    }
    let mut key = [0u8; SHARED_KEY_LEN];
    key.copy_from_slice(&shared_point[1..1 + SHARED_KEY_LEN]);
    Ok(key)
}

/// DER-encode an `(r, s)` pair as `SEQUENCE { INTEGER r, INTEGER s }`.
///
/// Leading zeros are stripped and a `0x00` is prepended when the high bit
/// of the first remaining byte is set.
pub fn encode_der_signature(r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
    let r = der_integer(r);
    let s = der_integer(s);
    let mut out = Vec::with_capacity(6 + r.len() + s.len());
    out.push(0x30);
    out.push((4 + r.len() + s.len()) as u8);
    out.push(0x02);
    out.push(r.len() as u8);
    out.extend_from_slice(&r);
    out.push(0x02);
    out.push(s.len() as u8);
    out.extend_from_slice(&s);
    out
}

fn der_integer(value: &[u8; 32]) -> Vec<u8> {
    let start = value.iter().position(|b| *b != 0).unwrap_or(value.len() - 1);
    let trimmed = &value[start..];
    let mut out = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

/// Decode a DER signature into fixed-width `(r, s)`.
pub fn decode_der_signature(der: &[u8]) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let invalid = |why: &str| CryptoError::InvalidSignature(why.to_string());

    if der.len() < 8 || der[0] != 0x30 {
        return Err(invalid("not a DER sequence"));
    }
    if der[1] as usize != der.len() - 2 {
        return Err(invalid("sequence length mismatch"));
    }
    let (r, rest) = read_der_integer(&der[2..]).ok_or_else(|| invalid("bad r"))?;
    let (s, rest) = read_der_integer(rest).ok_or_else(|| invalid("bad s"))?;
    if !rest.is_empty() {
        return Err(invalid("trailing bytes"));
    }
    Ok((r, s))
}

fn read_der_integer(data: &[u8]) -> Option<([u8; 32], &[u8])> {
    if data.len() < 2 || data[0] != 0x02 {
        return None;
    }
    let len = data[1] as usize;
    let body = data.get(2..2 + len)?;
    let rest = &data[2 + len..];
    let digits = match body {
        [0x00, tail @ ..] if !tail.is_empty() => tail,
        _ => body,
    };
    if digits.is_empty() || digits.len() > 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - digits.len()..].copy_from_slice(digits);
    Some((out, rest))
}
