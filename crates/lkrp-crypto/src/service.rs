//! Native crypto backend.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

use lkrp_core::crypto::{normalize_iv, shared_key, CryptoService, KeyPair, IV_LEN, SHARED_KEY_LEN};
use lkrp_core::CryptoError;

use crate::keypair::{parse_public_key, Secp256k1KeyPair};

/// AES-256-GCM with a 16-byte nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

type HmacSha256 = Hmac<Sha256>;

/// [`CryptoService`] over RustCrypto primitives and the OS RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCryptoService;

impl NativeCryptoService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CryptoService for NativeCryptoService {
    async fn sha256(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    async fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Result<[u8; 32], CryptoError> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
                expected: 64,
                actual: key.len(),
            })?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().into())
    }

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    fn generate_keypair(&self) -> Box<dyn KeyPair> {
        Box::new(Secp256k1KeyPair::generate())
    }

    fn keypair_from_secret(&self, secret: &[u8]) -> Result<Box<dyn KeyPair>, CryptoError> {
        Ok(Box::new(Secp256k1KeyPair::from_secret(secret)?))
    }

    async fn encrypt(
        &self,
        key: &[u8; SHARED_KEY_LEN],
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm16::new_from_slice(key)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;
        cipher
            .encrypt(Nonce::<U16>::from_slice(iv), plaintext)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))
    }

    async fn decrypt(
        &self,
        key: &[u8; SHARED_KEY_LEN],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm16::new_from_slice(key)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))?;
        cipher
            .decrypt(Nonce::<U16>::from_slice(iv), ciphertext)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))
    }

    async fn verify(
        &self,
        digest: &[u8; 32],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, CryptoError> {
        let key = VerifyingKey::from(parse_public_key(public_key)?);
        let signature = Signature::from_der(signature)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        // Chains may carry high-s signatures; verification is over low-s.
        let signature = signature.normalize_s().unwrap_or(signature);
        let valid = key.verify_prehash(digest, &signature).is_ok();
        if !valid {
            debug!(issuer = %hex::encode(public_key), "signature does not verify");
        }
        Ok(valid)
    }
}

/// Key material encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedKey {
    pub initialization_vector: Vec<u8>,
    pub encrypted_xpriv: Vec<u8>,
    pub ephemeral_public_key: Vec<u8>,
}

/// Encrypt an extended private key for `recipient` under a fresh
/// ephemeral key. The inverse of published-key recovery on a stream.
pub async fn seal_xpriv(
    crypto: &dyn CryptoService,
    recipient: &[u8],
    xpriv: &[u8],
) -> Result<SealedKey, CryptoError> {
    let ephemeral = crypto.generate_keypair();
    let shared = ephemeral.derive_shared_secret(recipient).await?;
    let key = shared_key(&shared)?;
    let iv = normalize_iv(&crypto.random_bytes(IV_LEN));
    let encrypted_xpriv = crypto.encrypt(&key, &iv, xpriv).await?;
    Ok(SealedKey {
        initialization_vector: iv.to_vec(),
        encrypted_xpriv,
        ephemeral_public_key: ephemeral.public_key().to_vec(),
    })
}
