//! secp256k1 keypairs.

use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use std::fmt;

use lkrp_core::crypto::KeyPair;
use lkrp_core::CryptoError;

/// A secp256k1 secret key with its compressed public key.
#[derive(Clone)]
pub struct Secp256k1KeyPair {
    secret: SecretKey,
    public_key: Vec<u8>,
}

impl Secp256k1KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self::from_secret_key(SecretKey::random(&mut rand::rngs::OsRng))
    }

    /// Create from a 32-byte secret scalar.
    pub fn from_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: secret.len(),
            });
        }
        let secret = SecretKey::from_slice(secret).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret))
    }

    fn from_secret_key(secret: SecretKey) -> Self {
        let public_key = secret
            .public_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        Self { secret, public_key }
    }

    /// The raw secret scalar.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes().into()
    }
}

/// Parse a SEC1 public key, compressed or not.
pub(crate) fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

#[async_trait]
impl KeyPair for Secp256k1KeyPair {
    fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    async fn derive_shared_secret(&self, peer_public_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let peer = parse_public_key(peer_public_key)?;
        let point = (peer.to_projective() * *self.secret.to_nonzero_scalar()).to_affine();
        Ok(point.to_encoded_point(false).as_bytes().to_vec())
    }

    async fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let signing_key = SigningKey::from(&self.secret);
        let signature: Signature = signing_key
            .sign_prehash(digest)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

impl fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secp256k1KeyPair")
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}
