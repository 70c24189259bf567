//! Test fixtures and helpers.
//!
//! Build real signed key-ring chains for integration tests.

use std::sync::Arc;

use lkrp::{app_path, Result, Trustchain, TrustchainConfig, ROOT_PATH};
use lkrp_core::{
    AddMemberData, BlockStream, Command, CommandData, CryptoService, DeriveData, KeyPair,
    PublishKeyData, SeedData, OWNER_PERMISSIONS,
};
use lkrp_crypto::{seal_xpriv, NativeCryptoService, Secp256k1KeyPair};

/// Parent of every fixture root stream.
pub const FIXTURE_ROOT_PARENT: [u8; 32] = [0x42; 32];

/// A key-ring owner with a group key to hand out.
pub struct KeyringFixture {
    pub crypto: Arc<dyn CryptoService>,
    pub owner: Secp256k1KeyPair,
    /// The 64-byte extended private key published to members.
    pub xpriv: Vec<u8>,
}

impl KeyringFixture {
    /// Create a new fixture with a random owner and group key.
    pub fn new() -> Self {
        let crypto: Arc<dyn CryptoService> = Arc::new(NativeCryptoService);
        let xpriv = crypto.random_bytes(64);
        Self {
            crypto,
            owner: Secp256k1KeyPair::generate(),
            xpriv,
        }
    }

    /// Create with a deterministic owner and group key.
    pub fn with_seed(seed: u8) -> Result<Self> {
        Ok(Self {
            crypto: Arc::new(NativeCryptoService),
            owner: keypair(seed)?,
            xpriv: (0u8..64).map(|i| i ^ seed).collect(),
        })
    }

    pub fn add_member(&self, name: &str, member: &dyn KeyPair) -> Result<Command> {
        Ok(Command::from_data(&CommandData::AddMember(AddMemberData {
            name: name.to_string(),
            public_key: member.public_key().to_vec(),
            permissions: OWNER_PERMISSIONS,
        }))?)
    }

    /// Publish the group key to `recipient`.
    pub async fn publish_key(&self, recipient: &dyn KeyPair) -> Result<Command> {
        let sealed = seal_xpriv(self.crypto.as_ref(), recipient.public_key(), &self.xpriv).await?;
        Ok(Command::from_data(&CommandData::PublishKey(PublishKeyData {
            initialization_vector: sealed.initialization_vector,
            encrypted_xpriv: sealed.encrypted_xpriv,
            recipient: recipient.public_key().to_vec(),
            ephemeral_public_key: sealed.ephemeral_public_key,
        }))?)
    }

    pub async fn seed(&self, topic: &[u8]) -> Result<Command> {
        let sealed = seal_xpriv(self.crypto.as_ref(), self.owner.public_key(), &self.xpriv).await?;
        Ok(Command::from_data(&CommandData::Seed(SeedData {
            topic: topic.to_vec(),
            protocol_version: 1,
            group_key: self.owner.public_key().to_vec(),
            initialization_vector: sealed.initialization_vector,
            encrypted_xpriv: sealed.encrypted_xpriv,
            ephemeral_public_key: sealed.ephemeral_public_key,
        }))?)
    }

    pub async fn derive(&self, path: &str) -> Result<Command> {
        let sealed = seal_xpriv(self.crypto.as_ref(), self.owner.public_key(), &self.xpriv).await?;
        Ok(Command::from_data(&CommandData::Derive(DeriveData {
            path: path.to_string(),
            group_key: self.owner.public_key().to_vec(),
            initialization_vector: sealed.initialization_vector,
            encrypted_xpriv: sealed.encrypted_xpriv,
            ephemeral_public_key: sealed.ephemeral_public_key,
        }))?)
    }

    /// Seed block, then one AddMember + PublishKey block per member.
    pub async fn root_stream(&self, members: &[Secp256k1KeyPair]) -> Result<BlockStream> {
        let opening = vec![
            self.seed(&[0x01; 32]).await?,
            self.add_member("owner", &self.owner)?,
        ];
        self.chain(opening, members, Some(&FIXTURE_ROOT_PARENT[..])).await
    }

    /// Derive block for `m/0'/{app_id}'/0'`, then one block per member.
    pub async fn app_stream(
        &self,
        app_id: u32,
        members: &[Secp256k1KeyPair],
    ) -> Result<BlockStream> {
        let opening = vec![
            self.derive(&format!("m/0'/{app_id}'/0'")).await?,
            self.add_member("owner", &self.owner)?,
        ];
        self.chain(opening, members, None).await
    }

    async fn chain(
        &self,
        opening: Vec<Command>,
        members: &[Secp256k1KeyPair],
        parent: Option<&[u8]>,
    ) -> Result<BlockStream> {
        let mut blocks: Vec<(&dyn KeyPair, Vec<Command>)> =
            vec![(&self.owner as &dyn KeyPair, opening)];
        for (i, member) in members.iter().enumerate() {
            let commands = vec![
                self.add_member(&format!("member-{i}"), member)?,
                self.publish_key(member).await?,
            ];
            blocks.push((&self.owner as &dyn KeyPair, commands));
        }
        Ok(BlockStream::signed(self.crypto.clone(), blocks, parent).await?)
    }

    /// A trustchain with a root stream and one application stream.
    pub async fn trustchain(
        &self,
        id: &str,
        app_id: u32,
        members: &[Secp256k1KeyPair],
    ) -> Result<Trustchain> {
        let root = self.root_stream(&[]).await?;
        let app = self.app_stream(app_id, members).await?;
        Ok(Trustchain::new(
            self.crypto.clone(),
            id,
            [
                (ROOT_PATH.to_string(), root.to_bytes()),
                (app_path(app_id), app.to_bytes()),
            ],
            TrustchainConfig::default(),
        ))
    }
}

impl Default for KeyringFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic keypair; `seed` must be non-zero.
pub fn keypair(seed: u8) -> Result<Secp256k1KeyPair> {
    Ok(Secp256k1KeyPair::from_secret(&[seed; 32])?)
}

/// Distinct deterministic keypairs for multi-party tests.
pub fn multi_party_keypairs(count: u8) -> Result<Vec<Secp256k1KeyPair>> {
    (1..=count).map(keypair).collect()
}
