//! Block streams: hash-linked sequences of blocks.
//!
//! A stream is the plain concatenation of its blocks. Block `i + 1` names
//! the hash of block `i` as its parent. The stream owns one buffer; its
//! blocks are slices of it.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::block::{parse_block_at, Block, BlockData, ParsedBlock};
use crate::command::{Command, CommandData};
use crate::crypto::{normalize_iv, shared_key, CryptoService, KeyPair};
use crate::error::{CryptoError, Result};
use crate::types::PublishedKey;

/// Path reported for a stream opened by a Seed command.
pub const SEED_PATH: &str = "m/0'";

/// Size of a decrypted extended private key.
pub const XPRIV_LEN: usize = 64;

/// A block to append when building a stream; the parent is filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    pub issuer: Vec<u8>,
    pub commands: Vec<Command>,
    pub signature: Vec<u8>,
}

/// An ordered chain of blocks over one buffer.
#[derive(Clone)]
pub struct BlockStream {
    crypto: Arc<dyn CryptoService>,
    bytes: Bytes,
    blocks: OnceLock<Result<Vec<Block>>>,
    continuity: OnceCell<bool>,
}

impl BlockStream {
    pub fn new(crypto: Arc<dyn CryptoService>, bytes: impl Into<Bytes>) -> Self {
        Self {
            crypto,
            bytes: bytes.into(),
            blocks: OnceLock::new(),
            continuity: OnceCell::new(),
        }
    }

    pub fn from_hex(crypto: Arc<dyn CryptoService>, s: &str) -> Result<Self> {
        Ok(Self::new(crypto, hex::decode(s)?))
    }

    fn from_blocks(crypto: Arc<dyn CryptoService>, blocks: Vec<Block>) -> Self {
        let mut buf = BytesMut::with_capacity(blocks.iter().map(|b| b.as_bytes().len()).sum());
        for block in &blocks {
            buf.extend_from_slice(block.as_bytes());
        }
        let stream = Self::new(crypto, buf.freeze());
        let _ = stream.blocks.set(Ok(blocks));
        stream
    }

    /// Build a stream from pre-signed block templates, chaining parents.
    ///
    /// The first parent is `parent`, or 32 random bytes when absent. Each
    /// later parent is the hash of the block built before it.
    pub async fn from_data(
        crypto: Arc<dyn CryptoService>,
        templates: Vec<BlockTemplate>,
        parent: Option<&[u8]>,
    ) -> Result<Self> {
        let mut parent = match parent {
            Some(p) => p.to_vec(),
            None => crypto.random_bytes(32),
        };
        let mut blocks = Vec::with_capacity(templates.len());
        for template in templates {
            let data = BlockData {
                parent,
                issuer: template.issuer,
                commands: template.commands,
                signature: template.signature,
            };
            let block = Block::from_data(crypto.clone(), &data)?;
            parent = block.hash().await.0.to_vec();
            blocks.push(block);
        }
        Ok(Self::from_blocks(crypto, blocks))
    }

    /// Build a stream where each block is signed by its issuer.
    pub async fn signed(
        crypto: Arc<dyn CryptoService>,
        blocks: Vec<(&dyn KeyPair, Vec<Command>)>,
        parent: Option<&[u8]>,
    ) -> std::result::Result<Self, CryptoError> {
        let mut parent = match parent {
            Some(p) => p.to_vec(),
            None => crypto.random_bytes(32),
        };
        let mut built = Vec::with_capacity(blocks.len());
        for (issuer, commands) in blocks {
            let block = Block::sign(crypto.clone(), issuer, &parent, commands).await?;
            parent = block.hash().await.0.to_vec();
            built.push(block);
        }
        Ok(Self::from_blocks(crypto, built))
    }

    /// A new stream with `block` appended.
    pub fn append(&self, block: Block) -> Result<Self> {
        let mut blocks = self.parse()?.to_vec();
        blocks.push(block);
        Ok(Self::from_blocks(self.crypto.clone(), blocks))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn crypto(&self) -> &Arc<dyn CryptoService> {
        &self.crypto
    }

    /// Split the buffer into blocks. The first failing block fails the
    /// whole stream. The result is cached.
    pub fn parse(&self) -> Result<&[Block]> {
        self.blocks
            .get_or_init(|| {
                let mut blocks = Vec::new();
                let mut offset = 0;
                while offset < self.bytes.len() {
                    let (parsed, end) = parse_block_at(&self.bytes, offset).map_err(|e| {
                        debug!(offset, error = %e, "block stream failed to parse");
                        e
                    })?;
                    let bytes = self.bytes.slice(offset..end);
                    blocks.push(Block::with_parsed(self.crypto.clone(), bytes, parsed));
                    offset = end;
                }
                Ok(blocks)
            })
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Clone::clone)
    }

    /// Check chain continuity and, when given, the first block's parent.
    ///
    /// Unparseable streams are invalid. An empty stream is valid.
    pub async fn validate(&self, expected_parent: Option<&[u8]>) -> bool {
        let blocks = match self.parse() {
            Ok(blocks) => blocks,
            Err(_) => return false,
        };
        if let (Some(expected), Some(first)) = (expected_parent, blocks.first()) {
            match first.parse() {
                Ok(parsed) if parsed.parent.as_ref() == expected => {}
                _ => {
                    debug!(
                        expected = %hex::encode(expected),
                        "stream does not start at the expected parent"
                    );
                    return false;
                }
            }
        }
        *self
            .continuity
            .get_or_init(|| check_links(blocks))
            .await
    }

    /// Derivation path of the stream, from its very first command.
    pub fn path(&self) -> Option<&str> {
        let first = self.parse().ok()?.first()?;
        let command = first.parse().ok()?.commands.first()?;
        match command.parse().ok()? {
            CommandData::Derive(d) => Some(d.path.as_str()),
            CommandData::Seed(_) => Some(SEED_PATH),
            _ => None,
        }
    }

    /// First block holding a command that trusts `public_key`.
    pub fn member_block_by_key(&self, public_key: &[u8]) -> Option<&ParsedBlock> {
        self.parse()
            .ok()?
            .iter()
            .filter_map(|block| block.parse().ok())
            .find(|parsed| {
                parsed
                    .commands
                    .iter()
                    .any(|c| c.trusted_member_key() == Some(public_key))
            })
    }

    /// [`BlockStream::member_block_by_key`] for a hex-encoded key.
    pub fn member_block(&self, public_key_hex: &str) -> Option<&ParsedBlock> {
        let key = hex::decode(public_key_hex).ok()?;
        self.member_block_by_key(&key)
    }

    pub fn has_member(&self, public_key_hex: &str) -> bool {
        self.member_block(public_key_hex).is_some()
    }

    /// Every trusted member key in stream order, first occurrence kept.
    pub fn members(&self) -> Vec<&[u8]> {
        let mut out: Vec<&[u8]> = Vec::new();
        let Ok(blocks) = self.parse() else {
            return out;
        };
        for parsed in blocks.iter().filter_map(|b| b.parse().ok()) {
            for key in parsed.commands.iter().filter_map(Command::trusted_member_key) {
                if !out.contains(&key) {
                    out.push(key);
                }
            }
        }
        out
    }

    /// Recover the key published to `keypair`, if any.
    ///
    /// Uses the first command carrying encrypted key material in the
    /// member's block.
    pub async fn published_key(
        &self,
        keypair: &dyn KeyPair,
    ) -> std::result::Result<Option<PublishedKey>, CryptoError> {
        let Some(block) = self.member_block_by_key(keypair.public_key()) else {
            return Ok(None);
        };
        let Some(published) = block
            .commands
            .iter()
            .find_map(Command::encrypted_published_key)
        else {
            return Ok(None);
        };

        let shared = keypair
            .derive_shared_secret(published.ephemeral_public_key)
            .await?;
        let key = shared_key(&shared)?;
        let iv = normalize_iv(published.initialization_vector);
        let xpriv = self
            .crypto
            .decrypt(&key, &iv, published.encrypted_xpriv)
            .await?;
        if xpriv.len() != XPRIV_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: XPRIV_LEN,
                actual: xpriv.len(),
            });
        }
        Ok(Some(PublishedKey::from_xpriv(&xpriv)))
    }

    /// Blocks rendered one after another, separated by a blank line.
    pub fn human_readable(&self) -> Result<String> {
        let rendered = self
            .parse()?
            .iter()
            .map(Block::human_readable)
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join("\n\n"))
    }
}

async fn check_links(blocks: &[Block]) -> bool {
    for (index, pair) in blocks.windows(2).enumerate() {
        let Ok(next) = pair[1].parse() else {
            return false;
        };
        let hash = pair[0].hash().await;
        if next.parent.as_ref() != hash.as_bytes() {
            debug!(
                block = index + 1,
                parent = %next.parent_hex(),
                expected = %hash,
                "chain link mismatch"
            );
            return false;
        }
    }
    true
}

impl PartialEq for BlockStream {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for BlockStream {}

impl fmt::Debug for BlockStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStream")
            .field("len", &self.bytes.len())
            .finish()
    }
}
