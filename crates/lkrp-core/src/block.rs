//! Signed blocks.
//!
//! Wire layout:
//!
//! ```text
//! Int(version=1) Hash(parent) PublicKey(issuer) Int(count)
//! <count command triplets>
//! Signature(DER)
//! ```
//!
//! The block hash covers every byte, signature included. The signature
//! covers every byte before the signature triplet.

use bytes::Bytes;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

use crate::command::Command;
use crate::crypto::{CryptoService, KeyPair};
use crate::error::{CryptoError, ParseError, Result, TlvError};
use crate::tags::is_command_tag;
use crate::tlv::{TlvReader, TlvWriter};
use crate::types::BlockHash;

/// Version written by [`Block::from_data`].
pub const BLOCK_VERSION: u8 = 1;

/// Inputs for assembling a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub parent: Vec<u8>,
    pub issuer: Vec<u8>,
    pub commands: Vec<Command>,
    /// DER signature over [`BlockData::unsigned_bytes`].
    pub signature: Vec<u8>,
}

impl BlockData {
    /// Header and commands: the bytes the issuer signs.
    pub fn unsigned_bytes(&self) -> Result<Vec<u8>> {
        unsigned_bytes(&self.parent, &self.issuer, &self.commands)
    }

    /// Full encoding, signature included.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        w.push_encoded(&self.unsigned_bytes()?)
            .push_signature(&self.signature)?;
        Ok(w.finish())
    }
}

fn unsigned_bytes(parent: &[u8], issuer: &[u8], commands: &[Command]) -> Result<Vec<u8>> {
    let count =
        u8::try_from(commands.len()).map_err(|_| ParseError::TooManyCommands(commands.len()))?;
    let mut w = TlvWriter::new();
    w.push_u8(BLOCK_VERSION)?
        .push_hash(parent)?
        .push_public_key(issuer)?
        .push_u8(count)?;
    for command in commands {
        w.push_encoded(command.as_bytes());
    }
    Ok(w.finish())
}

/// The decoded fields of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBlock {
    pub version: u32,
    /// Encoded header triplets (version through command count).
    pub header: Bytes,
    pub parent: Bytes,
    pub issuer: Bytes,
    pub commands: Vec<Command>,
    /// DER signature value.
    pub signature: Bytes,
    /// Length of the signed prefix.
    pub unsigned_len: usize,
}

impl ParsedBlock {
    pub fn parent_hex(&self) -> String {
        hex::encode(&self.parent)
    }

    pub fn issuer_hex(&self) -> String {
        hex::encode(&self.issuer)
    }

    /// The parent as a block hash, when it has the expected width.
    pub fn parent_hash(&self) -> Option<BlockHash> {
        BlockHash::try_from(self.parent.as_ref()).ok()
    }

    pub fn human_readable(&self) -> Result<String> {
        let mut lines = vec![
            format!("Parent: {}", self.parent_hex()),
            format!("Issuer: {}", self.issuer_hex()),
            "Commands:".to_string(),
        ];
        for command in &self.commands {
            for line in command.human_readable()?.lines() {
                lines.push(format!("  {}", line));
            }
        }
        lines.push(format!("Signature: {}", hex::encode(&self.signature)));
        Ok(lines.join("\n"))
    }
}

fn field<T>(name: &'static str, r: std::result::Result<T, TlvError>) -> Result<T> {
    r.map_err(|source| ParseError::Field {
        field: name,
        source,
    })
}

/// Parse one block starting at `start`, returning it with its end offset.
///
/// Offsets in errors are relative to `data`. Slices in the result share
/// `data`'s allocation.
pub(crate) fn parse_block_at(data: &Bytes, start: usize) -> Result<(ParsedBlock, usize)> {
    if start >= data.len() {
        return Err(ParseError::NoData);
    }
    let mut r = TlvReader::at(data, start);

    let version = field("version", r.read_int())?;
    let parent = field("parent", r.read_hash())?;
    let issuer = field("issuer", r.read_public_key())?;
    let count = field("commandCount", r.read_int())?;
    let header_end = r.offset();

    let mut commands = Vec::with_capacity(count.min(u8::MAX as u32) as usize);
    for _ in 0..count {
        let item = field("command", r.read_item())?;
        if !is_command_tag(item.tag) {
            return Err(ParseError::InvalidCommandType(item.tag));
        }
        commands.push(Command::new(data.slice_ref(r.encoded(&item))));
    }

    let signature_at = r.offset();
    let signature = field("signature", r.read_signature())?;
    let end = r.offset();

    let parsed = ParsedBlock {
        version,
        header: data.slice(start..header_end),
        parent: data.slice_ref(parent),
        issuer: data.slice_ref(issuer),
        commands,
        signature: data.slice_ref(signature),
        unsigned_len: signature_at - start,
    };
    Ok((parsed, end))
}

/// One serialized block with memoized parse and hash.
#[derive(Clone)]
pub struct Block {
    crypto: Arc<dyn CryptoService>,
    bytes: Bytes,
    parsed: OnceLock<Result<ParsedBlock>>,
    hash: OnceCell<BlockHash>,
}

impl Block {
    pub fn new(crypto: Arc<dyn CryptoService>, bytes: impl Into<Bytes>) -> Self {
        Self {
            crypto,
            bytes: bytes.into(),
            parsed: OnceLock::new(),
            hash: OnceCell::new(),
        }
    }

    pub fn from_hex(crypto: Arc<dyn CryptoService>, s: &str) -> Result<Self> {
        Ok(Self::new(crypto, hex::decode(s)?))
    }

    /// Block whose parse result is already known (from a stream walk).
    pub(crate) fn with_parsed(
        crypto: Arc<dyn CryptoService>,
        bytes: Bytes,
        parsed: ParsedBlock,
    ) -> Self {
        let block = Self::new(crypto, bytes);
        let _ = block.parsed.set(Ok(parsed));
        block
    }

    /// Assemble a block from its parts. The signature is taken as given.
    pub fn from_data(crypto: Arc<dyn CryptoService>, data: &BlockData) -> Result<Self> {
        Ok(Self::new(crypto, data.to_bytes()?))
    }

    /// Assemble and sign a block with `issuer` over `parent`.
    pub async fn sign(
        crypto: Arc<dyn CryptoService>,
        issuer: &dyn KeyPair,
        parent: &[u8],
        commands: Vec<Command>,
    ) -> std::result::Result<Self, CryptoError> {
        let unsigned = unsigned_bytes(parent, issuer.public_key(), &commands)?;
        let digest = crypto.sha256(&unsigned).await;
        let signature = issuer.sign(&digest).await?;
        let data = BlockData {
            parent: parent.to_vec(),
            issuer: issuer.public_key().to_vec(),
            commands,
            signature,
        };
        Ok(Self::from_data(crypto, &data)?)
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

    pub fn crypto(&self) -> &Arc<dyn CryptoService> {
        &self.crypto
    }

    /// Decode the block. Bytes after the signature are rejected.
    pub fn parse(&self) -> Result<&ParsedBlock> {
        self.parsed
            .get_or_init(|| {
                let (parsed, end) = parse_block_at(&self.bytes, 0)?;
                if end != self.bytes.len() {
                    return Err(ParseError::TrailingBytes {
                        offset: end,
                        count: self.bytes.len() - end,
                    });
                }
                Ok(parsed)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// SHA-256 over the whole block, computed once.
    pub async fn hash(&self) -> BlockHash {
        *self
            .hash
            .get_or_init(|| async { BlockHash(self.crypto.sha256(&self.bytes).await) })
            .await
    }

    /// The signed prefix: every byte before the signature triplet.
    pub fn unsigned_bytes(&self) -> Result<&[u8]> {
        let parsed = self.parse()?;
        Ok(&self.bytes[..parsed.unsigned_len])
    }

    /// Check the signature against the issuer key.
    pub async fn verify_signature(&self) -> std::result::Result<bool, CryptoError> {
        let parsed = self.parse()?;
        let digest = self.crypto.sha256(&self.bytes[..parsed.unsigned_len]).await;
        self.crypto
            .verify(&digest, &parsed.signature, &parsed.issuer)
            .await
    }

    pub fn human_readable(&self) -> Result<String> {
        self.parse()?.human_readable()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.bytes.len())
            .field("hex", &self.to_hex())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AddMemberData, CommandData};
    use crate::crypto::mock::{MockCrypto, MockKeyPair};

    const MOCK_BLOCK_HASH: &str =
        "7cf783bc15c062242ab92796237da3b192361da7645c488d5023698d4f9cc952";

    fn crypto() -> Arc<dyn CryptoService> {
        Arc::new(MockCrypto)
    }

    fn mock_header_with(issuer: &str, count: &str) -> String {
        ["010101", "02020000", issuer, count].concat()
    }

    fn mock_header() -> String {
        mock_header_with("0603010203", "010102")
    }

    fn mock_block_hex() -> String {
        [mock_header(), "10020102".into(), "11020304".into(), "0303040506".into()].concat()
    }

    fn mock_data() -> BlockData {
        BlockData {
            parent: vec![0x00, 0x00],
            issuer: vec![0x01, 0x02, 0x03],
            commands: vec![
                Command::new(vec![0x10, 0x02, 0x01, 0x02]),
                Command::new(vec![0x11, 0x02, 0x03, 0x04]),
            ],
            signature: vec![0x04, 0x05, 0x06],
        }
    }

    #[test]
    fn test_from_data_bytes() {
        let block = Block::from_data(crypto(), &mock_data()).unwrap();
        assert_eq!(block.to_hex(), mock_block_hex());
    }

    #[test]
    fn test_parse_mock_block() {
        let block = Block::from_hex(crypto(), &mock_block_hex()).unwrap();
        let parsed = block.parse().unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(hex::encode(&parsed.header), mock_header());
        assert_eq!(parsed.parent.as_ref(), &[0x00, 0x00]);
        assert_eq!(parsed.issuer.as_ref(), &[0x01, 0x02, 0x03]);
        assert_eq!(parsed.commands, mock_data().commands);
        assert_eq!(parsed.signature.as_ref(), &[0x04, 0x05, 0x06]);
        assert_eq!(parsed.unsigned_len, 23);
        assert_eq!(parsed.parent_hash(), None);
        // Second call hits the cache.
        assert!(std::ptr::eq(parsed, block.parse().unwrap()));
    }

    #[tokio::test]
    async fn test_hash_covers_whole_block() {
        let block = Block::from_hex(crypto(), &mock_block_hex()).unwrap();
        assert_eq!(block.hash().await.to_hex(), MOCK_BLOCK_HASH);

        let mut data = mock_data();
        data.signature = vec![0x04, 0x05, 0x07];
        let other = Block::from_data(crypto(), &data).unwrap();
        assert_eq!(
            block.unsigned_bytes().unwrap(),
            other.unsigned_bytes().unwrap()
        );
        assert_ne!(block.hash().await, other.hash().await);
    }

    #[test]
    fn test_count_larger_than_commands() {
        let hex = [mock_header_with("0603010203", "010103"), "10020102110203040303040506".into()].concat();
        let block = Block::from_hex(crypto(), &hex).unwrap();
        assert_eq!(block.parse().unwrap_err(), ParseError::InvalidCommandType(0x03));
    }

    #[test]
    fn test_truncated_block() {
        let hex = mock_block_hex();
        let block = Block::from_hex(crypto(), &hex[..hex.len() - 10]).unwrap();
        assert!(matches!(
            block.parse(),
            Err(ParseError::Field {
                field: "signature",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_block() {
        let block = Block::new(crypto(), Vec::new());
        assert_eq!(block.parse().unwrap_err(), ParseError::NoData);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let block = Block::from_hex(crypto(), &format!("{}00", mock_block_hex())).unwrap();
        assert_eq!(
            block.parse().unwrap_err(),
            ParseError::TrailingBytes {
                offset: 28,
                count: 1
            }
        );
    }

    #[test]
    fn test_wrong_header_tag() {
        // Issuer written as bytes instead of a public key.
        let hex = [mock_header_with("0503010203", "010102"), "10020102110203040303040506".into()].concat();
        let block = Block::from_hex(crypto(), &hex).unwrap();
        assert!(matches!(
            block.parse(),
            Err(ParseError::Field {
                field: "issuer",
                source: TlvError::UnexpectedTag { found: 0x05, .. }
            })
        ));
    }

    #[test]
    fn test_too_many_commands() {
        let mut data = mock_data();
        data.commands = vec![Command::new(vec![0x10, 0x00]); 256];
        assert_eq!(
            Block::from_data(crypto(), &data).unwrap_err(),
            ParseError::TooManyCommands(256)
        );
    }

    #[tokio::test]
    async fn test_sign_and_verify() {
        let issuer = MockKeyPair::new(0x07);
        let command = Command::from_data(&CommandData::AddMember(AddMemberData {
            name: "alice".into(),
            public_key: MockKeyPair::new(0x08).public_key().to_vec(),
            permissions: 1,
        }))
        .unwrap();
        let block = Block::sign(crypto(), &issuer, &[0x42; 32], vec![command])
            .await
            .unwrap();
        let parsed = block.parse().unwrap();
        assert_eq!(parsed.issuer.as_ref(), issuer.public_key());
        assert_eq!(parsed.parent_hash(), Some(BlockHash([0x42; 32])));
        assert!(block.verify_signature().await.unwrap());

        // Same signature over a different parent does not verify.
        let forged = BlockData {
            parent: vec![0x43; 32],
            issuer: parsed.issuer.to_vec(),
            commands: parsed.commands.clone(),
            signature: parsed.signature.to_vec(),
        };
        let forged = Block::from_data(crypto(), &forged).unwrap();
        assert!(!forged.verify_signature().await.unwrap());
    }

    #[test]
    fn test_human_readable() {
        let issuer = MockKeyPair::new(0x01);
        let command = Command::from_data(&CommandData::AddMember(AddMemberData {
            name: "bob".into(),
            public_key: vec![0xaa],
            permissions: 2,
        }))
        .unwrap();
        let data = BlockData {
            parent: vec![0xff; 2],
            issuer: issuer.public_key()[..2].to_vec(),
            commands: vec![command],
            signature: vec![0x30, 0x00],
        };
        let block = Block::from_data(crypto(), &data).unwrap();
        assert_eq!(
            block.human_readable().unwrap(),
            [
                "Parent: ffff",
                "Issuer: 0201",
                "Commands:",
                "  AddMember(0x11):",
                "    name: bob",
                "    publicKey: aa",
                "    permissions: 2",
                "Signature: 3000",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_human_readable_fails_on_bad_command() {
        let block = Block::from_hex(crypto(), &mock_block_hex()).unwrap();
        assert!(block.parse().is_ok());
        assert!(block.human_readable().is_err());
    }
}
