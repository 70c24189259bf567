//! Typed commands carried inside a block.
//!
//! A command is one TLV triplet whose tag is a command tag and whose value
//! is a fixed sequence of primitive TLV fields. [`Command`] keeps the raw
//! bytes and decodes them on first use.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{ParseError, Result, TlvError};
use crate::path;
use crate::tags::{is_command_tag, CommandTag};
use crate::tlv::{self, TlvReader, TlvWriter};
use crate::types::hex_bytes;

/// Permission mask granted to a group owner.
pub const OWNER_PERMISSIONS: u32 = 0xffff_ffff;

/// Creates a new group and publishes its first encrypted key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(with = "hex_bytes")]
    pub topic: Vec<u8>,
    pub protocol_version: u16,
    #[serde(with = "hex_bytes")]
    pub group_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub initialization_vector: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub encrypted_xpriv: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ephemeral_public_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMemberData {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    pub permissions: u32,
}

/// Key material encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishKeyData {
    #[serde(with = "hex_bytes")]
    pub initialization_vector: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub encrypted_xpriv: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub recipient: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ephemeral_public_key: Vec<u8>,
}

/// Opens a sub-stream at a derivation path. `path` is in string form
/// (`m/0'/16'/0'`) and travels as packed indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveData {
    pub path: String,
    #[serde(with = "hex_bytes")]
    pub group_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub initialization_vector: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub encrypted_xpriv: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ephemeral_public_key: Vec<u8>,
}

/// Decoded command payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandData {
    Seed(SeedData),
    AddMember(AddMemberData),
    PublishKey(PublishKeyData),
    Derive(DeriveData),
}

/// Payload sent to a device for signing, before key material exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedCommandData {
    AddMember(AddMemberData),
    PublishKey { recipient: Vec<u8> },
    Derive { path: String },
}

/// The fields needed to recover a published key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedPublishedKey<'a> {
    pub initialization_vector: &'a [u8],
    pub encrypted_xpriv: &'a [u8],
    pub ephemeral_public_key: &'a [u8],
}

impl CommandData {
    pub fn tag(&self) -> CommandTag {
        match self {
            CommandData::Seed(_) => CommandTag::Seed,
            CommandData::AddMember(_) => CommandTag::AddMember,
            CommandData::PublishKey(_) => CommandTag::PublishKey,
            CommandData::Derive(_) => CommandTag::Derive,
        }
    }

    /// The member key this command vouches for.
    pub fn trusted_member_key(&self) -> Option<&[u8]> {
        match self {
            CommandData::AddMember(d) => Some(&d.public_key),
            CommandData::PublishKey(d) => Some(&d.recipient),
            _ => None,
        }
    }

    pub fn encrypted_published_key(&self) -> Option<EncryptedPublishedKey<'_>> {
        let (iv, xpriv, ephemeral) = match self {
            CommandData::Seed(d) => (
                &d.initialization_vector,
                &d.encrypted_xpriv,
                &d.ephemeral_public_key,
            ),
            CommandData::PublishKey(d) => (
                &d.initialization_vector,
                &d.encrypted_xpriv,
                &d.ephemeral_public_key,
            ),
            CommandData::Derive(d) => (
                &d.initialization_vector,
                &d.encrypted_xpriv,
                &d.ephemeral_public_key,
            ),
            CommandData::AddMember(_) => return None,
        };
        Some(EncryptedPublishedKey {
            initialization_vector: iv,
            encrypted_xpriv: xpriv,
            ephemeral_public_key: ephemeral,
        })
    }

    fn human_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            CommandData::Seed(d) => vec![
                ("topic", hex::encode(&d.topic)),
                ("protocolVersion", d.protocol_version.to_string()),
                ("groupKey", hex::encode(&d.group_key)),
                ("initializationVector", hex::encode(&d.initialization_vector)),
                ("encryptedXpriv", hex::encode(&d.encrypted_xpriv)),
                ("ephemeralPublicKey", hex::encode(&d.ephemeral_public_key)),
            ],
            CommandData::AddMember(d) => vec![
                ("name", d.name.clone()),
                ("publicKey", hex::encode(&d.public_key)),
                ("permissions", d.permissions.to_string()),
            ],
            CommandData::PublishKey(d) => vec![
                ("initializationVector", hex::encode(&d.initialization_vector)),
                ("encryptedXpriv", hex::encode(&d.encrypted_xpriv)),
                ("recipient", hex::encode(&d.recipient)),
                ("ephemeralPublicKey", hex::encode(&d.ephemeral_public_key)),
            ],
            CommandData::Derive(d) => vec![
                ("path", d.path.clone()),
                ("groupKey", hex::encode(&d.group_key)),
                ("initializationVector", hex::encode(&d.initialization_vector)),
                ("encryptedXpriv", hex::encode(&d.encrypted_xpriv)),
                ("ephemeralPublicKey", hex::encode(&d.ephemeral_public_key)),
            ],
        }
    }

    /// Multi-line rendering: `Type(0xNN):` then one indented line per field.
    pub fn human_readable(&self) -> String {
        let mut out = format!("{}:", self.tag());
        for (name, value) in self.human_fields() {
            out.push_str(&format!("\n  {}: {}", name, value));
        }
        out
    }

    fn encode_value(&self) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        match self {
            CommandData::Seed(d) => {
                w.push_bytes(&d.topic)?
                    .push_u16(d.protocol_version)?
                    .push_public_key(&d.group_key)?
                    .push_bytes(&d.initialization_vector)?
                    .push_bytes(&d.encrypted_xpriv)?
                    .push_public_key(&d.ephemeral_public_key)?;
            }
            CommandData::AddMember(d) => encode_add_member(&mut w, d)?,
            CommandData::PublishKey(d) => {
                w.push_bytes(&d.initialization_vector)?
                    .push_bytes(&d.encrypted_xpriv)?
                    .push_public_key(&d.recipient)?
                    .push_public_key(&d.ephemeral_public_key)?;
            }
            CommandData::Derive(d) => {
                w.push_bytes(&path::string_to_bytes(&d.path)?)?
                    .push_public_key(&d.group_key)?
                    .push_bytes(&d.initialization_vector)?
                    .push_bytes(&d.encrypted_xpriv)?
                    .push_public_key(&d.ephemeral_public_key)?;
            }
        }
        Ok(w.finish())
    }
}

fn encode_add_member(w: &mut TlvWriter, d: &AddMemberData) -> std::result::Result<(), TlvError> {
    w.push_string(&d.name)?
        .push_public_key(&d.public_key)?
        .push_u32(d.permissions)?;
    Ok(())
}

/// Attach the field name to a TLV failure.
fn field<T>(name: &'static str, r: std::result::Result<T, TlvError>) -> Result<T> {
    r.map_err(|source| ParseError::Field {
        field: name,
        source,
    })
}

fn decode(bytes: &[u8]) -> Result<CommandData> {
    if bytes.is_empty() {
        return Err(ParseError::NoData);
    }
    let mut outer = TlvReader::new(bytes);
    let item = outer.read_item()?;
    if !is_command_tag(item.tag) {
        return Err(ParseError::InvalidCommandType(item.tag));
    }
    if !outer.is_at_end() {
        return Err(ParseError::TrailingBytes {
            offset: outer.offset(),
            count: outer.remaining(),
        });
    }
    let kind = CommandTag::from_u8(item.tag).ok_or(ParseError::UnsupportedCommandType(item.tag))?;

    let mut r = TlvReader::at(bytes, 2);
    let data = match kind {
        CommandTag::Seed => {
            let topic = field("topic", r.read_bytes())?.to_vec();
            let version_at = r.offset();
            let version = field("protocolVersion", r.read_int())?;
            let protocol_version =
                u16::try_from(version).map_err(|_| ParseError::IntOutOfRange {
                    field: "protocolVersion",
                    offset: version_at,
                    value: version,
                })?;
            CommandData::Seed(SeedData {
                topic,
                protocol_version,
                group_key: field("groupKey", r.read_public_key())?.to_vec(),
                initialization_vector: field("initializationVector", r.read_bytes())?.to_vec(),
                encrypted_xpriv: field("encryptedXpriv", r.read_bytes())?.to_vec(),
                ephemeral_public_key: field("ephemeralPublicKey", r.read_public_key())?.to_vec(),
            })
        }
        CommandTag::AddMember => CommandData::AddMember(AddMemberData {
            name: field("name", r.read_string())?.to_string(),
            public_key: field("publicKey", r.read_public_key())?.to_vec(),
            permissions: field("permissions", r.read_int())?,
        }),
        CommandTag::PublishKey => CommandData::PublishKey(PublishKeyData {
            initialization_vector: field("initializationVector", r.read_bytes())?.to_vec(),
            encrypted_xpriv: field("encryptedXpriv", r.read_bytes())?.to_vec(),
            recipient: field("recipient", r.read_public_key())?.to_vec(),
            ephemeral_public_key: field("ephemeralPublicKey", r.read_public_key())?.to_vec(),
        }),
        CommandTag::Derive => CommandData::Derive(DeriveData {
            path: path::bytes_to_string(field("path", r.read_bytes())?)?,
            group_key: field("groupKey", r.read_public_key())?.to_vec(),
            initialization_vector: field("initializationVector", r.read_bytes())?.to_vec(),
            encrypted_xpriv: field("encryptedXpriv", r.read_bytes())?.to_vec(),
            ephemeral_public_key: field("ephemeralPublicKey", r.read_public_key())?.to_vec(),
        }),
        CommandTag::CloseStream | CommandTag::EditMember => {
            return Err(ParseError::UnsupportedCommandType(item.tag))
        }
    };

    if !r.is_at_end() {
        return Err(ParseError::TrailingBytes {
            offset: r.offset(),
            count: r.remaining(),
        });
    }
    Ok(data)
}

/// One encoded command, decoded lazily.
#[derive(Clone)]
pub struct Command {
    bytes: Bytes,
    parsed: OnceLock<Result<CommandData>>,
}

impl Command {
    /// Wrap encoded command bytes. Nothing is checked until [`Command::parse`].
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            parsed: OnceLock::new(),
        }
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self::new(hex::decode(s)?))
    }

    /// Encode a command.
    pub fn from_data(data: &CommandData) -> Result<Self> {
        let value = data.encode_value()?;
        let bytes = tlv::encode(data.tag().to_u8(), &value)?;
        let command = Self::new(bytes);
        let _ = command.parsed.set(Ok(data.clone()));
        Ok(command)
    }

    /// Encode the unsigned form of a command.
    pub fn unsigned_bytes(data: &UnsignedCommandData) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        let tag = match data {
            UnsignedCommandData::AddMember(d) => {
                encode_add_member(&mut w, d)?;
                CommandTag::AddMember
            }
            UnsignedCommandData::PublishKey { recipient } => {
                w.push_bytes(&[])?
                    .push_bytes(&[])?
                    .push_public_key(recipient)?
                    .push_public_key(&[])?;
                CommandTag::PublishKey
            }
            UnsignedCommandData::Derive { path } => {
                w.push_bytes(&path::string_to_bytes(path)?)?;
                CommandTag::Derive
            }
        };
        Ok(tlv::encode(tag.to_u8(), w.as_slice())?)
    }

    /// The raw tag byte, if any.
    pub fn tag(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    pub fn command_type(&self) -> Option<CommandTag> {
        self.tag().and_then(CommandTag::from_u8)
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

    /// Decode the command. The result, success or failure, is cached.
    pub fn parse(&self) -> Result<&CommandData> {
        self.parsed
            .get_or_init(|| decode(&self.bytes))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn human_readable(&self) -> Result<String> {
        self.parse().map(CommandData::human_readable)
    }

    /// `publicKey` of an AddMember, `recipient` of a PublishKey.
    pub fn trusted_member_key(&self) -> Option<&[u8]> {
        match self.command_type()? {
            CommandTag::AddMember | CommandTag::PublishKey => {
                self.parse().ok()?.trusted_member_key()
            }
            _ => None,
        }
    }

    pub fn encrypted_published_key(&self) -> Option<EncryptedPublishedKey<'_>> {
        match self.command_type()? {
            CommandTag::Seed | CommandTag::PublishKey | CommandTag::Derive => {
                self.parse().ok()?.encrypted_published_key()
            }
            _ => None,
        }
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Command {}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({})", self.to_hex())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBER_KEY: &str = "034f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa";

    fn member_key() -> Vec<u8> {
        hex::decode(MEMBER_KEY).unwrap()
    }

    fn derive_hex() -> String {
        [
            "15b8",
            "050c800000008000001080000001",
            "0621034f37312d9babd8c032e1dd2de33da369fa1ce30f005bbba600d17330ba392cb2",
            "0510b6da2c97a3ec8b074f38f1508aed3335",
            "0550d21f8f307702333f7a593bebd798a6b06eb5904277268a91350a3c1b1ee67c24b5a47d228c60d0fbc1524eac1bcf123e6e26b5d71708291cc08dcf49de0bb34bacf20093524ca6565d87c636b24475b2",
            "06210293feb66412536d3d71d5c7afac96a36ea8c685889eebcf6f6f82685712fef150",
        ]
        .concat()
    }

    #[test]
    fn test_add_member_encoding() {
        let data = CommandData::AddMember(AddMemberData {
            name: "OWNER".into(),
            public_key: member_key(),
            permissions: OWNER_PERMISSIONS,
        });
        let command = Command::from_data(&data).unwrap();
        let expected = format!("11300405{}0621{}0104ffffffff", hex::encode("OWNER"), MEMBER_KEY);
        assert_eq!(command.to_hex(), expected);

        let reparsed = Command::from_hex(&expected).unwrap();
        assert_eq!(reparsed.parse().unwrap(), &data);
    }

    #[test]
    fn test_parse_derive() {
        let command = Command::from_hex(&derive_hex()).unwrap();
        match command.parse().unwrap() {
            CommandData::Derive(d) => {
                assert_eq!(d.path, "m/0'/16'/1'");
                assert_eq!(hex::encode(&d.initialization_vector), "b6da2c97a3ec8b074f38f1508aed3335");
                assert_eq!(d.encrypted_xpriv.len(), 80);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Re-encoding reproduces the exact bytes.
        let again = Command::from_data(command.parse().unwrap()).unwrap();
        assert_eq!(again, command);
    }

    #[test]
    fn test_human_readable_publish_key() {
        let value = [
            0x05, 3, 0x01, 0x02, 0x03, //
            0x05, 3, 0x04, 0x05, 0x06, //
            0x06, 3, 0x07, 0x08, 0x09, //
            0x06, 3, 0x0a, 0x0b, 0x0c,
        ];
        let mut bytes = vec![0x12, value.len() as u8];
        bytes.extend_from_slice(&value);
        let command = Command::new(bytes);
        assert_eq!(
            command.human_readable().unwrap(),
            [
                "PublishKey(0x12):",
                "  initializationVector: 010203",
                "  encryptedXpriv: 040506",
                "  recipient: 070809",
                "  ephemeralPublicKey: 0a0b0c",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_human_readable_add_member() {
        let command = Command::from_data(&CommandData::AddMember(AddMemberData {
            name: "debug".into(),
            public_key: vec![0xab; 2],
            permissions: OWNER_PERMISSIONS,
        }))
        .unwrap();
        assert_eq!(
            command.human_readable().unwrap(),
            "AddMember(0x11):\n  name: debug\n  publicKey: abab\n  permissions: 4294967295"
        );
    }

    #[test]
    fn test_truncated_seed() {
        let command = Command::new(vec![0x10, 0x01, 0x01]);
        assert_eq!(
            command.parse().unwrap_err(),
            ParseError::Field {
                field: "topic",
                source: TlvError::MissingLength { offset: 3 },
            }
        );
        assert!(command.human_readable().is_err());
    }

    #[test]
    fn test_seed_protocol_version_out_of_range() {
        let mut value = TlvWriter::new();
        value
            .push_bytes(&[0x01])
            .unwrap()
            .push_u32(0x0001_0000)
            .unwrap();
        let bytes = tlv::encode(CommandTag::Seed.to_u8(), value.as_slice()).unwrap();
        assert_eq!(
            Command::new(bytes).parse().unwrap_err(),
            ParseError::IntOutOfRange {
                field: "protocolVersion",
                offset: 5,
                value: 0x0001_0000,
            }
        );
    }

    #[test]
    fn test_empty_command() {
        assert_eq!(Command::new(Vec::new()).parse().unwrap_err(), ParseError::NoData);
    }

    #[test]
    fn test_command_tag_dispatch() {
        assert_eq!(
            Command::new(vec![0x01, 0x01, 0x01]).parse().unwrap_err(),
            ParseError::InvalidCommandType(0x01)
        );
        assert_eq!(
            Command::new(vec![0x3f, 0x00]).parse().unwrap_err(),
            ParseError::UnsupportedCommandType(0x3f)
        );
        assert_eq!(
            Command::new(vec![0x13, 0x00]).parse().unwrap_err(),
            ParseError::UnsupportedCommandType(0x13)
        );
    }

    #[test]
    fn test_trailing_bytes() {
        // AddMember value followed by an extra null item.
        let hex = format!("112e0401410621{}0104ffffffff0000", MEMBER_KEY);
        let command = Command::from_hex(&hex).unwrap();
        assert_eq!(
            command.parse().unwrap_err(),
            ParseError::TrailingBytes { offset: 46, count: 2 }
        );

        let mut bytes = Command::from_data(&CommandData::AddMember(AddMemberData {
            name: "A".into(),
            public_key: member_key(),
            permissions: 1,
        }))
        .unwrap()
        .as_bytes()
        .to_vec();
        bytes.push(0x00);
        assert!(matches!(
            Command::new(bytes).parse(),
            Err(ParseError::TrailingBytes { count: 1, .. })
        ));
    }

    #[test]
    fn test_wrong_field_tag() {
        // AddMember whose name is encoded as bytes.
        let command = Command::new(vec![0x11, 0x03, 0x05, 0x01, 0x41]);
        assert!(matches!(
            command.parse(),
            Err(ParseError::Field {
                field: "name",
                source: TlvError::UnexpectedTag { found: 0x05, .. }
            })
        ));
    }

    #[test]
    fn test_trusted_member_key() {
        let key = member_key();
        let add = Command::from_data(&CommandData::AddMember(AddMemberData {
            name: "m".into(),
            public_key: key.clone(),
            permissions: 1,
        }))
        .unwrap();
        assert_eq!(add.trusted_member_key(), Some(key.as_slice()));

        let publish = Command::from_data(&CommandData::PublishKey(PublishKeyData {
            initialization_vector: vec![1; 16],
            encrypted_xpriv: vec![2; 80],
            recipient: key.clone(),
            ephemeral_public_key: vec![3; 33],
        }))
        .unwrap();
        assert_eq!(publish.trusted_member_key(), Some(key.as_slice()));
        let published = publish.encrypted_published_key().unwrap();
        assert_eq!(published.initialization_vector, &[1; 16]);
        assert_eq!(published.ephemeral_public_key, &[3; 33]);

        let derive = Command::from_hex(&derive_hex()).unwrap();
        assert_eq!(derive.trusted_member_key(), None);
        assert!(derive.encrypted_published_key().is_some());
        assert!(add.encrypted_published_key().is_none());
    }

    #[test]
    fn test_unsigned_bytes() {
        let publish = Command::unsigned_bytes(&UnsignedCommandData::PublishKey {
            recipient: member_key(),
        })
        .unwrap();
        assert_eq!(hex::encode(publish), format!("1229050005000621{}0600", MEMBER_KEY));

        let derive = Command::unsigned_bytes(&UnsignedCommandData::Derive {
            path: "m/0'/16'/0'".into(),
        })
        .unwrap();
        assert_eq!(hex::encode(derive), "150e050c800000008000001080000000");
    }

    #[test]
    fn test_seed_roundtrip_and_json() {
        let data = CommandData::Seed(SeedData {
            topic: vec![0xaa; 4],
            protocol_version: 1,
            group_key: member_key(),
            initialization_vector: vec![0x01; 16],
            encrypted_xpriv: vec![0x02; 80],
            ephemeral_public_key: member_key(),
        });
        let command = Command::from_data(&data).unwrap();
        // protocolVersion always goes out as a 2-byte integer.
        assert_eq!(&command.as_bytes()[2..10], &[0x05, 0x04, 0xaa, 0xaa, 0xaa, 0xaa, 0x01, 0x02]);
        assert_eq!(Command::new(command.to_bytes()).parse().unwrap(), &data);

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "Seed");
        assert_eq!(json["topic"], "aaaaaaaa");
        let back: CommandData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_invalid_derive_path_rejected() {
        let data = CommandData::Derive(DeriveData {
            path: "x/1".into(),
            group_key: vec![],
            initialization_vector: vec![],
            encrypted_xpriv: vec![],
            ephemeral_public_key: vec![],
        });
        assert!(matches!(Command::from_data(&data), Err(ParseError::InvalidPath(_))));
    }

    #[test]
    fn test_value_too_long() {
        let data = CommandData::PublishKey(PublishKeyData {
            initialization_vector: vec![0; 16],
            encrypted_xpriv: vec![0; 200],
            recipient: vec![0; 33],
            ephemeral_public_key: vec![0; 33],
        });
        assert!(matches!(
            Command::from_data(&data),
            Err(ParseError::Tlv(TlvError::ValueTooLong { tag: 0x12, .. }))
        ));
    }
}
