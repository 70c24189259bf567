//! TLV tag namespace.
//!
//! Two disjoint ranges: general primitive tags (`0x00..=0x06`) and
//! command tags (`0x10..=0x3f`). Any other tag is still readable as an
//! opaque triplet.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First tag of the command range.
pub const COMMAND_TAG_MIN: u8 = 0x10;

/// Last tag of the command range.
pub const COMMAND_TAG_MAX: u8 = 0x3f;

/// Primitive value tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeneralTag {
    Null = 0x00,
    Int = 0x01,
    Hash = 0x02,
    Signature = 0x03,
    String = 0x04,
    Bytes = 0x05,
    PublicKey = 0x06,
}

impl GeneralTag {
    /// Convert to the wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Null),
            0x01 => Some(Self::Int),
            0x02 => Some(Self::Hash),
            0x03 => Some(Self::Signature),
            0x04 => Some(Self::String),
            0x05 => Some(Self::Bytes),
            0x06 => Some(Self::PublicKey),
            _ => None,
        }
    }
}

impl fmt::Display for GeneralTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeneralTag::Null => "null",
            GeneralTag::Int => "a number",
            GeneralTag::Hash => "a hash",
            GeneralTag::Signature => "a signature",
            GeneralTag::String => "a string",
            GeneralTag::Bytes => "bytes",
            GeneralTag::PublicKey => "a public key",
        };
        f.write_str(name)
    }
}

/// Command tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandTag {
    Seed = 0x10,
    AddMember = 0x11,
    PublishKey = 0x12,
    CloseStream = 0x13,
    EditMember = 0x14,
    Derive = 0x15,
}

impl CommandTag {
    /// Convert to the wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x10 => Some(Self::Seed),
            0x11 => Some(Self::AddMember),
            0x12 => Some(Self::PublishKey),
            0x13 => Some(Self::CloseStream),
            0x14 => Some(Self::EditMember),
            0x15 => Some(Self::Derive),
            _ => None,
        }
    }

    /// The type name used in human-readable output.
    pub fn name(self) -> &'static str {
        match self {
            CommandTag::Seed => "Seed",
            CommandTag::AddMember => "AddMember",
            CommandTag::PublishKey => "PublishKey",
            CommandTag::CloseStream => "CloseStream",
            CommandTag::EditMember => "EditMember",
            CommandTag::Derive => "Derive",
        }
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02x})", self.name(), self.to_u8())
    }
}

/// Check whether a tag falls in the command range.
pub fn is_command_tag(tag: u8) -> bool {
    (COMMAND_TAG_MIN..=COMMAND_TAG_MAX).contains(&tag)
}
