//! Tag-length-value codec.
//!
//! Every item on the wire is `[tag, length, value..]` where `length` is a
//! single byte, so no value exceeds 255 bytes. Decoding is a pull cursor
//! over one buffer ([`TlvReader`]); encoding appends triplets to a buffer
//! ([`TlvWriter`]).
//!
//! Primitive tags get their content checked (null length, integer width,
//! non-empty UTF-8 strings). Any other tag, including command tags, is
//! returned as an opaque triplet so callers can interpret it themselves.

use crate::error::TlvError;
use crate::tags::GeneralTag;

/// Largest value a single TLV item can carry.
pub const MAX_VALUE_LEN: usize = u8::MAX as usize;

/// One raw TLV triplet borrowed from the underlying buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Offset of the tag byte in the buffer.
    pub offset: usize,
    pub tag: u8,
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Declared length of the value.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Total encoded size: tag, length and value.
    pub fn encoded_len(&self) -> usize {
        2 + self.value.len()
    }

    /// Interpret the triplet according to its tag.
    pub fn value(&self) -> Result<TlvValue<'a>, TlvError> {
        let offset = self.offset;
        let value = self.value;
        match GeneralTag::from_u8(self.tag) {
            Some(GeneralTag::Null) => {
                if !value.is_empty() {
                    return Err(TlvError::InvalidNullLength {
                        offset,
                        length: value.len() as u8,
                    });
                }
                Ok(TlvValue::Null)
            }
            Some(GeneralTag::Int) => decode_int(offset, value).map(TlvValue::Int),
            Some(GeneralTag::Hash) => Ok(TlvValue::Hash(value)),
            Some(GeneralTag::Signature) => Ok(TlvValue::Signature(value)),
            Some(GeneralTag::String) => decode_string(offset, value).map(TlvValue::String),
            Some(GeneralTag::Bytes) => Ok(TlvValue::Bytes(value)),
            Some(GeneralTag::PublicKey) => Ok(TlvValue::PublicKey(value)),
            None => Ok(TlvValue::Raw {
                tag: self.tag,
                value,
            }),
        }
    }
}

/// A decoded TLV value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvValue<'a> {
    Null,
    Int(u32),
    Hash(&'a [u8]),
    Signature(&'a [u8]),
    String(&'a str),
    Bytes(&'a [u8]),
    PublicKey(&'a [u8]),
    /// Any tag outside the primitive range, left uninterpreted.
    Raw { tag: u8, value: &'a [u8] },
}

fn decode_int(offset: usize, value: &[u8]) -> Result<u32, TlvError> {
    match value.len() {
        1 | 2 | 4 => Ok(value.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))),
        n => Err(TlvError::UnsupportedIntegerLength {
            offset,
            length: n as u8,
        }),
    }
}

fn decode_string(offset: usize, value: &[u8]) -> Result<&str, TlvError> {
    if value.is_empty() {
        return Err(TlvError::EmptyString { offset });
    }
    std::str::from_utf8(value).map_err(|_| TlvError::InvalidUtf8 { offset })
}

/// Decode one triplet at `offset`, returning it with the offset just past it.
pub fn decode(bytes: &[u8], offset: usize) -> Result<(Tlv<'_>, usize), TlvError> {
    let tag = *bytes.get(offset).ok_or(TlvError::UnexpectedEnd { offset })?;
    let length = *bytes
        .get(offset + 1)
        .ok_or(TlvError::MissingLength { offset: offset + 1 })? as usize;
    let start = offset + 2;
    let available = bytes.len() - start;
    if available < length {
        return Err(TlvError::TruncatedValue {
            offset: start,
            expected: length,
            available,
        });
    }
    let item = Tlv {
        offset,
        tag,
        value: &bytes[start..start + length],
    };
    Ok((item, start + length))
}

/// Encode one triplet.
pub fn encode(tag: u8, value: &[u8]) -> Result<Vec<u8>, TlvError> {
    let mut out = Vec::with_capacity(2 + value.len());
    write_triplet(&mut out, tag, value)?;
    Ok(out)
}

fn write_triplet(out: &mut Vec<u8>, tag: u8, value: &[u8]) -> Result<(), TlvError> {
    if value.len() > MAX_VALUE_LEN {
        return Err(TlvError::ValueTooLong {
            tag,
            length: value.len(),
        });
    }
    out.push(tag);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    Ok(())
}

/// Sequential TLV cursor over one buffer.
///
/// Offsets reported in errors are absolute positions in the buffer the
/// reader was created over, including when it starts mid-buffer.
#[derive(Debug, Clone)]
pub struct TlvReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> TlvReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Start reading at `offset`.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    /// Current cursor position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// True when the cursor sits at the end of the buffer.
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Read the next triplet, or `None` at a clean end of buffer.
    pub fn next_item(&mut self) -> Result<Option<Tlv<'a>>, TlvError> {
        if self.is_at_end() {
            return Ok(None);
        }
        self.read_item().map(Some)
    }

    /// Read the next triplet. Running out of bytes is an error.
    pub fn read_item(&mut self) -> Result<Tlv<'a>, TlvError> {
        let (item, next) = decode(self.data, self.offset)?;
        self.offset = next;
        Ok(item)
    }

    /// Read the next triplet and interpret it by tag.
    pub fn read_value(&mut self) -> Result<TlvValue<'a>, TlvError> {
        self.read_item()?.value()
    }

    /// The encoded bytes of an item previously returned by this reader.
    pub fn encoded(&self, item: &Tlv<'a>) -> &'a [u8] {
        &self.data[item.offset..item.offset + item.encoded_len()]
    }

    fn expect(&mut self, expected: GeneralTag) -> Result<Tlv<'a>, TlvError> {
        let item = self.read_item()?;
        if item.tag != expected.to_u8() {
            return Err(TlvError::UnexpectedTag {
                offset: item.offset,
                expected,
                found: item.tag,
            });
        }
        Ok(item)
    }

    pub fn read_null(&mut self) -> Result<(), TlvError> {
        self.expect(GeneralTag::Null)?.value().map(|_| ())
    }

    pub fn read_int(&mut self) -> Result<u32, TlvError> {
        let item = self.expect(GeneralTag::Int)?;
        decode_int(item.offset, item.value)
    }

    pub fn read_hash(&mut self) -> Result<&'a [u8], TlvError> {
        Ok(self.expect(GeneralTag::Hash)?.value)
    }

    pub fn read_signature(&mut self) -> Result<&'a [u8], TlvError> {
        Ok(self.expect(GeneralTag::Signature)?.value)
    }

    pub fn read_string(&mut self) -> Result<&'a str, TlvError> {
        let item = self.expect(GeneralTag::String)?;
        decode_string(item.offset, item.value)
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8], TlvError> {
        Ok(self.expect(GeneralTag::Bytes)?.value)
    }

    pub fn read_public_key(&mut self) -> Result<&'a [u8], TlvError> {
        Ok(self.expect(GeneralTag::PublicKey)?.value)
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = Result<TlvValue<'a>, TlvError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_item() {
            Ok(Some(item)) => Some(item.value()),
            Ok(None) => None,
            Err(e) => {
                // Stop after the first structural error.
                self.offset = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Appends TLV triplets to a growing buffer.
#[derive(Debug, Clone, Default)]
pub struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append an arbitrary triplet.
    pub fn push(&mut self, tag: u8, value: &[u8]) -> Result<&mut Self, TlvError> {
        write_triplet(&mut self.buf, tag, value)?;
        Ok(self)
    }

    pub fn push_null(&mut self) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::Null.to_u8(), &[])
    }

    pub fn push_u8(&mut self, value: u8) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::Int.to_u8(), &[value])
    }

    pub fn push_u16(&mut self, value: u16) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::Int.to_u8(), &value.to_be_bytes())
    }

    pub fn push_u32(&mut self, value: u32) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::Int.to_u8(), &value.to_be_bytes())
    }

    pub fn push_hash(&mut self, value: &[u8]) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::Hash.to_u8(), value)
    }

    pub fn push_signature(&mut self, value: &[u8]) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::Signature.to_u8(), value)
    }

    pub fn push_string(&mut self, value: &str) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::String.to_u8(), value.as_bytes())
    }

    pub fn push_bytes(&mut self, value: &[u8]) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::Bytes.to_u8(), value)
    }

    pub fn push_public_key(&mut self, value: &[u8]) -> Result<&mut Self, TlvError> {
        self.push(GeneralTag::PublicKey.to_u8(), value)
    }

    /// Append bytes that are already TLV-encoded.
    pub fn push_encoded(&mut self, encoded: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(encoded);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
