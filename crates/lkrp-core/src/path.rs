//! BIP32-style derivation paths.
//!
//! On the wire a path is a sequence of 4-byte big-endian indices, hardened
//! indices having bit 31 set. The string form is `m/0'/16'/0'`.

use crate::error::{ParseError, Result};

/// Bit marking a hardened index.
pub const HARDENED: u32 = 0x8000_0000;

/// Decode wire bytes into index values.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(ParseError::InvalidPath(format!(
            "{} bytes is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Encode index values as wire bytes.
pub fn to_bytes(indices: &[u32]) -> Vec<u8> {
    indices.iter().flat_map(|i| i.to_be_bytes()).collect()
}

/// Render index values as `m/a/b'/..`.
pub fn format(indices: &[u32]) -> String {
    let mut out = String::from("m");
    for index in indices {
        out.push('/');
        if index & HARDENED != 0 {
            out.push_str(&(index & !HARDENED).to_string());
            out.push('\'');
        } else {
            out.push_str(&index.to_string());
        }
    }
    out
}

/// Parse the string form into index values.
///
/// Accepts `h` as well as `'` for hardened levels, and a trailing slash
/// (`m/` is the root).
pub fn parse(path: &str) -> Result<Vec<u32>> {
    let invalid = || ParseError::InvalidPath(path.to_string());
    let rest = path.strip_prefix('m').ok_or_else(invalid)?;
    let rest = match rest.strip_prefix('/') {
        Some(r) => r,
        None if rest.is_empty() => rest,
        None => return Err(invalid()),
    };

    let mut indices = Vec::new();
    for (i, level) in rest.split('/').enumerate() {
        if level.is_empty() {
            // Only a trailing slash on the root is allowed.
            if i == 0 && rest.is_empty() {
                continue;
            }
            return Err(invalid());
        }
        let (digits, hardened) = match level.strip_suffix(['\'', 'h']) {
            Some(d) => (d, true),
            None => (level, false),
        };
        let index: u32 = digits.parse().map_err(|_| invalid())?;
        if index & HARDENED != 0 {
            return Err(invalid());
        }
        indices.push(if hardened { index | HARDENED } else { index });
    }
    Ok(indices)
}

/// Convert wire bytes to the string form.
pub fn bytes_to_string(bytes: &[u8]) -> Result<String> {
    from_bytes(bytes).map(|indices| format(&indices))
}

/// Convert the string form to wire bytes.
pub fn string_to_bytes(path: &str) -> Result<Vec<u8>> {
    parse(path).map(|indices| to_bytes(&indices))
}
