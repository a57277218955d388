//! Encoding schemes
//!
//! A scheme turns the binary payload of an identity (header + components
//! bitset) into the character groups of the HWID string and back. Both schemes
//! append a SHA-256 derived checksum computed over the string prefix and the
//! padded payload bits.
//!
//! - **base32**: 5 bits per character, 10 checksum bits, groups of 4.
//! - **base8192**: 13 bits per triple (base32, base8, base32), 8 checksum bits,
//!   one triple per group.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use hwid_error::CodecError;

use crate::constants::scheme::*;

/// Encoding scheme declared by the database for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingScheme {
    Base32,
    Base8192,
}

impl EncodingScheme {
    /// Every supported scheme
    pub const ALL: [EncodingScheme; 2] = [EncodingScheme::Base32, EncodingScheme::Base8192];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Base32 => "base32",
            Self::Base8192 => "base8192",
        }
    }

    fn checksum_bits(&self) -> usize {
        match self {
            Self::Base32 => BASE32_CHECKSUM_BITS,
            Self::Base8192 => BASE8192_CHECKSUM_BITS,
        }
    }

    fn group_len(&self) -> usize {
        match self {
            Self::Base32 => BASE32_GROUP_LEN,
            Self::Base8192 => BASE8192_GROUP_LEN,
        }
    }

    /// Zero-pad the payload so that payload + checksum fills whole symbols
    fn pad_payload(&self, payload: &str) -> String {
        let symbol_bits = match self {
            Self::Base32 => 5,
            Self::Base8192 => BASE8192_SYMBOL_BITS,
        };
        let mut padded = payload.to_string();
        while (padded.len() + self.checksum_bits()) % symbol_bits != 0 {
            padded.push('0');
        }
        padded
    }

    /// Encode `payload` (a '0'/'1' string) into dash-separated groups.
    ///
    /// `prefix` is the part of the HWID string before the groups and is
    /// covered by the checksum.
    pub fn encode(&self, prefix: &str, payload: &str) -> String {
        let padded = self.pad_payload(payload);
        let mut bits = padded.clone();
        bits.push_str(&checksum_bits(prefix, &padded, self.checksum_bits()));

        let chars = match self {
            Self::Base32 => bits_to_base32(&bits),
            Self::Base8192 => bits_to_base8192(&bits),
        };
        group(&chars, self.group_len())
    }

    /// Decode dash-separated groups back into the padded payload bits.
    ///
    /// Rejects characters outside the alphabet, non-canonical grouping and
    /// checksum mismatches.
    pub fn decode(&self, prefix: &str, groups: &str) -> Result<String, CodecError> {
        let chars: String = groups.split(GROUP_SEPARATOR).collect();
        if group(&chars, self.group_len()) != groups {
            return Err(CodecError::MalformedHwid(format!(
                "{:?} is not grouped as {}",
                groups,
                self.name()
            )));
        }

        let bits = match self {
            Self::Base32 => base32_to_bits(&chars)?,
            Self::Base8192 => base8192_to_bits(&chars)?,
        };
        if bits.len() <= self.checksum_bits() {
            return Err(CodecError::MalformedHwid(format!(
                "{:?} is too short for {}",
                groups,
                self.name()
            )));
        }

        let (payload, checksum) = bits.split_at(bits.len() - self.checksum_bits());
        if checksum != checksum_bits(prefix, payload, self.checksum_bits()) {
            return Err(CodecError::MalformedHwid(format!(
                "checksum mismatch in {:?} under {}",
                groups,
                self.name()
            )));
        }
        Ok(payload.to_string())
    }
}

impl std::fmt::Display for EncodingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Leading `width` bits of SHA-256("<prefix> <payload>")
fn checksum_bits(prefix: &str, payload: &str, width: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b" ");
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(2)
        .map(|byte| format!("{:08b}", byte))
        .collect::<String>()[..width]
        .to_string()
}

fn bits_value(bits: &str) -> usize {
    bits.bytes()
        .fold(0usize, |acc, b| (acc << 1) | usize::from(b == b'1'))
}

fn value_bits(value: usize, width: usize) -> String {
    format!("{:0width$b}", value, width = width)
}

fn bits_to_base32(bits: &str) -> String {
    bits.as_bytes()
        .chunks(5)
        .map(|chunk| {
            // chunks are ASCII '0'/'1'
            let value = chunk
                .iter()
                .fold(0usize, |acc, b| (acc << 1) | usize::from(*b == b'1'));
            BASE32_ALPHABET[value] as char
        })
        .collect()
}

fn bits_to_base8192(bits: &str) -> String {
    let mut out = String::with_capacity(bits.len() / BASE8192_SYMBOL_BITS * 3);
    for start in (0..bits.len()).step_by(BASE8192_SYMBOL_BITS) {
        let symbol = &bits[start..start + BASE8192_SYMBOL_BITS];
        out.push(BASE32_ALPHABET[bits_value(&symbol[0..5])] as char);
        out.push(BASE8_ALPHABET[bits_value(&symbol[5..8])] as char);
        out.push(BASE32_ALPHABET[bits_value(&symbol[8..13])] as char);
    }
    out
}

fn alphabet_index(alphabet: &[u8], c: char) -> Result<usize, CodecError> {
    alphabet
        .iter()
        .position(|&a| a as char == c)
        .ok_or_else(|| CodecError::MalformedHwid(format!("unexpected character {:?}", c)))
}

fn base32_to_bits(chars: &str) -> Result<String, CodecError> {
    chars
        .chars()
        .map(|c| alphabet_index(BASE32_ALPHABET, c).map(|v| value_bits(v, 5)))
        .collect()
}

fn base8192_to_bits(chars: &str) -> Result<String, CodecError> {
    let chars: Vec<char> = chars.chars().collect();
    if chars.len() % 3 != 0 {
        return Err(CodecError::MalformedHwid(format!(
            "base8192 payload has {} characters, expected a multiple of 3",
            chars.len()
        )));
    }
    let mut bits = String::with_capacity(chars.len() / 3 * BASE8192_SYMBOL_BITS);
    for triple in chars.chunks(3) {
        bits.push_str(&value_bits(alphabet_index(BASE32_ALPHABET, triple[0])?, 5));
        bits.push_str(&value_bits(alphabet_index(BASE8_ALPHABET, triple[1])?, 3));
        bits.push_str(&value_bits(alphabet_index(BASE32_ALPHABET, triple[2])?, 5));
    }
    Ok(bits)
}

fn group(chars: &str, group_len: usize) -> String {
    chars
        .as_bytes()
        .chunks(group_len)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(&GROUP_SEPARATOR.to_string())
}
