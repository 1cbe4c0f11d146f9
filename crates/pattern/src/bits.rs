//! Owned bit strings.
//!
//! The generator's intermediate form is a plain sequence of bits, rendered
//! and parsed as ASCII `'0'`/`'1'` so values can be compared against the
//! textual bit strings used in fixtures.

use core::fmt;
use core::str::FromStr;

/// A sequence of bits, most significant first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitString(Vec<bool>);

/// Returned when parsing a [`BitString`] from text containing anything but
/// `'0'` and `'1'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid bit character {found:?} at index {index}")]
pub struct ParseBitsError {
    /// Offending character
    pub found: char,
    /// Character index in the input
    pub index: usize,
}

impl BitString {
    /// Empty bit string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are no bits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the bits.
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Append one bit.
    pub fn push(&mut self, bit: bool) {
        self.0.push(bit);
    }

    /// Append the low `width` bits of `value`, most significant first.
    pub fn push_field(&mut self, value: u64, width: u32) {
        for shift in (0..width).rev() {
            self.0.push((value >> shift) & 1 == 1);
        }
    }

    /// Unpack bytes MSB-first, 8 bits per byte.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for byte in bytes {
            for shift in (0..8).rev() {
                bits.push((byte >> shift) & 1 == 1);
            }
        }
        Self(bits)
    }

    /// Binary representation of the big-endian unsigned integer in `bytes`,
    /// without leading zeros. Zero is `"0"`.
    pub fn integer_binary(bytes: &[u8]) -> Self {
        let all = Self::from_bytes(bytes);
        match all.0.iter().position(|&bit| bit) {
            Some(first_one) => Self(all.0[first_one..].to_vec()),
            None => Self(vec![false]),
        }
    }
}

impl From<Vec<bool>> for BitString {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl FromStr for BitString {
    type Err = ParseBitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .enumerate()
            .map(|(index, found)| match found {
                '0' => Ok(false),
                '1' => Ok(true),
                _ => Err(ParseBitsError { found, index }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let bits: BitString = "01101".parse().unwrap();
        assert_eq!(bits.len(), 5);
        assert_eq!(bits.to_string(), "01101");
        assert_eq!(
            "01x".parse::<BitString>(),
            Err(ParseBitsError { found: 'x', index: 2 })
        );
    }

    #[test]
    fn test_push_field() {
        let mut bits = BitString::new();
        bits.push_field(2, 2);
        bits.push_field(1, 2);
        bits.push_field(3, 2);
        assert_eq!(bits.to_string(), "100111");
    }

    #[test]
    fn test_integer_binary_strips_leading_zeros() {
        assert_eq!(BitString::integer_binary(&[0x00, 0x05]).to_string(), "101");
        assert_eq!(BitString::integer_binary(&[0x80]).to_string(), "10000000");
        assert_eq!(BitString::integer_binary(&[0, 0]).to_string(), "0");
        assert_eq!(BitString::integer_binary(&[]).to_string(), "0");
    }
}
