//! Seed → bit string.
//!
//! Two families of conversion:
//!
//! - [`HashMode::Normalized`] quantises each number against the min/max of
//!   the set into a 2-bit field, so the pattern follows the *shape* of the
//!   input.
//! - Every other mode hashes the comma-joined decimal text of the numbers and
//!   uses the digest's integer value in binary. Leading zero bits of the
//!   digest are dropped, so the bit count varies from seed to seed; that is
//!   part of the pattern and must not be padded away.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};

use crate::bits::BitString;

/// How a seed is turned into bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    /// Mode 0: min/max normalisation into 2-bit fields.
    Normalized,
    /// Mode 1
    Md5,
    /// Mode 2
    Sha1,
    /// Mode 3
    Sha224,
    /// Mode 4
    Sha384,
    /// Mode 5
    Sha512,
    /// Mode 6
    Sha3_224,
    /// Mode 7
    Sha3_256,
    /// Mode 8
    Sha3_384,
    /// Mode 9
    Sha3_512,
    /// Any other mode number.
    Sha256,
}

impl HashMode {
    /// Map a numeric mode to its conversion. Unknown numbers (including the
    /// `10` that `seed mod 11` can produce) select SHA-256.
    pub const fn from_index(mode: u8) -> Self {
        match mode {
            0 => Self::Normalized,
            1 => Self::Md5,
            2 => Self::Sha1,
            3 => Self::Sha224,
            4 => Self::Sha384,
            5 => Self::Sha512,
            6 => Self::Sha3_224,
            7 => Self::Sha3_256,
            8 => Self::Sha3_384,
            9 => Self::Sha3_512,
            _ => Self::Sha256,
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Md5 => Md5::digest(data).to_vec(),
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha224 => Sha224::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
            Self::Sha3_224 => Sha3_224::digest(data).to_vec(),
            Self::Sha3_256 => Sha3_256::digest(data).to_vec(),
            Self::Sha3_384 => Sha3_384::digest(data).to_vec(),
            Self::Sha3_512 => Sha3_512::digest(data).to_vec(),
            Self::Normalized | Self::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

/// Convert `numbers` to a bit string using `mode`.
///
/// An empty input yields an empty bit string, which the tiler renders as a
/// blank plane.
pub fn numbers_to_bitstring(numbers: &[f64], mode: HashMode) -> BitString {
    if numbers.is_empty() {
        tracing::debug!("empty seed, degenerate pattern");
        return BitString::new();
    }
    match mode {
        HashMode::Normalized => normalized_bits(numbers),
        _ => {
            let digest = mode.digest(seed_text(numbers).as_bytes());
            BitString::integer_binary(&digest)
        }
    }
}

/// Comma-joined decimal text of `numbers`, as fed to the digests.
pub fn seed_text(numbers: &[f64]) -> String {
    numbers
        .iter()
        .map(|&n| float_text(n))
        .collect::<Vec<_>>()
        .join(",")
}

/// Shortest round-trip decimal text of `value`.
///
/// Integral values keep a trailing `.0`; magnitudes below `1e-4` or from
/// `1e16` up switch to exponent form with a signed, two-digit exponent
/// (`1e+16`, `1.5e-05`).
pub fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{value:e}");
        let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs());
    }
    let text = format!("{value}");
    if text.contains('.') {
        text
    } else {
        text + ".0"
    }
}

fn normalized_bits(numbers: &[f64]) -> BitString {
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    #[allow(clippy::float_cmp)]
    let all_equal = min == max;
    if all_equal {
        return integral_binary(numbers[0]);
    }

    let span = max - min;
    let mut bits = BitString::new();
    for &n in numbers {
        let norm = ((n - min) / span).clamp(0.0, 1.0);
        // Round half up onto {0, 1, 2, 3}; NaN lands on 0.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let level = ((norm * 3.0 + 0.5).floor() as u64).min(3);
        bits.push_field(level, 2);
    }
    bits
}

/// Binary digits of the integer part of `value`'s magnitude.
///
/// Exact for every finite `f64`; non-finite values yield an empty string.
fn integral_binary(value: f64) -> BitString {
    if !value.is_finite() {
        return BitString::new();
    }
    let whole = value.abs().trunc();
    if whole < 1.0 {
        return BitString::from(vec![false]);
    }
    // whole = mantissa * 2^exponent, with the implicit leading bit restored.
    let raw = whole.to_bits();
    let biased = i64::try_from((raw >> 52) & 0x7ff).unwrap_or(0);
    let exponent = biased - 1075;
    let mantissa = (raw & ((1u64 << 52) - 1)) | (1u64 << 52);

    let mut bits = BitString::new();
    if exponent >= 0 {
        push_binary(&mut bits, mantissa);
        for _ in 0..exponent {
            bits.push(false);
        }
    } else {
        push_binary(&mut bits, mantissa >> exponent.unsigned_abs());
    }
    bits
}

fn push_binary(bits: &mut BitString, value: u64) {
    let width = u64::BITS - value.leading_zeros();
    bits.push_field(value, width.max(1));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MD5_OF_1700000000_5: &str = concat!(
        "1110001000101011011100001001101101111111011010111101000110101000",
        "1011101001101000110001010101000000111010001101111010001011111001",
    );

    #[test]
    fn test_float_text() {
        assert_eq!(float_text(1_700_000_000.0), "1700000000.0");
        assert_eq!(float_text(1_700_000_000.5), "1700000000.5");
        assert_eq!(float_text(123_456_789_012.25), "123456789012.25");
        assert_eq!(float_text(0.1), "0.1");
        assert_eq!(float_text(-0.0), "-0.0");
        assert_eq!(float_text(1e16), "1e+16");
        assert_eq!(float_text(1.5e-5), "1.5e-05");
        assert_eq!(float_text(f64::NAN), "nan");
        assert_eq!(float_text(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_seed_text_joins_with_commas() {
        assert_eq!(seed_text(&[1.0, 2.5, -3.0]), "1.0,2.5,-3.0");
    }

    #[test]
    fn test_mode_index_mapping() {
        assert_eq!(HashMode::from_index(0), HashMode::Normalized);
        assert_eq!(HashMode::from_index(1), HashMode::Md5);
        assert_eq!(HashMode::from_index(9), HashMode::Sha3_512);
        assert_eq!(HashMode::from_index(10), HashMode::Sha256);
        assert_eq!(HashMode::from_index(255), HashMode::Sha256);
    }

    #[test]
    fn test_md5_bit_exact() {
        let bits = numbers_to_bitstring(&[1_700_000_000.5], HashMode::Md5);
        assert_eq!(bits.to_string(), MD5_OF_1700000000_5);
    }

    #[test]
    fn test_digest_lengths_drop_leading_zeros() {
        // Bit counts of each digest of "1700000000.5" once leading zeros are dropped.
        let expected = [
            (1, 128),
            (2, 160),
            (3, 224),
            (4, 382),
            (5, 512),
            (6, 224),
            (7, 253),
            (8, 384),
            (9, 512),
            (10, 251),
        ];
        for (mode, len) in expected {
            let bits = numbers_to_bitstring(&[1_700_000_000.5], HashMode::from_index(mode));
            assert_eq!(bits.len(), len, "mode {mode}");
            assert_eq!(bits.as_slice().first(), Some(&true), "mode {mode}");
        }
    }

    #[test]
    fn test_md5_digest_with_leading_zero_nibble() {
        // md5("4.0") = 07078a97...: five leading zero bits are dropped.
        let bits = numbers_to_bitstring(&[4.0], HashMode::Md5);
        assert_eq!(bits.len(), 123);
    }

    #[test]
    fn test_hash_modes_are_deterministic() {
        for mode in 1..=10 {
            let mode = HashMode::from_index(mode);
            let a = numbers_to_bitstring(&[35.0, 139.0], mode);
            let b = numbers_to_bitstring(&[35.0, 139.0], mode);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_normalized_all_equal_is_plain_binary() {
        assert_eq!(
            numbers_to_bitstring(&[5.0], HashMode::Normalized).to_string(),
            "101"
        );
        assert_eq!(
            numbers_to_bitstring(&[6.9, 6.9, 6.9], HashMode::Normalized).to_string(),
            "110"
        );
        assert_eq!(
            numbers_to_bitstring(&[1_700_000_000.75], HashMode::Normalized).to_string(),
            format!("{:b}", 1_700_000_000u64)
        );
        assert_eq!(
            numbers_to_bitstring(&[0.25], HashMode::Normalized).to_string(),
            "0"
        );
    }

    #[test]
    fn test_normalized_large_integral_value_is_exact() {
        // 2^60 + 2^10 is exactly representable.
        let value = (1u64 << 60) + (1u64 << 10);
        #[allow(clippy::cast_precision_loss)]
        let bits = numbers_to_bitstring(&[value as f64], HashMode::Normalized);
        assert_eq!(bits.to_string(), format!("{value:b}"));

        let bits = numbers_to_bitstring(&[2f64.powi(80)], HashMode::Normalized);
        assert_eq!(bits.len(), 81);
        assert_eq!(bits.as_slice().iter().filter(|&&b| b).count(), 1);
    }

    #[test]
    fn test_normalized_quantises_half_up() {
        // 0 → 0, 0.5 → 1.5 → 2, 1 → 3
        assert_eq!(
            numbers_to_bitstring(&[1.0, 2.0, 3.0], HashMode::Normalized).to_string(),
            "001011"
        );
        assert_eq!(
            numbers_to_bitstring(&[10.0, 0.0], HashMode::Normalized).to_string(),
            "1100"
        );
    }

    #[test]
    fn test_empty_seed_is_empty() {
        for mode in 0..=10 {
            assert!(numbers_to_bitstring(&[], HashMode::from_index(mode)).is_empty());
        }
    }

    #[test]
    fn test_non_finite_single_value_degenerates() {
        assert!(numbers_to_bitstring(&[f64::INFINITY], HashMode::Normalized).is_empty());
    }
}
