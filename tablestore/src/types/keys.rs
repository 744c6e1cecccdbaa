//! Secondary key kinds.
//!
//! Every kind encodes to a fixed-width byte string whose lexicographic order
//! equals the kind's comparison rule, so all five indexes share one ordered
//! medium:
//!
//! - `u64`, `u128`: big-endian.
//! - `Digest256`: high limb then low limb, big-endian (a 256-bit unsigned).
//! - `f64`, `ExtendedFloat`: IEEE total order. Positive values get the sign
//!   bit flipped, negative values get every bit flipped.

use std::fmt;

/// Widest encoded key (`Digest256`).
pub const MAX_KEY_WIDTH: usize = 32;

/// The five secondary index kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKind {
    U64,
    U128,
    Digest256,
    F64,
    F80,
}

impl IndexKind {
    /// All kinds, in snapshot order.
    pub const ALL: [Self; 5] = [Self::U64, Self::U128, Self::Digest256, Self::F64, Self::F80];

    /// Stable numeric code used in snapshots.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::U64 => 0,
            Self::U128 => 1,
            Self::Digest256 => 2,
            Self::F64 => 3,
            Self::F80 => 4,
        }
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::U64),
            1 => Some(Self::U128),
            2 => Some(Self::Digest256),
            3 => Some(Self::F64),
            4 => Some(Self::F80),
            _ => None,
        }
    }

    /// Encoded key width in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::U64 | Self::F64 => 8,
            Self::U128 | Self::F80 => 16,
            Self::Digest256 => 32,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::U64 => "idx64",
            Self::U128 => "idx128",
            Self::Digest256 => "idx256",
            Self::F64 => "idx_double",
            Self::F80 => "idx_long_double",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value usable as a secondary key.
///
/// # Invariants
///
/// - `encode` writes exactly `WIDTH` bytes.
/// - For valid keys `a` and `b`, `a < b` iff `encode(a) < encode(b)`.
/// - `decode(encode(k)) == k` bit for bit.
pub trait SecondaryKey: Copy + fmt::Debug {
    const KIND: IndexKind;
    const WIDTH: usize;

    /// Reject values that cannot take part in the ordering.
    fn validate(&self) -> Result<(), KeyError> {
        Ok(())
    }

    /// Write the order-preserving encoding into `out[..WIDTH]`.
    fn encode(&self, out: &mut [u8]);

    /// Read a key back from its encoding.
    fn decode(bytes: &[u8]) -> Result<Self, KeyError>;

    /// The encoding as an owned buffer.
    fn to_encoded(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::WIDTH];
        self.encode(&mut out);
        out
    }

    /// Erase the key's type.
    fn into_value(self) -> IndexValue;
}

fn check_width(bytes: &[u8], expected: usize) -> Result<(), KeyError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(KeyError::WrongWidth {
            expected,
            actual: bytes.len(),
        })
    }
}

impl SecondaryKey for u64 {
    const KIND: IndexKind = IndexKind::U64;
    const WIDTH: usize = 8;

    fn into_value(self) -> IndexValue {
        IndexValue::U64(self)
    }

    fn encode(&self, out: &mut [u8]) {
        out[..Self::WIDTH].copy_from_slice(&self.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        check_width(bytes, Self::WIDTH)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(Self::from_be_bytes(raw))
    }
}

impl SecondaryKey for u128 {
    const KIND: IndexKind = IndexKind::U128;
    const WIDTH: usize = 16;

    fn into_value(self) -> IndexValue {
        IndexValue::U128(self)
    }

    fn encode(&self, out: &mut [u8]) {
        out[..Self::WIDTH].copy_from_slice(&self.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        check_width(bytes, Self::WIDTH)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        Ok(Self::from_be_bytes(raw))
    }
}

/// A 256-bit digest made of two 128-bit limbs.
///
/// Ordering is that of the 256-bit big-endian integer `hi << 128 | lo`; the
/// derived `Ord` compares `hi` first, which is the same thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest256 {
    pub hi: u128,
    pub lo: u128,
}

impl Digest256 {
    #[must_use]
    pub const fn new(hi: u128, lo: u128) -> Self {
        Self { hi, lo }
    }

    #[must_use]
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut hi = [0u8; 16];
        let mut lo = [0u8; 16];
        hi.copy_from_slice(&bytes[..16]);
        lo.copy_from_slice(&bytes[16..]);
        Self {
            hi: u128::from_be_bytes(hi),
            lo: u128::from_be_bytes(lo),
        }
    }

    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&self.hi.to_be_bytes());
        bytes[16..].copy_from_slice(&self.lo.to_be_bytes());
        bytes
    }
}

impl fmt::Display for Digest256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}{:032x}", self.hi, self.lo)
    }
}

impl SecondaryKey for Digest256 {
    const KIND: IndexKind = IndexKind::Digest256;
    const WIDTH: usize = 32;

    fn into_value(self) -> IndexValue {
        IndexValue::Digest256(self)
    }

    fn encode(&self, out: &mut [u8]) {
        out[..Self::WIDTH].copy_from_slice(&self.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        check_width(bytes, Self::WIDTH)?;
        let mut raw = [0u8; 32];
        raw.copy_from_slice(bytes);
        Ok(Self::from_be_bytes(raw))
    }
}

const F64_SIGN: u64 = 0x8000_0000_0000_0000;

impl SecondaryKey for f64 {
    const KIND: IndexKind = IndexKind::F64;
    const WIDTH: usize = 8;

    fn into_value(self) -> IndexValue {
        IndexValue::F64(self)
    }

    fn validate(&self) -> Result<(), KeyError> {
        if self.is_nan() {
            Err(KeyError::NotANumber)
        } else {
            Ok(())
        }
    }

    fn encode(&self, out: &mut [u8]) {
        let bits = self.to_bits();
        let transformed = if bits & F64_SIGN == 0 {
            bits ^ F64_SIGN
        } else {
            !bits
        };
        out[..Self::WIDTH].copy_from_slice(&transformed.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        check_width(bytes, Self::WIDTH)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        let transformed = u64::from_be_bytes(raw);
        let bits = if transformed & F64_SIGN == 0 {
            !transformed
        } else {
            transformed ^ F64_SIGN
        };
        Ok(Self::from_bits(bits))
    }
}

/// An extended-precision float, held as an IEEE 754 binary128 bit pattern.
///
/// Rust has no native type for it, so the value is carried as raw bits.
/// `f64` values widen exactly and x87 80-bit values convert losslessly.
///
/// Layout: 1 sign bit, 15 exponent bits (bias 16383), 112 fraction bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtendedFloat(pub u128);

impl ExtendedFloat {
    const SIGN: u128 = 1 << 127;
    const EXP_MAX: u128 = 0x7fff;
    const FRAC_BITS: u32 = 112;
    const FRAC_MASK: u128 = (1 << Self::FRAC_BITS) - 1;

    pub const ZERO: Self = Self(0);
    pub const INFINITY: Self = Self(Self::EXP_MAX << Self::FRAC_BITS);
    pub const NEG_INFINITY: Self = Self(Self::SIGN | (Self::EXP_MAX << Self::FRAC_BITS));
    /// Canonical quiet NaN.
    pub const NAN: Self = Self((Self::EXP_MAX << Self::FRAC_BITS) | (1 << (Self::FRAC_BITS - 1)));

    #[must_use]
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn to_bits(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_nan(self) -> bool {
        (self.0 >> Self::FRAC_BITS) & Self::EXP_MAX == Self::EXP_MAX && self.0 & Self::FRAC_MASK != 0
    }

    #[must_use]
    pub const fn is_sign_negative(self) -> bool {
        self.0 & Self::SIGN != 0
    }

    const fn pack(negative: bool, exponent: u128, fraction: u128) -> Self {
        let sign = if negative { Self::SIGN } else { 0 };
        Self(sign | ((exponent & Self::EXP_MAX) << Self::FRAC_BITS) | (fraction & Self::FRAC_MASK))
    }

    /// Widen an `f64`. Every `f64` (including subnormals and NaN payloads)
    /// has an exact binary128 representation.
    #[must_use]
    pub const fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let negative = bits & F64_SIGN != 0;
        let exponent = ((bits >> 52) & 0x7ff) as u128;
        let fraction = (bits & ((1 << 52) - 1)) as u128;

        if exponent == 0x7ff {
            return Self::pack(negative, Self::EXP_MAX, fraction << 60);
        }
        if exponent == 0 {
            if fraction == 0 {
                return Self::pack(negative, 0, 0);
            }
            // Subnormal: normalize around the highest set bit.
            let top = 127 - fraction.leading_zeros() as u128;
            let below_top = fraction & ((1 << top) - 1);
            return Self::pack(
                negative,
                16383 + top - 1074,
                below_top << (Self::FRAC_BITS as u128 - top),
            );
        }
        Self::pack(negative, exponent - 1023 + 16383, fraction << 60)
    }

    /// Convert an x87 80-bit extended value given as its 10 in-memory bytes
    /// (little-endian significand, then sign and exponent).
    ///
    /// Unnormals, pseudo-infinities and pseudo-NaNs have no binary128
    /// counterpart and are rejected.
    pub fn from_x87_bytes(bytes: [u8; 10]) -> Result<Self, KeyError> {
        let mut significand = [0u8; 8];
        significand.copy_from_slice(&bytes[..8]);
        let significand = u64::from_le_bytes(significand);
        let sign_exp = u16::from_le_bytes([bytes[8], bytes[9]]);

        let negative = sign_exp & 0x8000 != 0;
        let exponent = u128::from(sign_exp & 0x7fff);
        let integer_bit = significand >> 63 == 1;
        let fraction = u128::from(significand & !(1 << 63)) << 49;

        if exponent == 0 {
            // Pseudo-denormals carry the integer bit and mean exponent 1.
            let exponent = u128::from(integer_bit);
            return Ok(Self::pack(negative, exponent, fraction));
        }
        if !integer_bit {
            return Err(KeyError::NonCanonical);
        }
        Ok(Self::pack(negative, exponent, fraction))
    }
}

impl From<f64> for ExtendedFloat {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl fmt::Display for ExtendedFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:032x}", self.0)
    }
}

impl SecondaryKey for ExtendedFloat {
    const KIND: IndexKind = IndexKind::F80;
    const WIDTH: usize = 16;

    fn into_value(self) -> IndexValue {
        IndexValue::F80(self)
    }

    fn validate(&self) -> Result<(), KeyError> {
        if self.is_nan() {
            Err(KeyError::NotANumber)
        } else {
            Ok(())
        }
    }

    fn encode(&self, out: &mut [u8]) {
        let transformed = if self.is_sign_negative() {
            !self.0
        } else {
            self.0 ^ Self::SIGN
        };
        out[..Self::WIDTH].copy_from_slice(&transformed.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        check_width(bytes, Self::WIDTH)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        let transformed = u128::from_be_bytes(raw);
        let bits = if transformed & Self::SIGN == 0 {
            !transformed
        } else {
            transformed ^ Self::SIGN
        };
        Ok(Self(bits))
    }
}

/// A secondary key of any kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexValue {
    U64(u64),
    U128(u128),
    Digest256(Digest256),
    F64(f64),
    F80(ExtendedFloat),
}

impl IndexValue {
    #[must_use]
    pub const fn kind(&self) -> IndexKind {
        match self {
            Self::U64(_) => IndexKind::U64,
            Self::U128(_) => IndexKind::U128,
            Self::Digest256(_) => IndexKind::Digest256,
            Self::F64(_) => IndexKind::F64,
            Self::F80(_) => IndexKind::F80,
        }
    }

    pub fn validate(&self) -> Result<(), KeyError> {
        match self {
            Self::U64(k) => k.validate(),
            Self::U128(k) => k.validate(),
            Self::Digest256(k) => k.validate(),
            Self::F64(k) => k.validate(),
            Self::F80(k) => k.validate(),
        }
    }

    /// The order-preserving encoding of the key.
    #[must_use]
    pub fn to_encoded(&self) -> Vec<u8> {
        match self {
            Self::U64(k) => k.to_encoded(),
            Self::U128(k) => k.to_encoded(),
            Self::Digest256(k) => k.to_encoded(),
            Self::F64(k) => k.to_encoded(),
            Self::F80(k) => k.to_encoded(),
        }
    }

    /// Decode a key of the given kind from its encoding.
    pub fn decode(kind: IndexKind, bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(match kind {
            IndexKind::U64 => Self::U64(u64::decode(bytes)?),
            IndexKind::U128 => Self::U128(u128::decode(bytes)?),
            IndexKind::Digest256 => Self::Digest256(Digest256::decode(bytes)?),
            IndexKind::F64 => Self::F64(f64::decode(bytes)?),
            IndexKind::F80 => Self::F80(ExtendedFloat::decode(bytes)?),
        })
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U64(k) => write!(f, "{k}"),
            Self::U128(k) => write!(f, "{k}"),
            Self::Digest256(k) => write!(f, "{k}"),
            Self::F64(k) => write!(f, "{k:?}"),
            Self::F80(k) => write!(f, "{k}"),
        }
    }
}

/// Errors for key values that cannot be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// NaN has no place in the total order used by float indexes.
    NotANumber,
    /// Encoded key had the wrong number of bytes.
    WrongWidth { expected: usize, actual: usize },
    /// x87 encoding without a binary128 equivalent.
    NonCanonical,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber => write!(f, "NaN is not a valid secondary key"),
            Self::WrongWidth { expected, actual } => {
                write!(f, "encoded key is {actual} bytes, expected {expected}")
            }
            Self::NonCanonical => write!(f, "non-canonical extended float encoding"),
        }
    }
}

impl std::error::Error for KeyError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_encoded_order<K: SecondaryKey>(sorted: &[K]) {
        for pair in sorted.windows(2) {
            assert!(
                pair[0].to_encoded() < pair[1].to_encoded(),
                "{:?} should encode below {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_integer_order() {
        assert_encoded_order(&[0u64, 1, 255, 256, u64::MAX]);
        assert_encoded_order(&[0u128, 1, u128::from(u64::MAX) + 1, u128::MAX]);
    }

    #[test]
    fn test_digest_limb_boundary() {
        let low = Digest256::new(0, u128::MAX);
        let high = Digest256::new(1, 0);
        assert!(low < high);
        assert_encoded_order(&[Digest256::new(0, 0), low, high, Digest256::new(u128::MAX, 0)]);
    }

    #[test]
    fn test_digest_bytes() {
        let d = Digest256::new(1, 2);
        let bytes = d.to_be_bytes();
        assert_eq!(bytes[15], 1);
        assert_eq!(bytes[31], 2);
        assert_eq!(Digest256::from_be_bytes(bytes), d);
        assert_eq!(Digest256::decode(&d.to_encoded()), Ok(d));
        assert_eq!(d.to_string().len(), 64);
    }

    #[test]
    fn test_f64_total_order() {
        assert_encoded_order(&[
            f64::NEG_INFINITY,
            -1.5,
            -f64::MIN_POSITIVE,
            -0.0,
            0.0,
            f64::from_bits(1),
            1.0,
            f64::MAX,
            f64::INFINITY,
        ]);
    }

    #[test]
    fn test_f64_decode_restores_bits() {
        for v in [-0.0, 0.0, -3.25, 1e300, f64::NEG_INFINITY] {
            let decoded = f64::decode(&v.to_encoded()).expect("decode");
            assert_eq!(decoded.to_bits(), v.to_bits());
        }
    }

    #[test]
    fn test_nan_is_rejected() {
        assert_eq!(f64::NAN.validate(), Err(KeyError::NotANumber));
        assert_eq!(ExtendedFloat::NAN.validate(), Err(KeyError::NotANumber));
        assert_eq!(
            ExtendedFloat::from_f64(f64::NAN).validate(),
            Err(KeyError::NotANumber)
        );
        assert!(1.0f64.validate().is_ok());
        assert!(ExtendedFloat::INFINITY.validate().is_ok());
    }

    #[test]
    fn test_extended_from_f64_values() {
        // 1.0: exponent equals the bias, fraction zero.
        assert_eq!(ExtendedFloat::from_f64(1.0).to_bits(), 0x3fff_u128 << 112);
        assert_eq!(
            ExtendedFloat::from_f64(-2.0).to_bits(),
            (1 << 127) | (0x4000_u128 << 112)
        );
        assert_eq!(ExtendedFloat::from_f64(f64::INFINITY), ExtendedFloat::INFINITY);
        assert_eq!(ExtendedFloat::from_f64(0.0), ExtendedFloat::ZERO);
        // Smallest f64 subnormal is 2^-1074.
        assert_eq!(
            ExtendedFloat::from_f64(f64::from_bits(1)).to_bits(),
            (16383_u128 - 1074) << 112
        );
    }

    #[test]
    fn test_extended_order_matches_f64_order() {
        let values = [
            f64::NEG_INFINITY,
            -1e10,
            -1.0,
            -f64::from_bits(3),
            -0.0,
            0.0,
            f64::from_bits(1),
            f64::from_bits(2),
            f64::MIN_POSITIVE,
            0.5,
            1.0,
            f64::MAX,
            f64::INFINITY,
        ];
        let widened: Vec<ExtendedFloat> = values.iter().map(|&v| v.into()).collect();
        assert_encoded_order(&widened);
    }

    #[test]
    fn test_extended_decode_round_trip() {
        let v = ExtendedFloat::from_f64(-123.456);
        assert_eq!(ExtendedFloat::decode(&v.to_encoded()), Ok(v));
    }

    #[test]
    fn test_from_x87_bytes() {
        // 1.0 in x87: integer bit set, exponent 0x3fff.
        let mut one = [0u8; 10];
        one[..8].copy_from_slice(&(1u64 << 63).to_le_bytes());
        one[8..].copy_from_slice(&0x3fff_u16.to_le_bytes());
        assert_eq!(
            ExtendedFloat::from_x87_bytes(one),
            Ok(ExtendedFloat::from_f64(1.0))
        );

        // Unnormal: exponent set but integer bit clear.
        let mut unnormal = one;
        unnormal[..8].copy_from_slice(&1u64.to_le_bytes());
        assert_eq!(
            ExtendedFloat::from_x87_bytes(unnormal),
            Err(KeyError::NonCanonical)
        );

        // Infinity and NaN.
        let mut inf = [0u8; 10];
        inf[..8].copy_from_slice(&(1u64 << 63).to_le_bytes());
        inf[8..].copy_from_slice(&0x7fff_u16.to_le_bytes());
        assert_eq!(ExtendedFloat::from_x87_bytes(inf), Ok(ExtendedFloat::INFINITY));
        let mut nan = inf;
        nan[..8].copy_from_slice(&(3u64 << 62).to_le_bytes());
        assert!(ExtendedFloat::from_x87_bytes(nan).expect("nan").is_nan());
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        assert_eq!(
            u64::decode(&[0u8; 4]),
            Err(KeyError::WrongWidth {
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn test_kind_codes() {
        for kind in IndexKind::ALL {
            assert_eq!(IndexKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(IndexKind::from_code(9), None);
        assert_eq!(IndexKind::F80.width(), ExtendedFloat::WIDTH);
        assert_eq!(IndexKind::Digest256.width(), MAX_KEY_WIDTH);
    }

    #[test]
    fn test_index_value_decode_matches_kind() {
        let values = [
            IndexValue::U64(42),
            IndexValue::U128(u128::MAX),
            IndexValue::Digest256(Digest256::new(1, 2)),
            IndexValue::F64(-2.5),
            IndexValue::F80(ExtendedFloat::from_f64(0.125)),
        ];
        for value in values {
            let decoded = IndexValue::decode(value.kind(), &value.to_encoded()).expect("decode");
            assert_eq!(decoded, value);
            assert_eq!(value.to_encoded().len(), value.kind().width());
        }

        assert_eq!(IndexValue::F64(f64::NAN).validate(), Err(KeyError::NotANumber));
        assert!(IndexValue::decode(IndexKind::U128, &[0; 8]).is_err());
    }
}
