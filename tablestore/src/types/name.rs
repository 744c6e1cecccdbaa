//! Name symbols.
//!
//! Tables, scopes and payers are addressed by 64-bit symbols. A symbol can be
//! written as a short string over a 32 character alphabet, which is how
//! callers usually spell them (`"accounts"`, `"alice"`).
//!
//! # Encoding
//!
//! - Characters 1-12 take 5 bits each, packed from the most significant bit.
//! - An optional 13th character takes the low 4 bits, so it is limited to the
//!   first 16 symbols of the alphabet (`.`, `1`-`5`, `a`-`j`).

use std::fmt;
use std::str::FromStr;

/// Alphabet indexed by symbol value.
const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Maximum length of a name string.
pub const MAX_NAME_LEN: usize = 13;

/// A 64-bit name symbol.
///
/// The inner value is public so hosts can hand over raw symbols without a
/// string round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Name(pub u64);

impl Name {
    /// Create a name from its raw symbol value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw symbol value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Parse a name, returning an error for characters outside the alphabet
    /// or strings that do not fit in 64 bits.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        let bytes = s.as_bytes();
        if bytes.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong(bytes.len()));
        }

        let mut value = 0u64;
        for (i, c) in s.chars().enumerate() {
            let symbol = u8::try_from(c)
                .ok()
                .and_then(char_to_symbol)
                .ok_or(NameError::InvalidChar(c))?;
            if i < 12 {
                value |= (symbol & 0x1f) << (64 - 5 * (i + 1));
            } else {
                if symbol > 0x0f {
                    return Err(NameError::InvalidChar(c));
                }
                value |= symbol;
            }
        }

        Ok(Self(value))
    }

    /// Get the big-endian bytes used in storage keys.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Rebuild a name from storage key bytes.
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

const fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; MAX_NAME_LEN];
        let mut tmp = self.0;
        for i in 0..MAX_NAME_LEN {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            #[allow(clippy::cast_possible_truncation)] // masked to at most 5 bits
            let symbol = (tmp & mask) as usize;
            out[MAX_NAME_LEN - 1 - i] = CHARMAP[symbol];
            tmp >>= shift;
        }

        let len = out.iter().rposition(|&c| c != b'.').map_or(0, |i| i + 1);
        // The alphabet is ASCII, so every prefix is valid UTF-8.
        let s = std::str::from_utf8(&out[..len]).map_err(|_| fmt::Error)?;
        f.write_str(s)
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for Name {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Name> for u64 {
    fn from(name: Name) -> Self {
        name.0
    }
}

/// Error returned when a string is not a valid name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The string has more than 13 characters.
    TooLong(usize),
    /// The character is outside the alphabet (or not allowed in position 13).
    InvalidChar(char),
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong(len) => {
                write!(f, "name is {len} characters long (max {MAX_NAME_LEN})")
            }
            Self::InvalidChar(c) => write!(f, "invalid character in name: {c:?}"),
        }
    }
}

impl std::error::Error for NameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(Name::parse("").expect("parse").value(), 0);
        // "eosio" is a well known fixture for this alphabet.
        assert_eq!(
            Name::parse("eosio").expect("parse").value(),
            6_138_663_577_826_885_632
        );
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["accounts", "alice", "bob", "eosio.token", "a.b.c", "zzzzzzzzzzzzj"] {
            let name = Name::parse(s).expect("parse");
            assert_eq!(name.to_string(), s);
        }
    }

    #[test]
    fn test_trailing_dots_are_trimmed() {
        let name = Name::parse("abc..").expect("parse");
        assert_eq!(name, Name::parse("abc").expect("parse"));
        assert_eq!(name.to_string(), "abc");
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert_eq!(Name::parse("Alice"), Err(NameError::InvalidChar('A')));
        assert_eq!(Name::parse("a6"), Err(NameError::InvalidChar('6')));
        assert_eq!(Name::parse("café"), Err(NameError::InvalidChar('é')));
        assert_eq!(Name::parse("ab\u{3a9}"), Err(NameError::InvalidChar('\u{3a9}')));
        assert_eq!(Name::parse("aaaaaaaaaaaaaa"), Err(NameError::TooLong(14)));
        // 13th character must fit in 4 bits
        assert_eq!(
            Name::parse("aaaaaaaaaaaaz"),
            Err(NameError::InvalidChar('z'))
        );
    }

    #[test]
    fn test_ordering_matches_raw_value() {
        let a = Name::parse("alice").expect("parse");
        let b = Name::parse("bob").expect("parse");
        assert!(a < b);
        assert!(a.to_be_bytes() < b.to_be_bytes());
    }
}
