//! Opaque 128-bit identifiers.
//!
//! The read replica returns ids in dashed UUID form while the write side and
//! most operator input use dashless hex. Both forms parse to the same
//! [`ObjectId`], so comparisons, hashing and set membership never depend on
//! presentation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of an entity, relation, property or type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Parses an id from dashed or dashless hex, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the string is not 32 hex digits,
    /// with or without the four UUID dashes.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let valid_shape = match trimmed.len() {
            32 => trimmed.bytes().all(|b| b.is_ascii_hexdigit()),
            36 => trimmed.bytes().enumerate().all(|(i, b)| match i {
                8 | 13 | 18 | 23 => b == b'-',
                _ => b.is_ascii_hexdigit(),
            }),
            _ => false,
        };
        if !valid_shape {
            return Err(Error::InvalidInput(format!("malformed id: '{trimmed}'")));
        }
        Uuid::try_parse(trimmed)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("malformed id '{trimmed}': {e}")))
    }

    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives a stable id from `namespace` and `name`.
    ///
    /// The same inputs always give the same id, so ops that create a
    /// derived object can be replayed without producing a second one.
    #[must_use]
    pub fn derive(namespace: Self, name: &str) -> Self {
        Self(Uuid::new_v5(&namespace.0, name.as_bytes()))
    }

    /// Builds an id from the low 16 bytes of a 32-byte hex word (`0x`-prefixed or not).
    ///
    /// Event topics carry ids left-padded to a full word.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the word is not 64 hex digits.
    pub fn from_word_hex(word: &str) -> Result<Self> {
        let hex_part = word.trim().trim_start_matches("0x");
        let bytes = hex::decode(hex_part)
            .map_err(|e| Error::InvalidInput(format!("malformed word '{word}': {e}")))?;
        if bytes.len() != 32 {
            return Err(Error::InvalidInput(format!(
                "expected 32-byte word, got {} bytes",
                bytes.len()
            )));
        }
        let array: [u8; 16] = bytes[16..]
            .try_into()
            .map_err(|_| Error::InvalidInput(format!("malformed word '{word}'")))?;
        Ok(Self(Uuid::from_bytes(array)))
    }

    /// Returns the dashless lowercase form.
    #[must_use]
    pub fn to_compact(&self) -> String {
        self.0.simple().to_string()
    }

    /// Returns the dashed lowercase form used by the read replica.
    #[must_use]
    pub fn to_dashed(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_compact()
    }
}

/// Identifier of a space (a partition of the graph with its own governance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(ObjectId);

impl SpaceId {
    /// Wraps an object id as a space id.
    #[must_use]
    pub const fn new(id: ObjectId) -> Self {
        Self(id)
    }

    /// Parses a space id from dashed or dashless hex.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the id is malformed.
    pub fn parse(s: &str) -> Result<Self> {
        ObjectId::parse(s).map(Self)
    }

    /// Returns the underlying object id.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SpaceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Identifier of a governance proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(ObjectId);

impl ProposalId {
    /// Wraps an object id as a proposal id.
    #[must_use]
    pub const fn new(id: ObjectId) -> Self {
        Self(id)
    }

    /// Returns the underlying object id.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test_case("5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b" ; "dashless lowercase")]
    #[test_case("5E6F9B0C2A8D4E1F9A3B7C6D5E4F3A2B" ; "dashless uppercase")]
    #[test_case("5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b" ; "dashed")]
    #[test_case("  5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b  " ; "padded")]
    fn test_parse_canonical_forms(input: &str) {
        let id = ObjectId::parse(input).expect("valid id");
        assert_eq!(id.to_string(), "5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b");
    }

    #[test_case("" ; "empty")]
    #[test_case("5e6f9b0c2a8d" ; "short")]
    #[test_case("zz6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b" ; "non hex")]
    #[test_case("5e6f9b0c2a8d-4e1f-9a3b-7c6d5e4f3a2b" ; "misplaced dashes")]
    #[test_case("{5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b}" ; "braced")]
    fn test_parse_rejects(input: &str) {
        assert!(ObjectId::parse(input).is_err());
    }

    #[test]
    fn test_dashed_and_dashless_are_one_key() {
        let dashed = ObjectId::parse("5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b").expect("dashed");
        let compact = ObjectId::parse("5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b").expect("compact");
        assert_eq!(dashed, compact);

        let mut set = HashSet::new();
        set.insert(dashed);
        assert!(set.contains(&compact));
        assert_eq!(compact.to_dashed(), "5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b");
    }

    #[test]
    fn test_serde_accepts_both_forms_and_emits_compact() {
        let id: ObjectId =
            serde_json::from_str("\"5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b\"").expect("deserialize");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b\"");
    }

    #[test]
    fn test_from_word_hex_takes_low_bytes() {
        let word = "0x000000000000000000000000000000005e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b";
        let id = ObjectId::from_word_hex(word).expect("word");
        assert_eq!(id.to_string(), "5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b");
        assert!(ObjectId::from_word_hex("0x1234").is_err());
    }

    #[test_case("0x0000000000000000000000000000000é5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2" ; "multibyte char at the midpoint")]
    #[test_case("0x0000000000000000000000000000000g5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b" ; "non hex digit")]
    #[test_case("0x00000000000000000000000000000000005e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b" ; "too long")]
    fn test_from_word_hex_rejects(word: &str) {
        assert!(ObjectId::from_word_hex(word).is_err());
    }

    #[test]
    fn test_derive_is_stable_per_input() {
        let space = ObjectId::parse("5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b").expect("id");
        let other = ObjectId::parse("2f3c0b1a9e8d4c7b8a6f5e4d3c2b1a09").expect("id");
        assert_eq!(ObjectId::derive(space, "author"), ObjectId::derive(space, "author"));
        assert_ne!(ObjectId::derive(space, "author"), ObjectId::derive(other, "author"));
        assert_ne!(ObjectId::derive(space, "author"), ObjectId::derive(space, "types"));
    }
}
