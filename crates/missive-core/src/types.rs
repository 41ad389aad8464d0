//! Core identifier types for Missive

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MissiveError;

/// A 20-byte account address identifying a user on the signing chain.
///
/// Addresses are rendered lowercase (`0x` + 40 hex chars) everywhere: in
/// document namespace keys, in signed payloads, and in display output.
/// Parsing accepts mixed case but normalizes on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Create an address from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the address
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercased hex form used as a namespace key in profile documents
    pub fn namespace_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = MissiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 40 {
            return Err(MissiveError::InvalidAddress(format!(
                "expected 40 hex chars, got {}",
                stripped.len()
            )));
        }
        let bytes = hex::decode(stripped)
            .map_err(|e| MissiveError::InvalidAddress(e.to_string()))?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of an immutable blob, derived from its content.
///
/// Identical bytes always yield the identical id; equality of ids implies
/// byte-identical content. The string form is opaque to the protocol -
/// whatever the backing content store produces is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    /// Wrap an id string produced by a content store
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let addr: Address = "0xAbCd000000000000000000000000000000001234"
            .parse()
            .expect("Should parse");
        // Display is always lowercase
        assert_eq!(
            addr.to_string(),
            "0xabcd000000000000000000000000000000001234"
        );
        let reparsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(addr, reparsed);
    }

    #[test]
    fn test_address_without_prefix() {
        let addr: Address = "abcd000000000000000000000000000000001234"
            .parse()
            .expect("Should parse without 0x");
        assert_eq!(addr.as_bytes()[0], 0xab);
    }

    #[test]
    fn test_address_rejects_bad_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_rejects_bad_hex() {
        assert!("0xzzzz000000000000000000000000000000001234"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn test_address_serde_as_string() {
        let addr: Address = "0xabcd000000000000000000000000000000001234".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xabcd000000000000000000000000000000001234\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }

    #[test]
    fn test_content_id_transparent_serde() {
        let cid = ContentId::new("QmTest123");
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, "\"QmTest123\"");
    }
}
