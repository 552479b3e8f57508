use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Characters used for generated IDs (no 0/o, 1/l/i to keep them easy to read aloud)
const ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

/// Length of generated IDs
const GENERATED_LEN: usize = 8;

/// Upper bound for IDs accepted from the wire or from user input
const MAX_LEN: usize = 64;

/// Domain entity: Short, shareable identifier of an endpoint.
///
/// The endpoint ID of whoever creates a room doubles as the room ID.
/// Deserializing goes through [`EndpointId::parse`], so IDs announced by peers
/// obey the same rules as typed ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    /// Create a new random endpoint ID
    pub fn generate() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        let id = bytes
            .iter()
            .take(GENERATED_LEN)
            .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char)
            .collect();
        Self(id)
    }

    /// Parse an endpoint ID (e.g. a room code typed by a user)
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(CoreError::InvalidEndpointId("empty".to_string()));
        }
        if trimmed.len() > MAX_LEN {
            return Err(CoreError::InvalidEndpointId(format!(
                "longer than {} characters",
                MAX_LEN
            )));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(CoreError::InvalidEndpointId(format!(
                "'{}' contains whitespace or '/'",
                trimmed
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for EndpointId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for EndpointId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_short_and_readable() {
        let id = EndpointId::generate();
        assert_eq!(id.as_str().len(), GENERATED_LEN);
        assert!(id.as_str().bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_generate_unique() {
        let id1 = EndpointId::generate();
        let id2 = EndpointId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_parse_trims_input() {
        let id = EndpointId::parse("  a1b2c3  ").unwrap();
        assert_eq!(id.as_str(), "a1b2c3");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(EndpointId::parse("").is_err());
        assert!(EndpointId::parse("   ").is_err());
        assert!(EndpointId::parse("room/1").is_err());
        assert!(EndpointId::parse("two words").is_err());
        assert!(EndpointId::parse(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = EndpointId::parse("alpha").unwrap();
        let b = EndpointId::parse("bravo").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = EndpointId::parse("k7m2x9qa").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"k7m2x9qa\"");

        let deserialized: EndpointId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_deserialize_rejects_invalid() {
        assert!(serde_json::from_str::<EndpointId>("\"\"").is_err());
        assert!(serde_json::from_str::<EndpointId>("\"../evil room\"").is_err());
        assert!(serde_json::from_str::<EndpointId>("\"a/b\"").is_err());
    }
}
