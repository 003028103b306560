//! Type-safe on-chain identifier.
//!
//! [`ObjectId`] is a newtype over the canonical hex form of a 32-byte Sui
//! object id. Account addresses share the same format, so owners and kiosk
//! ids use the same type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Number of bytes in an object id or address.
pub const OBJECT_ID_LEN: usize = 32;

/// Identifier of an on-chain object or account address.
///
/// Always stored canonically: `0x` prefix, lowercase, left-padded to 64 hex
/// digits. `0x2` and `0x000…0002` therefore compare equal, which matters
/// because the node abbreviates framework ids but never object ids.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Parses and canonicalizes a hex id with or without the `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the input is empty, longer
    /// than 64 hex digits, or contains non-hex characters.
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > OBJECT_ID_LEN * 2 {
            return Err(GatewayError::InvalidRequest(format!(
                "invalid object id length: {raw}"
            )));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GatewayError::InvalidRequest(format!(
                "invalid object id: {raw}"
            )));
        }
        Ok(Self(format!(
            "0x{:0>width$}",
            digits.to_ascii_lowercase(),
            width = OBJECT_ID_LEN * 2
        )))
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the raw 32 bytes, as used in BCS encoding.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the canonical form is somehow
    /// not valid hex.
    pub fn to_bytes(&self) -> Result<[u8; OBJECT_ID_LEN], GatewayError> {
        let digits = self.0.get(2..).unwrap_or_default();
        let decoded = hex::decode(digits)
            .map_err(|e| GatewayError::Internal(format!("object id hex: {e}")))?;
        <[u8; OBJECT_ID_LEN]>::try_from(decoded.as_slice())
            .map_err(|_| GatewayError::Internal(format!("object id length: {}", self.0)))
    }

    /// Abbreviated form for log lines and fallback names (`0x1234…abcd`).
    #[must_use]
    pub fn short(&self) -> String {
        let head = self.0.get(..6).unwrap_or_default();
        let tail = self.0.get(self.0.len().saturating_sub(4)..).unwrap_or_default();
        format!("{head}…{tail}")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_are_padded() {
        let Ok(id) = ObjectId::parse("0x2") else {
            panic!("valid id");
        };
        assert_eq!(id.as_str().len(), 66);
        assert!(id.as_str().ends_with("02"));
        assert!(id.as_str().starts_with("0x000"));
    }

    #[test]
    fn case_and_prefix_are_normalized() {
        let a = ObjectId::parse("0xABCDEF");
        let b = ObjectId::parse("abcdef");
        assert!(a.is_ok());
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_non_hex() {
        assert!(ObjectId::parse("0xzz").is_err());
        assert!(ObjectId::parse("").is_err());
        assert!(ObjectId::parse(&format!("0x{}", "1".repeat(65))).is_err());
    }

    #[test]
    fn to_bytes_is_big_endian() {
        let Ok(id) = ObjectId::parse("0x0102") else {
            panic!("valid id");
        };
        let Ok(bytes) = id.to_bytes() else {
            panic!("bytes");
        };
        assert_eq!(bytes.get(30), Some(&1));
        assert_eq!(bytes.get(31), Some(&2));
        assert_eq!(bytes.first(), Some(&0));
    }

    #[test]
    fn deserializes_through_canonical_form() {
        let parsed: Result<ObjectId, _> = serde_json::from_str("\"0x6\"");
        let Ok(id) = parsed else {
            panic!("deserialization failed");
        };
        assert_eq!(id, ObjectId::parse("0x06").unwrap_or_else(|_| panic!("valid id")));

        let bad: Result<ObjectId, _> = serde_json::from_str("\"kiosk\"");
        assert!(bad.is_err());
    }

    #[test]
    fn short_form_keeps_head_and_tail() {
        let Ok(id) = ObjectId::parse("0xabcdef0123") else {
            panic!("valid id");
        };
        let short = id.short();
        assert!(short.starts_with("0x0000"));
        assert!(short.ends_with("0123"));
    }
}
