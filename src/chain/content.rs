//! Helpers for walking Move object content as returned by the node.
//!
//! Nested structs come back as `{"type": "...", "fields": {...}}`, `UID`s as
//! `{"id": "0x..."}`, and u64 values as JSON strings. The accessors here
//! paper over those shapes and return `None` on any mismatch, which callers
//! treat as "entity not found".

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::ObjectId;

/// Returns the field map of a Move struct value, unwrapping `fields` if present.
#[must_use]
pub fn fields(value: &Value) -> Option<&Map<String, Value>> {
    match value.get("fields") {
        Some(Value::Object(inner)) => Some(inner),
        _ => value.as_object(),
    }
}

/// Returns a named field of a Move struct value.
#[must_use]
pub fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    fields(value)?.get(name)
}

/// Returns the first present field among `names`.
#[must_use]
pub fn field_any<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| field(value, name))
}

/// Walks a path of nested struct fields.
#[must_use]
pub fn path<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| field(current, segment))
}

/// Reads a u64 encoded either as a JSON string or a JSON number.
#[must_use]
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Reads an object id from a plain string, an `ID`, or a `UID` shape.
#[must_use]
pub fn as_object_id(value: &Value) -> Option<ObjectId> {
    match value {
        Value::String(s) => ObjectId::parse(s).ok(),
        Value::Object(_) => field(value, "id").and_then(as_object_id),
        _ => None,
    }
}

/// Renders a scalar value (string, number, bool) as a display string.
#[must_use]
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Repr {
    Number(u64),
    Text(String),
}

impl U64Repr {
    fn into_u64<E: de::Error>(self) -> Result<u64, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .parse()
                .map_err(|_| E::custom(format!("invalid u64 string: {s}"))),
        }
    }
}

/// Serde adapter: u64 from a JSON string or number.
///
/// # Errors
///
/// Fails when the value is neither a non-negative integer nor a string
/// holding one.
pub fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    U64Repr::deserialize(deserializer)?.into_u64()
}

/// Serde adapter: optional u64 from a JSON string, number, or null.
///
/// # Errors
///
/// Fails when a present value is not a valid u64.
pub fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<U64Repr>::deserialize(deserializer)?
        .map(U64Repr::into_u64)
        .transpose()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pool_content() -> Value {
        json!({
            "id": {"id": "0xf0"},
            "name": "Genesis",
            "staked_nfts": {
                "type": "0x2::table::Table<0x2::object::ID, 0xabc::staking::StakeInfo>",
                "fields": {"id": {"id": "0x7ab1e"}, "size": "2"}
            }
        })
    }

    #[test]
    fn path_walks_nested_fields() {
        let content = pool_content();
        let table = path(&content, &["staked_nfts", "id"]).and_then(as_object_id);
        assert_eq!(table, ObjectId::parse("0x7ab1e").ok());
        let size = path(&content, &["staked_nfts", "size"]).and_then(as_u64);
        assert_eq!(size, Some(2));
    }

    #[test]
    fn missing_link_is_none() {
        let content = pool_content();
        assert!(path(&content, &["staked_nfts", "missing", "id"]).is_none());
        assert!(path(&content, &["name", "id"]).is_none());
    }

    #[test]
    fn u64_accepts_both_encodings() {
        assert_eq!(as_u64(&json!("18446744073709551615")), Some(u64::MAX));
        assert_eq!(as_u64(&json!(7)), Some(7));
        assert_eq!(as_u64(&json!(-7)), None);
        assert_eq!(as_u64(&json!("seven")), None);
    }

    #[test]
    fn field_any_prefers_first_match() {
        let value = json!({"fields": {"staked_at": "2", "stake_time": "1"}});
        let found = field_any(&value, &["stake_time", "staked_at"]).and_then(as_u64);
        assert_eq!(found, Some(1));
    }

    #[test]
    fn serde_adapters() {
        #[derive(Deserialize)]
        struct Amounts {
            #[serde(deserialize_with = "de_u64")]
            a: u64,
            #[serde(default, deserialize_with = "de_opt_u64")]
            b: Option<u64>,
        }
        let Ok(amounts) = serde_json::from_value::<Amounts>(json!({"a": "10", "b": null})) else {
            panic!("amounts should deserialize");
        };
        assert_eq!(amounts.a, 10);
        assert_eq!(amounts.b, None);
        assert!(serde_json::from_value::<Amounts>(json!({"a": "x"})).is_err());
    }
}
