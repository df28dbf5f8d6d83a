// ABOUTME: Tolerant serde helpers for document-store fields
// ABOUTME: JSON-as-text columns, loose dates and role lists that default instead of failing

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::types::ParticipantRole;

/// Parse a stored JSON value, unwrapping it first when it was persisted as text.
/// Anything that does not fit `T` is replaced by `T::default()`.
pub fn parse_json_value<T>(raw: Value) -> T
where
    T: DeserializeOwned + Default,
{
    let value = match raw {
        Value::Null => return T::default(),
        Value::String(text) if text.trim().is_empty() => return T::default(),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Malformed JSON text in stored field, using default");
                return T::default();
            }
        },
        other => other,
    };

    match serde_json::from_value(value) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Stored JSON has unexpected shape, using default");
            T::default()
        }
    }
}

/// Interpret loosely-typed booleans ("true", 1, true).
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// Deserialize a boolean that may have been stored as text or a number.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(truthy(Some(&raw)))
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serialize a structured value as JSON text; deserialize with [`parse_json_value`].
pub mod json_text {
    use super::*;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        let text = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: DeserializeOwned + Default,
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(parse_json_value(raw))
    }
}

/// Optional timestamps that fall back to `None` when unparseable.
pub mod opt_datetime {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw {
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => {
                let parsed = parse_datetime(&text);
                if parsed.is_none() {
                    warn!(value = %text, "Unparseable date in stored field, ignoring");
                }
                parsed
            }
            _ => None,
        })
    }
}

/// Role lists stored as JSON text, a bare role name, or a comma-separated string.
/// Unknown roles are dropped so the list only ever holds seller, buyer or admin.
pub mod role_list {
    use super::*;

    pub fn serialize<S>(roles: &[ParticipantRole], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        json_text::serialize(&roles, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<ParticipantRole>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(parse_roles(raw))
    }

    pub fn parse_roles(raw: Value) -> Vec<ParticipantRole> {
        let names: Vec<String> = match raw {
            Value::String(text) if text.trim_start().starts_with('[') => {
                parse_json_value::<Vec<Value>>(Value::String(text))
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            }
            Value::String(text) => text.split(',').map(str::to_string).collect(),
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let mut roles = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match name.parse::<ParticipantRole>() {
                Ok(role) if !roles.contains(&role) => roles.push(role),
                Ok(_) => {}
                Err(_) => warn!(role = %name, "Ignoring unknown auto-assign role"),
            }
        }
        roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_json_value_accepts_text_and_native() {
        let from_text: Vec<String> = parse_json_value(json!("[\"a\",\"b\"]"));
        let from_native: Vec<String> = parse_json_value(json!(["a", "b"]));
        assert_eq!(from_text, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(from_text, from_native);
    }

    #[test]
    fn test_parse_json_value_defaults_on_garbage() {
        let broken: Vec<String> = parse_json_value(json!("[\"a\","));
        assert!(broken.is_empty());

        let wrong_shape: Vec<String> = parse_json_value(json!({"a": 1}));
        assert!(wrong_shape.is_empty());

        let empty: serde_json::Map<String, Value> = parse_json_value(json!(""));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_parse_roles_variants() {
        use ParticipantRole::*;
        assert_eq!(role_list::parse_roles(json!("seller")), vec![Seller]);
        assert_eq!(role_list::parse_roles(json!("seller, BUYER")), vec![Seller, Buyer]);
        assert_eq!(role_list::parse_roles(json!("[\"buyer\",\"admin\"]")), vec![Buyer, Admin]);
        assert_eq!(role_list::parse_roles(json!(["buyer", "notary", "buyer"])), vec![Buyer]);
        assert!(role_list::parse_roles(Value::Null).is_empty());
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2024-05-01T10:00:00Z").is_some());
        assert!(parse_datetime("2024-05-01").is_some());
        assert!(parse_datetime("next tuesday").is_none());
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!("true"))));
        assert!(truthy(Some(&json!(1))));
        assert!(!truthy(Some(&json!("no"))));
        assert!(!truthy(None));
    }
}
