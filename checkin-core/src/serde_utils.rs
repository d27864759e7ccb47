use crate::errors::{CheckinError, Result};

/// Serializes a value to pretty JSON with canonical error handling.
pub fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|err| CheckinError::Serialization(err.to_string()))
}

/// Serializes a value to compact JSON, the form stored in the rule text field.
pub fn to_compact_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|err| CheckinError::Serialization(err.to_string()))
}

/// Deserializes a JSON string into the provided type with shared error semantics.
pub fn from_json_str<T: serde::de::DeserializeOwned>(input: &str) -> Result<T> {
    serde_json::from_str(input).map_err(|err| CheckinError::Deserialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_round_trip() {
        let value = serde_json::json!({"and": [{"": []}]});
        let json = to_pretty_json(&value).expect("serialize");
        let decoded: serde_json::Value = from_json_str(&json).expect("deserialize");
        assert_eq!(decoded, value);
    }

    #[test]
    fn compact_output_keeps_key_order() {
        let value: serde_json::Value =
            from_json_str(r#"{"inList":[{"var":"product"}],"__result":true}"#).expect("parse");
        let json = to_compact_json(&value).expect("serialize");
        assert_eq!(json, r#"{"inList":[{"var":"product"}],"__result":true}"#);
    }

    #[test]
    fn reports_deserialization_errors() {
        let err = from_json_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(err, CheckinError::Deserialization(_)));
    }
}
