use crate::error::{ErrorKind, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Type tag stored alongside every feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Number,
    Binary,
    Json,
}
impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Binary => "binary",
            Self::Json => "json",
        }
    }
}
impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for ValueKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "text" => Self::Text,
            "number" => Self::Number,
            "binary" => Self::Binary,
            "json" => Self::Json,
            other => return Err(other.to_string()),
        })
    }
}

/// The payload of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FeatureValue {
    Text(String),
    Number(f64),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}
impl FeatureValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Number(_) => ValueKind::Number,
            Self::Binary(_) => ValueKind::Binary,
            Self::Json(_) => ValueKind::Json,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Serialize into the textual form kept in the cache.
    ///
    /// Binary payloads are base64 encoded, JSON is stored compact, numbers use
    /// the shortest representation that parses back to the same `f64`.
    pub fn encode(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
            Self::Binary(bytes) => BASE64.encode(bytes),
            Self::Json(value) => value.to_string(),
        }
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(kind: ValueKind, stored: &str) -> Result<Self> {
        Ok(match kind {
            ValueKind::Text => Self::Text(stored.to_string()),
            ValueKind::Number => Self::Number(stored.parse::<f64>().or_raise(|| ErrorKind::InvalidValue {
                field: "number",
                value: stored.to_string(),
            })?),
            ValueKind::Binary => Self::Binary(BASE64.decode(stored).or_raise(|| ErrorKind::InvalidValue {
                field: "binary",
                value: format!("{} base64 characters", stored.len()),
            })?),
            ValueKind::Json => Self::Json(serde_json::from_str(stored).or_raise(|| ErrorKind::InvalidValue {
                field: "json",
                value: stored.chars().take(64).collect(),
            })?),
        })
    }
}
impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}
impl From<u64> for FeatureValue {
    fn from(value: u64) -> Self {
        // Precision loss above 2^53 is acceptable for counts and sizes.
        Self::Number(value as f64)
    }
}
impl From<u32> for FeatureValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}
impl From<Vec<u8>> for FeatureValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}
impl From<serde_json::Value> for FeatureValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(FeatureValue::Text("hello world".to_string()), "hello world")]
    #[case(FeatureValue::Number(11.0), "11")]
    #[case(FeatureValue::Number(0.1), "0.1")]
    #[case(FeatureValue::Binary(vec![0, 159, 255]), "AJ//")]
    #[case(FeatureValue::Json(json!({"a": [1, 2]})), r#"{"a":[1,2]}"#)]
    fn test_encode(#[case] value: FeatureValue, #[case] expected: &str) {
        let encoded = value.encode();
        assert_eq!(encoded, expected);
        assert_eq!(FeatureValue::decode(value.kind(), &encoded).unwrap(), value);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = FeatureValue::decode(ValueKind::Number, "eleven").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidValue { field: "number", .. }));
        assert!(FeatureValue::decode(ValueKind::Binary, "not base64!").is_err());
        assert!(FeatureValue::decode(ValueKind::Json, "{").is_err());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!("json".parse::<ValueKind>().unwrap(), ValueKind::Json);
        assert!("blob".parse::<ValueKind>().is_err());
    }
}
