use crate::core::data_type::DataType;
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

/// A decoded attribute value.
///
/// Numbers read from a table keep their exact decimal representation in
/// [`Value::Number`]; arithmetic produced by transformations lands in
/// [`Value::Float`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(BigDecimal),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    StringSet(Vec<String>),
    NumberSet(Vec<BigDecimal>),
    BytesSet(Vec<Vec<u8>>),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Number(BigDecimal::from(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::String(v.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for numbers and for strings that parse as a number.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Number(_) | Value::Float(_) => true,
            Value::String(s) => parse_f64(s).is_some(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => v.to_f64(),
            Value::Float(v) => Some(*v),
            Value::String(v) => parse_f64(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::String(v) => match v.to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Plain-text rendering used for template interpolation and string
    /// transformations. Strings render without quotes, structured values as
    /// JSON text.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(v) => v.to_string(),
            Value::Number(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::String(v) => v.clone(),
            Value::Bytes(v) => String::from_utf8_lossy(v).to_string(),
            other => other.to_json().to_string(),
        }
    }

    /// Lossy JSON view of the value, used for display and for rendering
    /// structured values inside interpolated templates.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Boolean(v) => Json::Bool(*v),
            Value::Number(v) => serde_json::Number::from_str(&v.to_string())
                .map(Json::Number)
                .unwrap_or_else(|_| Json::String(v.to_string())),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(v) => Json::String(v.clone()),
            Value::Bytes(v) => Json::String(String::from_utf8_lossy(v).to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::StringSet(items) => {
                Json::Array(items.iter().cloned().map(Json::String).collect())
            }
            Value::NumberSet(items) => Json::Array(
                items
                    .iter()
                    .map(|n| Value::Number(n.clone()).to_json())
                    .collect(),
            ),
            Value::BytesSet(items) => Json::Array(
                items
                    .iter()
                    .map(|b| Json::String(String::from_utf8_lossy(b).to_string()))
                    .collect(),
            ),
        }
    }

    /// Builds a value from JSON. Integers and decimals become exact numbers.
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Boolean(*v),
            Json::Number(n) => BigDecimal::from_str(&n.to_string())
                .map(Value::Number)
                .unwrap_or_else(|_| Value::Float(n.as_f64().unwrap_or_default())),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Number(a), Number(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Number(a), Float(b)) => a.to_f64().and_then(|a| a.partial_cmp(b)),
            (Float(a), Number(b)) => b.to_f64().and_then(|b| a.partial_cmp(&b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (Null, Null) => Some(Ordering::Equal),
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Number(_) | Value::Float(_) => DataType::Number,
            Value::String(_) => DataType::String,
            Value::Bytes(_) => DataType::Binary,
            Value::List(_) => DataType::List,
            Value::Map(_) => DataType::Map,
            Value::StringSet(_) => DataType::StringSet,
            Value::NumberSet(_) => DataType::NumberSet,
            Value::BytesSet(_) => DataType::BinarySet,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(v) => write!(f, "\"{v}\""),
            other => write!(f, "{}", other.as_text()),
        }
    }
}

/// Parses a numeric-looking string. Surrounding whitespace is ignored, as are
/// the textual infinities and NaN that `f64::from_str` would otherwise accept.
pub fn parse_f64(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Renders a float the way an operator expects to read it back: integral
/// values keep a trailing `.0`.
pub fn format_float(v: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    buffer.format(v).to_string()
}

/// Converts a float into an exact decimal for the wire, if it is finite.
pub fn float_to_decimal(v: f64) -> Option<BigDecimal> {
    if !v.is_finite() {
        return None;
    }
    BigDecimal::from_str(&format_float(v))
        .ok()
        .or_else(|| BigDecimal::from_f64(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_are_numeric() {
        assert!(Value::string("10").is_numeric());
        assert!(Value::string(" 1.5e3 ").is_numeric());
        assert!(!Value::string("abc").is_numeric());
        assert!(!Value::string("inf").is_numeric());
        assert!(!Value::string("").is_numeric());
        assert!(Value::int(3).is_numeric());
    }

    #[test]
    fn floats_render_with_fraction() {
        assert_eq!(Value::Float(15.0).as_text(), "15.0");
        assert_eq!(Value::Float(0.25).as_text(), "0.25");
        assert_eq!(Value::int(10).as_text(), "10");
    }

    #[test]
    fn json_round_trip_keeps_structure() {
        let json = serde_json::json!({"a": [1, "x", null], "b": {"c": true}});
        let value = Value::from_json(&json);
        assert!(matches!(value, Value::Map(_)));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn float_to_decimal_rejects_non_finite() {
        assert!(float_to_decimal(f64::INFINITY).is_none());
        assert!(float_to_decimal(f64::NAN).is_none());
        assert_eq!(float_to_decimal(15.0).unwrap().to_string(), "15.0");
    }
}
