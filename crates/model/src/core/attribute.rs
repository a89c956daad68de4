use crate::{
    core::value::{Value, float_to_decimal},
    error::ModelError,
    records::record::Record,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};

/// Typed wire form of an attribute, tagged the way the store's API expects.
///
/// Serializes to the store's JSON shape, e.g. `{"S": "1"}` or `{"N": "10.5"}`.
/// Numbers travel as decimal strings so no precision is lost in transit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "B")]
    B(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS")]
    Bs(Vec<Vec<u8>>),
}

/// A store item in wire form.
pub type Item = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    pub fn s(v: impl Into<String>) -> Self {
        AttributeValue::S(v.into())
    }

    pub fn n(v: impl ToString) -> Self {
        AttributeValue::N(v.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Tag name as used on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null(_) => "NULL",
            AttributeValue::M(_) => "M",
            AttributeValue::L(_) => "L",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::Bs(_) => "BS",
        }
    }
}

/// Encodes a decoded value into its wire form.
pub fn encode_value(value: &Value) -> Result<AttributeValue, ModelError> {
    Ok(match value {
        Value::Null => AttributeValue::Null(true),
        Value::Boolean(v) => AttributeValue::Bool(*v),
        Value::Number(v) => AttributeValue::N(v.to_string()),
        Value::Float(v) => {
            let decimal = float_to_decimal(*v).ok_or(ModelError::NonFiniteNumber(*v))?;
            AttributeValue::N(decimal.to_string())
        }
        Value::String(v) => AttributeValue::S(v.clone()),
        Value::Bytes(v) => AttributeValue::B(v.clone()),
        Value::List(items) => AttributeValue::L(
            items
                .iter()
                .map(encode_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Map(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), encode_value(v)?)))
                .collect::<Result<BTreeMap<_, _>, ModelError>>()?,
        ),
        Value::StringSet(items) => AttributeValue::Ss(items.clone()),
        Value::NumberSet(items) => AttributeValue::Ns(items.iter().map(|n| n.to_string()).collect()),
        Value::BytesSet(items) => AttributeValue::Bs(items.clone()),
    })
}

/// Decodes a wire attribute. Malformed numbers are rejected.
pub fn decode_value(attr: &AttributeValue) -> Result<Value, ModelError> {
    Ok(match attr {
        AttributeValue::S(v) => Value::String(v.clone()),
        AttributeValue::N(v) => Value::Number(parse_decimal(v)?),
        AttributeValue::B(v) => Value::Bytes(v.clone()),
        AttributeValue::Bool(v) => Value::Boolean(*v),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::M(map) => Value::Map(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
                .collect::<Result<BTreeMap<_, _>, ModelError>>()?,
        ),
        AttributeValue::L(items) => Value::List(
            items
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::Ss(items) => Value::StringSet(items.clone()),
        AttributeValue::Ns(items) => Value::NumberSet(
            items
                .iter()
                .map(|n| parse_decimal(n))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::Bs(items) => Value::BytesSet(items.clone()),
    })
}

pub fn encode_record(record: &Record) -> Result<Item, ModelError> {
    record
        .iter()
        .map(|(name, value)| {
            encode_value(value)
                .map(|attr| (name.clone(), attr))
                .map_err(|e| ModelError::Attribute {
                    attribute: name.clone(),
                    source: Box::new(e),
                })
        })
        .collect()
}

pub fn decode_item(item: &Item) -> Result<Record, ModelError> {
    let mut record = Record::new();
    for (name, attr) in item {
        let value = decode_value(attr).map_err(|e| ModelError::Attribute {
            attribute: name.clone(),
            source: Box::new(e),
        })?;
        record.insert(name.clone(), value);
    }
    Ok(record)
}

fn parse_decimal(raw: &str) -> Result<BigDecimal, ModelError> {
    BigDecimal::from_str(raw.trim()).map_err(|_| ModelError::InvalidNumber(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars_with_explicit_tags() {
        assert_eq!(encode_value(&Value::Null).unwrap(), AttributeValue::Null(true));
        assert_eq!(
            encode_value(&Value::Boolean(true)).unwrap(),
            AttributeValue::Bool(true)
        );
        assert_eq!(
            encode_value(&Value::string("a")).unwrap(),
            AttributeValue::s("a")
        );
        assert_eq!(
            encode_value(&Value::Float(15.0)).unwrap(),
            AttributeValue::N("15.0".into())
        );
    }

    #[test]
    fn numbers_keep_their_precision() {
        let attr = AttributeValue::N("12345678901234567890.000000001".into());
        let value = decode_value(&attr).unwrap();
        assert_eq!(encode_value(&value).unwrap(), attr);
    }

    #[test]
    fn nested_structures_are_tagged_recursively() {
        let json = serde_json::json!({"tags": ["a", 1], "flag": false});
        let attr = encode_value(&Value::from_json(&json)).unwrap();
        let expected: AttributeValue = serde_json::from_value(serde_json::json!({
            "M": {
                "flag": {"BOOL": false},
                "tags": {"L": [{"S": "a"}, {"N": "1"}]}
            }
        }))
        .unwrap();
        assert_eq!(attr, expected);
    }

    #[test]
    fn rejects_non_finite_and_malformed_numbers() {
        assert!(matches!(
            encode_value(&Value::Float(f64::INFINITY)),
            Err(ModelError::NonFiniteNumber(_))
        ));
        assert!(matches!(
            decode_value(&AttributeValue::N("ten".into())),
            Err(ModelError::InvalidNumber(_))
        ));
    }

    #[test]
    fn wire_json_shape_matches_store_format() {
        let mut key = Item::new();
        key.insert("id".into(), AttributeValue::s("1"));
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json, serde_json::json!({"id": {"S": "1"}}));
    }
}
