use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Kind of a decoded [`Value`](crate::core::value::Value).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    Null,
    Boolean,
    Number,
    String,
    Binary,
    List,
    Map,
    StringSet,
    NumberSet,
    BinarySet,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "null",
            DataType::Boolean => "boolean",
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Binary => "binary",
            DataType::List => "list",
            DataType::Map => "map",
            DataType::StringSet => "string set",
            DataType::NumberSet => "number set",
            DataType::BinarySet => "binary set",
        };
        f.write_str(name)
    }
}

/// Types a table accepts for key attributes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScalarAttributeType {
    S,
    N,
    B,
}

impl ScalarAttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarAttributeType::S => "S",
            ScalarAttributeType::N => "N",
            ScalarAttributeType::B => "B",
        }
    }
}

impl FromStr for ScalarAttributeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "S" => Ok(ScalarAttributeType::S),
            "N" => Ok(ScalarAttributeType::N),
            "B" => Ok(ScalarAttributeType::B),
            other => Err(format!("Unknown scalar attribute type: {other}")),
        }
    }
}

impl fmt::Display for ScalarAttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
