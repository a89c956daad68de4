//! Attribute transformation mini-language.
//!
//! An expression is an operation name followed by whitespace-separated
//! arguments (`upper`, `add 5`, `substring 0 4`). String operations are tried
//! first; numeric operations apply when the value is a number or a
//! numeric-looking string.

pub mod error;
pub mod expression;
pub mod functions;

pub use error::{Result, TransformationError};
pub use expression::Expression;
pub use functions::FunctionRegistry;

use lazy_static::lazy_static;
use model::core::value::Value;

lazy_static! {
    static ref DEFAULT_REGISTRY: FunctionRegistry = FunctionRegistry::new();
}

/// Applies `expression` to `value` using the built-in operations.
pub fn apply(value: &Value, expression: &str) -> Result<Value> {
    DEFAULT_REGISTRY.apply(value, expression)
}

/// The registry holding the built-in operations.
pub fn registry() -> &'static FunctionRegistry {
    &DEFAULT_REGISTRY
}
