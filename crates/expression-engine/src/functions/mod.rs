pub mod numeric;
pub mod string;

use crate::{
    error::{Result, TransformationError},
    expression::Expression,
};
use model::core::value::Value;
use std::collections::HashMap;
use tracing::trace;

/// String-domain operation. Receives the raw value so list-aware operations
/// (`join`) can inspect it; everything else stringifies first.
pub type StringFn = fn(&Value, &[&str]) -> Result<Value>;

/// Numeric-domain operation over the value coerced to a float.
pub type NumericFn = fn(f64, &[&str]) -> Result<f64>;

/// Registry of all available transformations, keyed by lower-cased name.
pub struct FunctionRegistry {
    string_ops: HashMap<String, StringFn>,
    numeric_ops: HashMap<String, NumericFn>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in operations
    pub fn new() -> Self {
        let mut registry = Self {
            string_ops: HashMap::new(),
            numeric_ops: HashMap::new(),
        };

        registry.register_string("upper", string::upper);
        registry.register_string("lower", string::lower);
        registry.register_string("title", string::title);
        registry.register_string("title_case", string::title);
        registry.register_string("trim", string::trim);
        registry.register_string("strip", string::trim);
        registry.register_string("replace", string::replace);
        registry.register_string("split", string::split);
        registry.register_string("join", string::join);
        registry.register_string("substring", string::substring);
        registry.register_string("pad_left", string::pad_left);
        registry.register_string("pad_right", string::pad_right);

        registry.register_numeric("add", numeric::add);
        registry.register_numeric("subtract", numeric::subtract);
        registry.register_numeric("multiply", numeric::multiply);
        registry.register_numeric("divide", numeric::divide);
        registry.register_numeric("round", numeric::round);
        registry.register_numeric("round_to", numeric::round);
        registry.register_numeric("abs", numeric::abs);
        registry.register_numeric("abs_value", numeric::abs);
        registry.register_numeric("power", numeric::power);
        registry.register_numeric("sqrt", numeric::sqrt);
        registry.register_numeric("floor", numeric::floor);
        registry.register_numeric("ceil", numeric::ceil);
        registry.register_numeric("mod", numeric::modulo);

        registry
    }

    pub fn register_string(&mut self, name: &str, func: StringFn) {
        self.string_ops.insert(name.to_lowercase(), func);
    }

    pub fn register_numeric(&mut self, name: &str, func: NumericFn) {
        self.numeric_ops.insert(name.to_lowercase(), func);
    }

    pub fn has_function(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.string_ops.contains_key(&name) || self.numeric_ops.contains_key(&name)
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .string_ops
            .keys()
            .chain(self.numeric_ops.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// Applies a raw expression such as `add 5` to `value`.
    ///
    /// An empty expression returns the value unchanged. Any failure is
    /// wrapped with the expression and value that caused it.
    pub fn apply(&self, value: &Value, expression: &str) -> Result<Value> {
        let Some(expr) = Expression::parse(expression) else {
            return Ok(value.clone());
        };

        self.call(value, &expr)
            .map_err(|e| TransformationError::Application {
                expression: expression.trim().to_string(),
                value: value.as_text(),
                source: Box::new(e),
            })
    }

    /// Dispatches a parsed expression: string domain first, then numeric.
    pub fn call(&self, value: &Value, expr: &Expression) -> Result<Value> {
        let args = expr.args();
        trace!(operation = %expr.operation, "Applying transformation");

        if let Some(func) = self.string_ops.get(&expr.operation) {
            return func(value, &args);
        }

        // Numeric operations only apply to numbers and numeric-looking
        // strings; on anything else the operation is unknown.
        let (Some(func), Some(input)) = (self.numeric_ops.get(&expr.operation), value.as_f64())
        else {
            return Err(TransformationError::UnknownTransformation(
                expr.operation.clone(),
            ));
        };

        let result = func(input, &args)?;
        if !result.is_finite() {
            return Err(TransformationError::NonFiniteResult(expr.operation.clone()));
        }
        Ok(Value::Float(result))
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// First argument or a `MissingArgument` error.
pub(crate) fn required<'a>(operation: &str, args: &[&'a str]) -> Result<&'a str> {
    args.first()
        .copied()
        .ok_or_else(|| TransformationError::MissingArgument(operation.to_string()))
}

pub(crate) fn parse_arg<T: std::str::FromStr>(
    operation: &str,
    argument: &str,
    expected: &str,
) -> Result<T> {
    argument
        .parse::<T>()
        .map_err(|_| TransformationError::InvalidArgument {
            operation: operation.to_string(),
            argument: argument.to_string(),
            expected: expected.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_builtin_functions() {
        let registry = FunctionRegistry::new();
        for name in ["upper", "title_case", "strip", "pad_left", "add", "round_to", "mod"] {
            assert!(registry.has_function(name), "missing {name}");
        }
    }

    #[test]
    fn test_registry_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.has_function("UPPER"));
        let result = registry.apply(&Value::string("abc"), "Upper").unwrap();
        assert_eq!(result, Value::string("ABC"));
    }

    #[test]
    fn test_empty_expression_is_identity() {
        let registry = FunctionRegistry::new();
        let value = Value::int(7);
        assert_eq!(registry.apply(&value, "  ").unwrap(), value);
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.apply(&Value::string("abc"), "frobnicate").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            TransformationError::UnknownTransformation(op) if op == "frobnicate"
        ));
        assert!(err.to_string().contains("Unknown transformation: frobnicate"));
    }

    #[test]
    fn test_numeric_op_on_numeric_string() {
        let registry = FunctionRegistry::new();
        let result = registry.apply(&Value::string("10"), "add 5").unwrap();
        assert_eq!(result, Value::Float(15.0));
    }

    #[test]
    fn test_numeric_op_on_text_is_unknown() {
        let registry = FunctionRegistry::new();
        let err = registry.apply(&Value::string("abc"), "add 5").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            TransformationError::UnknownTransformation(op) if op == "add"
        ));
        assert!(err.to_string().contains("Unknown transformation: add"));
    }

    #[test]
    fn test_divide_by_zero_message() {
        let registry = FunctionRegistry::new();
        let err = registry.apply(&Value::int(4), "divide 0").unwrap_err();
        assert!(matches!(err.root_cause(), TransformationError::DivideByZero));
        assert!(err.to_string().contains("Cannot divide by zero"));
    }

    #[test]
    fn test_overflow_is_rejected() {
        let registry = FunctionRegistry::new();
        let err = registry.apply(&Value::Float(1e300), "power 10").unwrap_err();
        assert!(matches!(err.root_cause(), TransformationError::NonFiniteResult(_)));
    }

    #[test]
    fn test_custom_function_registration() {
        fn reverse(value: &Value, _args: &[&str]) -> Result<Value> {
            Ok(Value::String(value.as_text().chars().rev().collect()))
        }

        let mut registry = FunctionRegistry::new();
        registry.register_string("reverse", reverse);
        let result = registry.apply(&Value::string("abc"), "reverse").unwrap();
        assert_eq!(result, Value::string("cba"));
    }
}
