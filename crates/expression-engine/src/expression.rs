/// A parsed transformation: operation name plus whitespace-separated
/// arguments, e.g. `replace old new` or `round 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub operation: String,
    pub args: Vec<String>,
}

impl Expression {
    /// Returns `None` for an empty or whitespace-only expression.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let operation = parts.next()?.to_lowercase();
        Some(Self {
            operation,
            args: parts.map(str::to_string).collect(),
        })
    }

    pub fn args(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_operation_and_arguments() {
        let expr = Expression::parse("  Replace  old new ").unwrap();
        assert_eq!(expr.operation, "replace");
        assert_eq!(expr.args, vec!["old", "new"]);
    }

    #[test]
    fn empty_expression_is_none() {
        assert!(Expression::parse("").is_none());
        assert!(Expression::parse("   ").is_none());
    }
}
