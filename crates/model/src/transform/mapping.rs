use crate::{core::value::Value, error::ModelError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Label under which a passthrough spec is stored.
pub const PASSTHROUGH_KEY: &str = "*";

/// How a single target attribute (or, for passthrough, the whole record) is
/// produced from a source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingSpec {
    /// Copy every source attribute except the excluded ones.
    Passthrough {
        #[serde(default)]
        exclude: BTreeSet<String>,
    },
    /// Text with `{field [transformation]}` placeholders.
    Template { text: String },
    /// A constant written as-is.
    Literal { value: Value },
}

impl MappingSpec {
    pub fn template(text: impl Into<String>) -> Self {
        MappingSpec::Template { text: text.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        MappingSpec::Literal {
            value: value.into(),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, MappingSpec::Passthrough { .. })
    }
}

/// Target attribute name to mapping spec. At most one passthrough spec may be
/// present; when it is, it governs the whole job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMappings {
    specs: BTreeMap<String, MappingSpec>,
}

impl ColumnMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn passthrough<I, S>(exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut mappings = Self::new();
        mappings.specs.insert(
            PASSTHROUGH_KEY.to_string(),
            MappingSpec::Passthrough {
                exclude: exclude.into_iter().map(Into::into).collect(),
            },
        );
        mappings
    }

    /// Adds or replaces the spec for `target`.
    pub fn insert(&mut self, target: impl Into<String>, spec: MappingSpec) -> Option<MappingSpec> {
        self.specs.insert(target.into(), spec)
    }

    pub fn with(mut self, target: impl Into<String>, spec: MappingSpec) -> Self {
        self.insert(target, spec);
        self
    }

    pub fn remove(&mut self, target: &str) -> Option<MappingSpec> {
        self.specs.remove(target)
    }

    pub fn get(&self, target: &str) -> Option<&MappingSpec> {
        self.specs.get(target)
    }

    /// Exclude set of the governing passthrough spec, if any.
    pub fn passthrough_exclude(&self) -> Option<&BTreeSet<String>> {
        self.specs.values().find_map(|spec| match spec {
            MappingSpec::Passthrough { exclude } => Some(exclude),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MappingSpec)> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.specs.is_empty() {
            return Err(ModelError::InvalidMapping(
                "at least one column mapping is required".to_string(),
            ));
        }

        let passthroughs = self.specs.values().filter(|s| s.is_passthrough()).count();
        if passthroughs > 1 {
            return Err(ModelError::InvalidMapping(format!(
                "only one passthrough mapping is allowed, found {passthroughs}"
            )));
        }

        if let Some((target, _)) = self.specs.iter().find(|(k, _)| k.trim().is_empty()) {
            return Err(ModelError::InvalidMapping(format!(
                "target attribute name cannot be empty (got '{target}')"
            )));
        }

        Ok(())
    }

    /// Parses an operator-supplied `target=template` pair.
    pub fn parse_assignment(raw: &str) -> Result<(String, MappingSpec), ModelError> {
        let (target, template) = raw.split_once('=').ok_or_else(|| {
            ModelError::InvalidMapping(format!(
                "invalid mapping '{raw}': expected 'target_column=template'"
            ))
        })?;
        let (target, template) = (target.trim(), template.trim());
        if target.is_empty() || template.is_empty() {
            return Err(ModelError::InvalidMapping(format!(
                "invalid mapping '{raw}': target column and template are required"
            )));
        }
        Ok((target.to_string(), MappingSpec::template(template)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_governs_lookup() {
        let mappings = ColumnMappings::passthrough(["ssn"]);
        let exclude = mappings.passthrough_exclude().unwrap();
        assert!(exclude.contains("ssn"));
        assert!(mappings.validate().is_ok());
    }

    #[test]
    fn rejects_two_passthrough_specs() {
        let mappings = ColumnMappings::passthrough(["a"]).with(
            "other",
            MappingSpec::Passthrough {
                exclude: BTreeSet::new(),
            },
        );
        assert!(matches!(
            mappings.validate(),
            Err(ModelError::InvalidMapping(_))
        ));
    }

    #[test]
    fn rejects_empty_mappings() {
        assert!(ColumnMappings::new().validate().is_err());
    }

    #[test]
    fn parses_assignment() {
        let (target, spec) = ColumnMappings::parse_assignment("full = {first} {last}").unwrap();
        assert_eq!(target, "full");
        assert_eq!(spec, MappingSpec::template("{first} {last}"));

        assert!(ColumnMappings::parse_assignment("no-equals").is_err());
        assert!(ColumnMappings::parse_assignment("=x").is_err());
    }

    #[test]
    fn persisted_form_is_tagged() {
        let mappings = ColumnMappings::new()
            .with("name", MappingSpec::template("{name upper}"))
            .with("source", MappingSpec::literal("legacy"));
        let json = serde_json::to_value(&mappings).unwrap();
        assert_eq!(json["name"]["kind"], "template");
        assert_eq!(json["source"]["kind"], "literal");
        let back: ColumnMappings = serde_json::from_value(json).unwrap();
        assert_eq!(back, mappings);
    }
}
