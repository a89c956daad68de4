use super::{
    error::MappingError,
    template::{Placeholder, Segment, Template},
};
use expression_engine::FunctionRegistry;
use model::{
    core::value::Value,
    job::MigrationJob,
    records::record::Record,
    transform::mapping::{ColumnMappings, MappingSpec},
};
use std::{collections::BTreeSet, fmt};
use tracing::warn;

/// A transformation that failed and was replaced by the field's raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingWarning {
    pub target: String,
    pub field: String,
    pub expression: String,
    pub message: String,
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <- {{{} {}}}: {}",
            self.target, self.field, self.expression, self.message
        )
    }
}

/// Result of mapping one source record.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRecord {
    pub record: Record,
    pub warnings: Vec<MappingWarning>,
}

#[derive(Debug, Clone)]
enum CompiledSpec {
    Template(Template),
    Literal(Value),
}

#[derive(Debug, Clone)]
enum Mode {
    Passthrough { exclude: BTreeSet<String> },
    Attributes(Vec<(String, CompiledSpec)>),
}

/// Builds target records from source records according to a job's column
/// mappings. Templates are parsed once, up front.
#[derive(Clone)]
pub struct AttributeMapper {
    mode: Mode,
    registry: &'static FunctionRegistry,
}

impl AttributeMapper {
    pub fn new(mappings: &ColumnMappings) -> Result<Self, MappingError> {
        mappings.validate()?;

        let mode = match mappings.passthrough_exclude() {
            Some(exclude) => Mode::Passthrough {
                exclude: exclude.clone(),
            },
            None => Mode::Attributes(
                mappings
                    .iter()
                    .filter_map(|(target, spec)| match spec {
                        MappingSpec::Template { text } => Some(
                            Template::parse(text)
                                .map(|t| (target.clone(), CompiledSpec::Template(t))),
                        ),
                        MappingSpec::Literal { value } => {
                            Some(Ok((target.clone(), CompiledSpec::Literal(value.clone()))))
                        }
                        MappingSpec::Passthrough { .. } => None,
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        Ok(Self {
            mode,
            registry: expression_engine::registry(),
        })
    }

    pub fn for_job(job: &MigrationJob) -> Result<Self, MappingError> {
        Self::new(&job.column_mappings)
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self.mode, Mode::Passthrough { .. })
    }

    pub fn map(&self, source: &Record) -> MappedRecord {
        match &self.mode {
            Mode::Passthrough { exclude } => MappedRecord {
                record: source
                    .iter()
                    .filter(|(name, _)| !exclude.contains(*name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
                warnings: vec![],
            },
            Mode::Attributes(specs) => {
                let mut record = Record::new();
                let mut warnings = Vec::new();
                for (target, spec) in specs {
                    let value = match spec {
                        CompiledSpec::Literal(value) => value.clone(),
                        CompiledSpec::Template(template) => {
                            self.evaluate(target, template, source, &mut warnings)
                        }
                    };
                    record.insert(target.clone(), value);
                }
                MappedRecord { record, warnings }
            }
        }
    }

    fn evaluate(
        &self,
        target: &str,
        template: &Template,
        source: &Record,
        warnings: &mut Vec<MappingWarning>,
    ) -> Value {
        if let Some(placeholder) = template.single_placeholder() {
            return self
                .resolve(target, placeholder, source, warnings)
                .unwrap_or(Value::Null);
        }

        let mut out = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(placeholder) => {
                    match self.resolve(target, placeholder, source, warnings) {
                        Some(value) => out.push_str(&render(&value)),
                        None => out.push_str("null"),
                    }
                }
            }
        }
        Value::String(out)
    }

    /// Looks up the placeholder's field and applies its transformation.
    /// A failed transformation falls back to the raw value and records a
    /// warning. Returns `None` for a missing field.
    fn resolve(
        &self,
        target: &str,
        placeholder: &Placeholder,
        source: &Record,
        warnings: &mut Vec<MappingWarning>,
    ) -> Option<Value> {
        let raw = source.get(&placeholder.field)?;
        let Some(expression) = &placeholder.expression else {
            return Some(raw.clone());
        };

        match self.registry.apply(raw, expression) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    target_attribute = target,
                    field = %placeholder.field,
                    expression = %expression,
                    error = %e,
                    "Transformation failed, using raw value"
                );
                warnings.push(MappingWarning {
                    target: target.to_string(),
                    field: placeholder.field.clone(),
                    expression: expression.clone(),
                    message: e.root_cause().to_string(),
                });
                Some(raw.clone())
            }
        }
    }
}

/// Maps `source` with `job`'s mappings.
pub fn map_record(source: &Record, job: &MigrationJob) -> Result<MappedRecord, MappingError> {
    Ok(AttributeMapper::for_job(job)?.map(source))
}

/// Text substituted for a placeholder during interpolation.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.replace('"', "\\\""),
        Value::List(_)
        | Value::Map(_)
        | Value::StringSet(_)
        | Value::NumberSet(_)
        | Value::BytesSet(_) => value.to_json().to_string(),
        other => other.as_text(),
    }
}
