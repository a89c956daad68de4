//! Parser for `{field [transformation]}` templates.
//!
//! A `{` opens a placeholder running to the next `}`. When that span would
//! itself contain a `{`, the opening brace is plain text instead, which keeps
//! JSON-looking templates such as `{"id": {id}}` intact.

use super::error::MappingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub field: String,
    /// Transformation applied to the field's value, e.g. `add 5`.
    pub expression: Option<String>,
}

impl Placeholder {
    fn parse(content: &str) -> Self {
        let content = content.trim();
        match content.split_once(char::is_whitespace) {
            Some((field, expression)) => Placeholder {
                field: field.to_string(),
                expression: Some(expression.trim().to_string()),
            },
            None => Placeholder {
                field: content.to_string(),
                expression: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self, MappingError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;
        let mut offset = 0;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];
            let position = offset + open;

            let Some(close) = after_open.find('}') else {
                return Err(MappingError::UnterminatedPlaceholder {
                    template: text.to_string(),
                    position,
                });
            };

            let content = &after_open[..close];
            if content.contains('{') {
                literal.push('{');
                rest = after_open;
                offset = position + 1;
                continue;
            }

            if content.trim().is_empty() {
                return Err(MappingError::EmptyPlaceholder {
                    template: text.to_string(),
                    position,
                });
            }

            if !literal.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(Placeholder::parse(content)));

            rest = &after_open[close + 1..];
            offset = position + close + 2;
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }

        Ok(Self {
            source: text.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The placeholder when the template is exactly one placeholder and
    /// nothing else.
    pub fn single_placeholder(&self) -> Option<&Placeholder> {
        match self.segments.as_slice() {
            [Segment::Placeholder(p)] => Some(p),
            _ => None,
        }
    }
}
