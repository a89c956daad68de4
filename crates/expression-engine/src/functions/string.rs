use super::parse_arg;
use crate::error::{Result, TransformationError};
use model::core::value::Value;

const DEFAULT_DELIMITER: &str = ",";
const DEFAULT_PAD_WIDTH: usize = 10;
const DEFAULT_PAD_FILL: char = '0';

pub fn upper(value: &Value, _args: &[&str]) -> Result<Value> {
    Ok(Value::String(value.as_text().to_uppercase()))
}

pub fn lower(value: &Value, _args: &[&str]) -> Result<Value> {
    Ok(Value::String(value.as_text().to_lowercase()))
}

/// Upper-cases the first letter of every run of letters and lower-cases the rest.
pub fn title(value: &Value, _args: &[&str]) -> Result<Value> {
    let mut out = String::new();
    let mut in_word = false;
    for c in value.as_text().chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    Ok(Value::String(out))
}

pub fn trim(value: &Value, _args: &[&str]) -> Result<Value> {
    Ok(Value::String(value.as_text().trim().to_string()))
}

pub fn replace(value: &Value, args: &[&str]) -> Result<Value> {
    let (Some(old), Some(new)) = (args.first(), args.get(1)) else {
        return Err(TransformationError::MissingArgument("replace".to_string()));
    };
    Ok(Value::String(value.as_text().replace(old, new)))
}

pub fn split(value: &Value, args: &[&str]) -> Result<Value> {
    let delimiter = args.first().copied().unwrap_or(DEFAULT_DELIMITER);
    let parts = value
        .as_text()
        .split(delimiter)
        .map(Value::string)
        .collect();
    Ok(Value::List(parts))
}

/// Joins list elements; a scalar joins its characters.
pub fn join(value: &Value, args: &[&str]) -> Result<Value> {
    let delimiter = args.first().copied().unwrap_or(DEFAULT_DELIMITER);
    let parts: Vec<String> = match value {
        Value::List(items) => items.iter().map(Value::as_text).collect(),
        Value::StringSet(items) => items.clone(),
        Value::NumberSet(items) => items.iter().map(|n| n.to_string()).collect(),
        other => other.as_text().chars().map(String::from).collect(),
    };
    Ok(Value::String(parts.join(delimiter)))
}

/// Character slice `[start, end)`; `start` defaults to 0. Negative indices
/// count from the end and out-of-range bounds are clamped.
pub fn substring(value: &Value, args: &[&str]) -> Result<Value> {
    let start: i64 = args
        .first()
        .map(|raw| parse_arg("substring", raw, "an integer"))
        .transpose()?
        .unwrap_or(0);
    let end: Option<i64> = args
        .get(1)
        .map(|raw| parse_arg("substring", raw, "an integer"))
        .transpose()?;

    let chars: Vec<char> = value.as_text().chars().collect();
    let len = chars.len() as i64;
    let clamp = |idx: i64| -> usize {
        let idx = if idx < 0 { idx + len } else { idx };
        idx.clamp(0, len) as usize
    };

    let from = clamp(start);
    let to = clamp(end.unwrap_or(len));
    if from >= to {
        return Ok(Value::String(String::new()));
    }
    Ok(Value::String(chars[from..to].iter().collect()))
}

/// Keeps the text on the left and fills to the right: `"42"` becomes
/// `"42000"` at width 5.
pub fn pad_left(value: &Value, args: &[&str]) -> Result<Value> {
    let (width, fill) = pad_args("pad_left", args)?;
    let text = value.as_text();
    let padding = pad(&text, width, fill);
    Ok(Value::String(text + &padding))
}

/// Keeps the text on the right and fills to the left: `"42"` becomes
/// `"00042"` at width 5.
pub fn pad_right(value: &Value, args: &[&str]) -> Result<Value> {
    let (width, fill) = pad_args("pad_right", args)?;
    let text = value.as_text();
    let padding = pad(&text, width, fill);
    Ok(Value::String(padding + &text))
}

fn pad(text: &str, width: usize, fill: char) -> String {
    let missing = width.saturating_sub(text.chars().count());
    std::iter::repeat_n(fill, missing).collect()
}

fn pad_args(operation: &str, args: &[&str]) -> Result<(usize, char)> {
    let width = match args.first() {
        Some(raw) => parse_arg(operation, raw, "a non-negative integer")?,
        None => DEFAULT_PAD_WIDTH,
    };
    let fill = match args.get(1) {
        Some(raw) => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(TransformationError::InvalidArgument {
                        operation: operation.to_string(),
                        argument: raw.to_string(),
                        expected: "a single fill character".to_string(),
                    });
                }
            }
        }
        None => DEFAULT_PAD_FILL,
    };
    Ok((width, fill))
}
