use super::{parse_arg, required};
use crate::error::{Result, TransformationError};

fn operand(operation: &str, args: &[&str]) -> Result<f64> {
    let raw = required(operation, args)?;
    model::core::value::parse_f64(raw).ok_or_else(|| TransformationError::InvalidArgument {
        operation: operation.to_string(),
        argument: raw.to_string(),
        expected: "a number".to_string(),
    })
}

pub fn add(value: f64, args: &[&str]) -> Result<f64> {
    Ok(value + operand("add", args)?)
}

pub fn subtract(value: f64, args: &[&str]) -> Result<f64> {
    Ok(value - operand("subtract", args)?)
}

pub fn multiply(value: f64, args: &[&str]) -> Result<f64> {
    Ok(value * operand("multiply", args)?)
}

pub fn divide(value: f64, args: &[&str]) -> Result<f64> {
    let divisor = operand("divide", args)?;
    if divisor == 0.0 {
        return Err(TransformationError::DivideByZero);
    }
    Ok(value / divisor)
}

/// Rounds half to even, optionally at a number of decimal places.
pub fn round(value: f64, args: &[&str]) -> Result<f64> {
    let decimals: i32 = match args.first() {
        Some(raw) => parse_arg("round", raw, "an integer")?,
        None => 0,
    };
    if decimals == 0 {
        return Ok(value.round_ties_even());
    }
    let factor = 10f64.powi(decimals);
    Ok((value * factor).round_ties_even() / factor)
}

pub fn abs(value: f64, _args: &[&str]) -> Result<f64> {
    Ok(value.abs())
}

pub fn power(value: f64, args: &[&str]) -> Result<f64> {
    Ok(value.powf(operand("power", args)?))
}

pub fn sqrt(value: f64, _args: &[&str]) -> Result<f64> {
    if value < 0.0 {
        return Err(TransformationError::NegativeSqrt);
    }
    Ok(value.sqrt())
}

pub fn floor(value: f64, _args: &[&str]) -> Result<f64> {
    Ok(value.floor())
}

pub fn ceil(value: f64, _args: &[&str]) -> Result<f64> {
    Ok(value.ceil())
}

/// Remainder taking the sign of the divisor.
pub fn modulo(value: f64, args: &[&str]) -> Result<f64> {
    let divisor = operand("mod", args)?;
    if divisor == 0.0 {
        return Err(TransformationError::DivideByZero);
    }
    let rem = value % divisor;
    if rem != 0.0 && (rem < 0.0) != (divisor < 0.0) {
        Ok(rem + divisor)
    } else {
        Ok(rem)
    }
}
