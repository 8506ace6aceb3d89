//! Math builtins.

use super::{float_arg, int_arg};
use crate::error::RuntimeError;
use crate::value::Value;

pub(super) fn abs_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(float_arg(args, 0).abs()))
}

pub(super) fn abs_int(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(int_arg(args, 0).wrapping_abs()))
}

pub(super) fn sqrt_int(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float((int_arg(args, 0) as f64).sqrt()))
}

pub(super) fn sqrt_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(float_arg(args, 0).sqrt()))
}

pub(super) fn round_int(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(int_arg(args, 0)))
}

/// Half-away-from-zero rounding to an integer.
pub(super) fn round_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(float_arg(args, 0).round() as i64))
}

pub(super) fn round_places(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = float_arg(args, 0);
    let places = int_arg(args, 1);
    if places < 0 {
        return Err(RuntimeError::InvalidArgument {
            message: format!("invalid number of decimal places: {places}"),
        });
    }
    let scale = 10f64.powi(places as i32);
    Ok(Value::Float((value * scale).round() / scale))
}

pub(super) fn ceil_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(float_arg(args, 0).ceil() as i64))
}

pub(super) fn floor_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(float_arg(args, 0).floor() as i64))
}

pub(super) fn int_passthrough(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(int_arg(args, 0)))
}
