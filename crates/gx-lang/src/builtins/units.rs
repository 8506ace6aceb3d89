//! Unit-conversion builtins.

use super::{float_arg, int_arg};
use crate::error::RuntimeError;
use crate::value::Value;

const FEET_PER_METER: f64 = 3.2808399;

pub(super) fn m2ft_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(float_arg(args, 0) * FEET_PER_METER))
}

pub(super) fn m2ft_int(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(int_arg(args, 0) as f64 * FEET_PER_METER))
}

pub(super) fn ft2m_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(float_arg(args, 0) / FEET_PER_METER))
}

pub(super) fn ft2m_int(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(int_arg(args, 0) as f64 / FEET_PER_METER))
}

pub(super) fn sqm2sqft_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(
        float_arg(args, 0) * FEET_PER_METER * FEET_PER_METER,
    ))
}

pub(super) fn sqm2sqft_int(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(
        int_arg(args, 0) as f64 * FEET_PER_METER * FEET_PER_METER,
    ))
}

pub(super) fn sqft2sqm_float(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(
        float_arg(args, 0) / (FEET_PER_METER * FEET_PER_METER),
    ))
}

pub(super) fn sqft2sqm_int(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(
        int_arg(args, 0) as f64 / (FEET_PER_METER * FEET_PER_METER),
    ))
}
