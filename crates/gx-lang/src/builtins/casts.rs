//! Cast builtins.
//!
//! String-to-numeric casts use standard parsing and fail on malformed input;
//! everything else is the obvious cross-kind rule.

use super::{float_arg, str_arg};
use crate::error::RuntimeError;
use crate::value::Value;

pub(super) fn passthrough(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(args[0].clone())
}

pub(super) fn str_to_bool(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = str_arg(args, 0);
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Value::Bool(true)),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Value::Bool(false)),
        _ => Err(RuntimeError::ParseFailure {
            kind: "bool",
            text: text.to_string(),
        }),
    }
}

/// Truncation toward zero.
pub(super) fn float_to_int(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(float_arg(args, 0) as i64))
}

pub(super) fn str_to_int(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = str_arg(args, 0);
    text.parse::<i64>()
        .map(Value::Int)
        .map_err(|_| RuntimeError::ParseFailure {
            kind: "int",
            text: text.to_string(),
        })
}

pub(super) fn int_to_float(args: &[Value]) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Int(v) => Ok(Value::Float(*v as f64)),
        other => panic!("BUG: overload dispatched with {} argument", other.kind()),
    }
}

pub(super) fn str_to_float(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = str_arg(args, 0);
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| RuntimeError::ParseFailure {
            kind: "float",
            text: text.to_string(),
        })
}

pub(super) fn to_str(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = match &args[0] {
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Str(v) => v.clone(),
        other => panic!("BUG: overload dispatched with {} argument", other.kind()),
    };
    Ok(Value::Str(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_cast_accepts_common_spellings() {
        for text in ["1", "t", "TRUE", "True", "true"] {
            let v = str_to_bool(&[Value::Str(text.into())]).unwrap();
            assert!(matches!(v, Value::Bool(true)), "{text}");
        }
        assert!(matches!(
            str_to_bool(&[Value::Str("0".into())]).unwrap(),
            Value::Bool(false)
        ));
        assert!(str_to_bool(&[Value::Str("yes".into())]).is_err());
    }

    #[test]
    fn numeric_casts() {
        assert!(matches!(float_to_int(&[Value::Float(3.9)]).unwrap(), Value::Int(3)));
        assert!(matches!(float_to_int(&[Value::Float(-3.9)]).unwrap(), Value::Int(-3)));
        assert!(matches!(int_to_float(&[Value::Int(4)]).unwrap(), Value::Float(f) if f == 4.0));
    }

    #[test]
    fn malformed_numeric_strings_fail() {
        let err = str_to_int(&[Value::Str("12a".into())]).unwrap_err();
        assert!(matches!(err, RuntimeError::ParseFailure { kind: "int", .. }));
        let err = str_to_float(&[Value::Str("".into())]).unwrap_err();
        assert!(matches!(err, RuntimeError::ParseFailure { kind: "float", .. }));
        assert!(matches!(
            str_to_float(&[Value::Str("2.5".into())]).unwrap(),
            Value::Float(f) if f == 2.5
        ));
    }

    #[test]
    fn str_cast_spellings() {
        assert!(matches!(to_str(&[Value::Bool(true)]).unwrap(), Value::Str(s) if s == "true"));
        assert!(matches!(to_str(&[Value::Int(-5)]).unwrap(), Value::Str(s) if s == "-5"));
        assert!(matches!(to_str(&[Value::Float(2.5)]).unwrap(), Value::Str(s) if s == "2.5"));
    }
}
