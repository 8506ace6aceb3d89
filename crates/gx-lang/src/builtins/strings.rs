//! String builtins.

use super::{int_arg, str_arg};
use crate::error::RuntimeError;
use crate::value::Value;

pub(super) fn lower(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Str(str_arg(args, 0).to_lowercase()))
}

pub(super) fn upper(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Str(str_arg(args, 0).to_uppercase()))
}

pub(super) fn strip(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Str(str_arg(args, 0).trim().to_string()))
}

pub(super) fn substr_from(args: &[Value]) -> Result<Value, RuntimeError> {
    char_range(str_arg(args, 0), int_arg(args, 1), None)
}

pub(super) fn substr_range(args: &[Value]) -> Result<Value, RuntimeError> {
    char_range(str_arg(args, 0), int_arg(args, 1), Some(int_arg(args, 2)))
}

/// Character-indexed substring; out-of-range bounds are an error rather
/// than a truncation.
fn char_range(s: &str, start: i64, end: Option<i64>) -> Result<Value, RuntimeError> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let end = end.unwrap_or(len);
    if start < 0 || end < start || end > len {
        return Err(RuntimeError::InvalidArgument {
            message: format!("substring bounds [{start}, {end}) out of range for length {len}"),
        });
    }
    Ok(Value::Str(
        chars[start as usize..end as usize].iter().collect(),
    ))
}

pub(super) fn replace_all(args: &[Value]) -> Result<Value, RuntimeError> {
    let (s, from, to) = (str_arg(args, 0), str_arg(args, 1), str_arg(args, 2));
    Ok(Value::Str(s.replace(from, to)))
}

/// Replace at most `n` occurrences; a negative `n` replaces all.
pub(super) fn replace_n(args: &[Value]) -> Result<Value, RuntimeError> {
    let (s, from, to) = (str_arg(args, 0), str_arg(args, 1), str_arg(args, 2));
    let n = int_arg(args, 3);
    if n < 0 {
        return Ok(Value::Str(s.replace(from, to)));
    }
    Ok(Value::Str(s.replacen(from, to, n as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::Str(text.into())
    }

    #[test]
    fn case_builtins() {
        assert!(matches!(lower(&[s("MiXeD")]).unwrap(), Value::Str(v) if v == "mixed"));
        assert!(matches!(upper(&[s("MiXeD")]).unwrap(), Value::Str(v) if v == "MIXED"));
        assert!(matches!(strip(&[s("  a b \t")]).unwrap(), Value::Str(v) if v == "a b"));
    }

    #[test]
    fn substr_is_character_indexed() {
        let result = substr_range(&[s("héllo"), Value::Int(1), Value::Int(3)]).unwrap();
        assert!(matches!(result, Value::Str(v) if v == "él"));
        let result = substr_from(&[s("héllo"), Value::Int(2)]).unwrap();
        assert!(matches!(result, Value::Str(v) if v == "llo"));
    }

    #[test]
    fn substr_out_of_range_fails() {
        assert!(substr_from(&[s("abc"), Value::Int(4)]).is_err());
        assert!(substr_range(&[s("abc"), Value::Int(2), Value::Int(1)]).is_err());
        assert!(substr_from(&[s("abc"), Value::Int(-1)]).is_err());
    }

    #[test]
    fn replace_counts() {
        let args = [s("aaa"), s("a"), s("b"), Value::Int(2)];
        assert!(matches!(replace_n(&args).unwrap(), Value::Str(v) if v == "bba"));
        let args = [s("aaa"), s("a"), s("b"), Value::Int(-1)];
        assert!(matches!(replace_n(&args).unwrap(), Value::Str(v) if v == "bbb"));
        let args = [s("aaa"), s("a"), s("b")];
        assert!(matches!(replace_all(&args).unwrap(), Value::Str(v) if v == "bbb"));
    }
}
