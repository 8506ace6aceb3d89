//! Property-map builtins.

use std::cell::RefCell;
use std::rc::Rc;

use gx_model::PropertyMap;

use super::{raw_arg, str_arg};
use crate::error::RuntimeError;
use crate::value::{RawValue, Value};

/// `newProps()` — a fresh, empty property map.
pub(super) fn new_props(_args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Raw(RawValue::Map(Rc::new(RefCell::new(
        PropertyMap::new(),
    )))))
}

/// `delete(props, key)` — remove a key, returning the previous value or the
/// empty string when the key was absent.
pub(super) fn delete(args: &[Value]) -> Result<Value, RuntimeError> {
    let key = str_arg(args, 1);
    let removed = match raw_arg(args, 0) {
        RawValue::Properties(feature) => feature.borrow_mut().properties.shift_remove(key),
        RawValue::Map(map) => map.borrow_mut().shift_remove(key),
        other => {
            return Err(RuntimeError::InvalidArgument {
                message: format!("delete expects a property map, got {other}"),
            })
        }
    };
    Ok(Value::Str(removed.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_returns_previous_value() {
        let map = match new_props(&[]).unwrap() {
            Value::Raw(raw) => raw,
            other => panic!("unexpected {other:?}"),
        };
        if let RawValue::Map(cell) = &map {
            cell.borrow_mut().insert("k".into(), "v".into());
        }
        let args = [Value::Raw(map.clone()), Value::Str("k".into())];
        assert!(matches!(delete(&args).unwrap(), Value::Str(s) if s == "v"));
        // Second delete: key is gone, empty string comes back.
        assert!(matches!(delete(&args).unwrap(), Value::Str(s) if s.is_empty()));
    }

    #[test]
    fn delete_rejects_non_map_raw() {
        use serde_json::json;
        let raw = Value::Raw(RawValue::Json(Rc::new(json!({"a": 1}))));
        let err = delete(&[raw, Value::Str("a".into())]).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidArgument { .. }));
    }
}
