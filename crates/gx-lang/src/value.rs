//! Runtime value model.
//!
//! A [`Value`] is a closed tagged union: `Int`, `Float`, `Bool`, `Str`, or
//! `Raw` (a handle to host-side record data). Arithmetic and comparison are
//! exhaustive matches over the kind pairs, so a missing case is a build
//! failure rather than a silent fallthrough.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::{json, Value as Json};

use gx_model::{Feature, PropertyMap};

use crate::error::RuntimeError;

/// Kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int,
    Float,
    Bool,
    Str,
    Raw,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Bool => "bool",
            Kind::Str => "str",
            Kind::Raw => "raw",
        })
    }
}

/// Shared handle to the record a run is working on.
///
/// The VM and every `Raw` value derived from the record alias the same cell,
/// so mutations through `@path = …` are visible to the caller after the run.
pub type FeatureCell = Rc<RefCell<Feature>>;

/// Shared handle to a standalone property map (from `newProps()`).
pub type MapCell = Rc<RefCell<PropertyMap>>;

/// Host-side payloads reachable from scripts.
///
/// Scripts can only traverse these through `DEREF`/`MUT` with a string key,
/// or pass them to builtin functions. Equality between raw values is handle
/// identity, never structural.
#[derive(Debug, Clone)]
pub enum RawValue {
    /// The whole input record.
    Feature(FeatureCell),
    /// Live view of a feature's property map.
    Properties(FeatureCell),
    /// A standalone property map.
    Map(MapCell),
    /// Opaque JSON payload (ids, geometry).
    Json(Rc<Json>),
}

impl RawValue {
    /// Handle identity.
    pub fn same(&self, other: &RawValue) -> bool {
        match (self, other) {
            (RawValue::Feature(a), RawValue::Feature(b)) => Rc::ptr_eq(a, b),
            (RawValue::Properties(a), RawValue::Properties(b)) => Rc::ptr_eq(a, b),
            (RawValue::Map(a), RawValue::Map(b)) => Rc::ptr_eq(a, b),
            (RawValue::Json(a), RawValue::Json(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Serialize the referenced host data as a JSON payload.
    pub fn to_json(&self) -> Json {
        match self {
            RawValue::Feature(feature) => {
                let feature = feature.borrow();
                json!({
                    "id": feature.id,
                    "type": feature.kind,
                    "properties": feature.properties,
                    "geometry": feature.geometry,
                })
            }
            RawValue::Properties(feature) => {
                serde_json::to_value(&feature.borrow().properties).unwrap_or(Json::Null)
            }
            RawValue::Map(map) => serde_json::to_value(&*map.borrow()).unwrap_or(Json::Null),
            RawValue::Json(value) => (**value).clone(),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Feature(_) => f.write_str("<feature>"),
            RawValue::Properties(_) => f.write_str("<properties>"),
            RawValue::Map(_) => f.write_str("<map>"),
            RawValue::Json(value) => write!(f, "{value}"),
        }
    }
}

/// A single runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Raw(RawValue),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Bool(_) => Kind::Bool,
            Value::Str(_) => Kind::Str,
            Value::Raw(_) => Kind::Raw,
        }
    }

    fn invalid(&self, op: &'static str, rhs: &Value) -> RuntimeError {
        RuntimeError::InvalidOperation {
            op,
            left: self.kind(),
            right: rhs.kind(),
        }
    }

    pub fn add(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_add(*r))),
            (Value::Int(l), Value::Float(r)) => Ok(Value::Float(*l as f64 + r)),
            (Value::Float(l), Value::Int(r)) => Ok(Value::Float(l + *r as f64)),
            (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l + r)),
            _ => Err(self.invalid("+", rhs)),
        }
    }

    pub fn sub(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_sub(*r))),
            (Value::Int(l), Value::Float(r)) => Ok(Value::Float(*l as f64 - r)),
            (Value::Float(l), Value::Int(r)) => Ok(Value::Float(l - *r as f64)),
            (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l - r)),
            _ => Err(self.invalid("-", rhs)),
        }
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_mul(*r))),
            (Value::Int(l), Value::Float(r)) => Ok(Value::Float(*l as f64 * r)),
            (Value::Float(l), Value::Int(r)) => Ok(Value::Float(l * *r as f64)),
            (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l * r)),
            _ => Err(self.invalid("*", rhs)),
        }
    }

    /// Division. Integer division by zero is an error; float division by
    /// zero follows IEEE-754 (infinity or NaN).
    pub fn div(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivisionByZero),
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_div(*r))),
            (Value::Int(l), Value::Float(r)) => Ok(Value::Float(*l as f64 / r)),
            (Value::Float(l), Value::Int(r)) => Ok(Value::Float(l / *r as f64)),
            (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l / r)),
            _ => Err(self.invalid("/", rhs)),
        }
    }

    /// Equality. Numeric kinds compare with promotion, `Bool`/`Str` compare
    /// within their kind, `Raw` compares by handle identity, and values of
    /// unrelated kinds are simply unequal.
    pub fn equals(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Int(l), Value::Float(r)) => *l as f64 == *r,
            (Value::Float(l), Value::Int(r)) => *l == *r as f64,
            (Value::Float(l), Value::Float(r)) => l == r,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Str(l), Value::Str(r)) => l == r,
            (Value::Raw(l), Value::Raw(r)) => l.same(r),
            _ => false,
        }
    }

    pub fn lt(&self, rhs: &Value) -> Result<bool, RuntimeError> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(l < r),
            (Value::Int(l), Value::Float(r)) => Ok((*l as f64) < *r),
            (Value::Float(l), Value::Int(r)) => Ok(*l < *r as f64),
            (Value::Float(l), Value::Float(r)) => Ok(l < r),
            (Value::Str(l), Value::Str(r)) => Ok(l < r),
            _ => Err(self.invalid("<", rhs)),
        }
    }

    pub fn lte(&self, rhs: &Value) -> Result<bool, RuntimeError> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(l <= r),
            (Value::Int(l), Value::Float(r)) => Ok(*l as f64 <= *r),
            (Value::Float(l), Value::Int(r)) => Ok(*l <= *r as f64),
            (Value::Float(l), Value::Float(r)) => Ok(l <= r),
            (Value::Str(l), Value::Str(r)) => Ok(l <= r),
            _ => Err(self.invalid("<=", rhs)),
        }
    }

    pub fn gt(&self, rhs: &Value) -> Result<bool, RuntimeError> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(l > r),
            (Value::Int(l), Value::Float(r)) => Ok(*l as f64 > *r),
            (Value::Float(l), Value::Int(r)) => Ok(*l > *r as f64),
            (Value::Float(l), Value::Float(r)) => Ok(l > r),
            (Value::Str(l), Value::Str(r)) => Ok(l > r),
            _ => Err(self.invalid(">", rhs)),
        }
    }

    pub fn gte(&self, rhs: &Value) -> Result<bool, RuntimeError> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(l >= r),
            (Value::Int(l), Value::Float(r)) => Ok(*l as f64 >= *r),
            (Value::Float(l), Value::Int(r)) => Ok(*l >= *r as f64),
            (Value::Float(l), Value::Float(r)) => Ok(l >= r),
            (Value::Str(l), Value::Str(r)) => Ok(l >= r),
            _ => Err(self.invalid(">=", rhs)),
        }
    }

    /// The raw JSON payload of this value, as handed to the emit sink.
    ///
    /// Non-finite floats have no JSON representation and map to `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Int(v) => Json::from(*v),
            Value::Float(v) => Json::from(*v),
            Value::Bool(v) => Json::from(*v),
            Value::Str(v) => Json::from(v.clone()),
            Value::Raw(raw) => raw.to_json(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{{int {v}}}"),
            Value::Float(v) => write!(f, "{{float {v}}}"),
            Value::Bool(v) => write!(f, "{{bool {v}}}"),
            Value::Str(v) => write!(f, "{{str {v}}}"),
            Value::Raw(raw) => write!(f, "{{raw {raw}}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_stays_int() {
        let v = Value::Int(2).mul(&Value::Int(3)).unwrap();
        assert!(matches!(v, Value::Int(6)));
    }

    #[test]
    fn float_mix_promotes() {
        let v = Value::Int(2).mul(&Value::Float(3.5)).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 7.0));
        let v = Value::Float(7.0).add(&Value::Int(1)).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 8.0));
    }

    #[test]
    fn non_numeric_arithmetic_fails() {
        let err = Value::Str("a".into()).add(&Value::Str("b".into())).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidOperation { op: "+", .. }));
        let err = Value::Bool(true).sub(&Value::Int(1)).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidOperation { op: "-", .. }));
    }

    #[test]
    fn int_division_by_zero_fails() {
        let err = Value::Int(1).div(&Value::Int(0)).unwrap_err();
        assert_eq!(err, RuntimeError::DivisionByZero);
    }

    #[test]
    fn float_division_by_zero_is_infinite() {
        let v = Value::Float(1.0).div(&Value::Float(0.0)).unwrap();
        assert!(matches!(v, Value::Float(f) if f.is_infinite()));
        let v = Value::Int(1).div(&Value::Float(0.0)).unwrap();
        assert!(matches!(v, Value::Float(f) if f.is_infinite()));
    }

    #[test]
    fn equality_across_kinds_is_false() {
        assert!(!Value::Int(1).equals(&Value::Str("1".into())));
        assert!(!Value::Bool(true).equals(&Value::Int(1)));
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
    }

    #[test]
    fn ordering_across_kinds_fails() {
        let err = Value::Int(1).lt(&Value::Bool(true)).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidOperation { op: "<", .. }));
    }

    #[test]
    fn string_ordering_is_lexicographic() {
        assert!(Value::Str("apple".into()).lt(&Value::Str("pear".into())).unwrap());
        assert!(Value::Str("b".into()).gte(&Value::Str("b".into())).unwrap());
    }

    #[test]
    fn raw_equality_is_identity() {
        let feature = Rc::new(RefCell::new(Feature::new("Feature")));
        let a = RawValue::Feature(Rc::clone(&feature));
        let b = RawValue::Feature(Rc::clone(&feature));
        assert!(a.same(&b));

        let other = Rc::new(RefCell::new(Feature::new("Feature")));
        assert!(!a.same(&RawValue::Feature(other)));
        assert!(!a.same(&RawValue::Properties(feature)));
    }
}
