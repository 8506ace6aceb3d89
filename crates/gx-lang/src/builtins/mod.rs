//! Builtin function registry and dispatch.
//!
//! A builtin is a name plus an ordered list of overloads. Dispatch walks the
//! overloads in declaration order and runs the first one whose parameter
//! kinds match the argument kinds exactly; when none matches, the failure
//! message carries the signature that was attempted.

use crate::error::RuntimeError;
use crate::value::{Kind, Value};

mod casts;
mod geo;
mod math;
mod props;
mod strings;
mod units;

/// Native implementation for one parameter-kind signature.
pub struct Overload {
    pub params: &'static [Kind],
    pub call: fn(&[Value]) -> Result<Value, RuntimeError>,
}

/// A named builtin with its overload set.
pub struct Builtin {
    pub name: &'static str,
    pub overloads: &'static [Overload],
}

macro_rules! overload {
    ([$($kind:ident),*] => $call:path) => {
        Overload {
            params: &[$(Kind::$kind),*],
            call: $call,
        }
    };
}

/// The builtin table. A `CALL` instruction's builtin id is an index into
/// this slice.
pub static BUILTINS: &[Builtin] = &[
    // Strings
    Builtin {
        name: "lower",
        overloads: &[overload!([Str] => strings::lower)],
    },
    Builtin {
        name: "upper",
        overloads: &[overload!([Str] => strings::upper)],
    },
    Builtin {
        name: "strip",
        overloads: &[overload!([Str] => strings::strip)],
    },
    Builtin {
        name: "substr",
        overloads: &[
            overload!([Str, Int] => strings::substr_from),
            overload!([Str, Int, Int] => strings::substr_range),
        ],
    },
    Builtin {
        name: "replace",
        overloads: &[
            overload!([Str, Str, Str] => strings::replace_all),
            overload!([Str, Str, Str, Int] => strings::replace_n),
        ],
    },
    // Math
    Builtin {
        name: "abs",
        overloads: &[
            overload!([Float] => math::abs_float),
            overload!([Int] => math::abs_int),
        ],
    },
    Builtin {
        name: "round",
        overloads: &[
            overload!([Int] => math::round_int),
            overload!([Float] => math::round_float),
            overload!([Float, Int] => math::round_places),
        ],
    },
    Builtin {
        name: "sqrt",
        overloads: &[
            overload!([Int] => math::sqrt_int),
            overload!([Float] => math::sqrt_float),
        ],
    },
    Builtin {
        name: "ceil",
        overloads: &[
            overload!([Float] => math::ceil_float),
            overload!([Int] => math::int_passthrough),
        ],
    },
    Builtin {
        name: "floor",
        overloads: &[
            overload!([Float] => math::floor_float),
            overload!([Int] => math::int_passthrough),
        ],
    },
    // Unit conversion
    Builtin {
        name: "m2ft",
        overloads: &[
            overload!([Float] => units::m2ft_float),
            overload!([Int] => units::m2ft_int),
        ],
    },
    Builtin {
        name: "ft2m",
        overloads: &[
            overload!([Float] => units::ft2m_float),
            overload!([Int] => units::ft2m_int),
        ],
    },
    Builtin {
        name: "sqm2sqft",
        overloads: &[
            overload!([Float] => units::sqm2sqft_float),
            overload!([Int] => units::sqm2sqft_int),
        ],
    },
    Builtin {
        name: "sqft2sqm",
        overloads: &[
            overload!([Float] => units::sqft2sqm_float),
            overload!([Int] => units::sqft2sqm_int),
        ],
    },
    // Casts
    Builtin {
        name: "bool",
        overloads: &[
            overload!([Bool] => casts::passthrough),
            overload!([Str] => casts::str_to_bool),
        ],
    },
    Builtin {
        name: "int",
        overloads: &[
            overload!([Int] => casts::passthrough),
            overload!([Float] => casts::float_to_int),
            overload!([Str] => casts::str_to_int),
        ],
    },
    Builtin {
        name: "float",
        overloads: &[
            overload!([Int] => casts::int_to_float),
            overload!([Float] => casts::passthrough),
            overload!([Str] => casts::str_to_float),
        ],
    },
    Builtin {
        name: "str",
        overloads: &[
            overload!([Bool] => casts::to_str),
            overload!([Int] => casts::to_str),
            overload!([Float] => casts::to_str),
            overload!([Str] => casts::passthrough),
        ],
    },
    // Property management
    Builtin {
        name: "newProps",
        overloads: &[overload!([] => props::new_props)],
    },
    Builtin {
        name: "delete",
        overloads: &[overload!([Raw, Str] => props::delete)],
    },
    // Geometry
    Builtin {
        name: "area",
        overloads: &[overload!([Raw] => geo::area)],
    },
    Builtin {
        name: "perimeter",
        overloads: &[overload!([Raw] => geo::perimeter)],
    },
    Builtin {
        name: "bbox",
        overloads: &[overload!([Raw] => geo::bbox)],
    },
    Builtin {
        name: "centroid",
        overloads: &[overload!([Raw] => geo::centroid)],
    },
];

/// Resolve a builtin name to its table index.
pub fn lookup(name: &str) -> Option<usize> {
    BUILTINS.iter().position(|builtin| builtin.name == name)
}

/// Dispatch a call by table index.
pub fn dispatch(builtin: usize, args: &[Value]) -> Result<Value, RuntimeError> {
    let Some(builtin) = BUILTINS.get(builtin) else {
        return Err(RuntimeError::InvalidBuiltin { index: builtin });
    };
    for overload in builtin.overloads {
        if signature_matches(overload.params, args) {
            return (overload.call)(args);
        }
    }
    Err(RuntimeError::NoMatchingCall {
        signature: display_signature(builtin.name, args),
    })
}

fn signature_matches(params: &[Kind], args: &[Value]) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args)
            .all(|(param, arg)| *param == arg.kind())
}

fn display_signature(name: &str, args: &[Value]) -> String {
    let kinds: Vec<String> = args.iter().map(|arg| arg.kind().to_string()).collect();
    format!("{}({})", name, kinds.join(","))
}

// Argument extractors for overload bodies. Dispatch has already matched the
// signature, so a mismatch here is a table defect, not a data error.

fn str_arg(args: &[Value], index: usize) -> &str {
    match &args[index] {
        Value::Str(s) => s,
        other => panic!("BUG: overload dispatched with {} argument", other.kind()),
    }
}

fn int_arg(args: &[Value], index: usize) -> i64 {
    match &args[index] {
        Value::Int(v) => *v,
        other => panic!("BUG: overload dispatched with {} argument", other.kind()),
    }
}

fn float_arg(args: &[Value], index: usize) -> f64 {
    match &args[index] {
        Value::Float(v) => *v,
        other => panic!("BUG: overload dispatched with {} argument", other.kind()),
    }
}

fn raw_arg<'a>(args: &'a [Value], index: usize) -> &'a crate::value::RawValue {
    match &args[index] {
        Value::Raw(raw) => raw,
        other => panic!("BUG: overload dispatched with {} argument", other.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_resolves_known_names() {
        assert!(lookup("lower").is_some());
        assert!(lookup("sqft2sqm").is_some());
        assert!(lookup("newProps").is_some());
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn table_has_no_duplicate_names() {
        for (i, a) in BUILTINS.iter().enumerate() {
            for b in &BUILTINS[i + 1..] {
                assert_ne!(a.name, b.name, "duplicate builtin {}", a.name);
            }
        }
    }

    #[test]
    fn dispatch_picks_first_matching_overload() {
        let id = lookup("abs").unwrap();
        let result = dispatch(id, &[Value::Int(-3)]).unwrap();
        assert!(matches!(result, Value::Int(3)));
        let result = dispatch(id, &[Value::Float(-3.5)]).unwrap();
        assert!(matches!(result, Value::Float(v) if v == 3.5));
    }

    #[test]
    fn dispatch_reports_the_attempted_signature() {
        let id = lookup("lower").unwrap();
        let err = dispatch(id, &[Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::NoMatchingCall {
                signature: "lower(int)".into()
            }
        );
    }

    #[test]
    fn dispatch_rejects_wrong_arity() {
        let id = lookup("lower").unwrap();
        let err = dispatch(id, &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::NoMatchingCall { .. }));
    }
}
