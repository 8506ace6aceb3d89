//! GX: a small expression language over geospatial feature records.
//!
//! A script is compiled once to stack bytecode and executed once per input
//! record by a virtual machine:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use gx_lang::{compile, Vm};
//! use gx_model::Feature;
//!
//! let program = Arc::new(compile("emit upper(@properties.name)").unwrap());
//!
//! let mut feature = Feature::new("Feature");
//! feature.properties.insert("name".into(), "park".into());
//! let record = Rc::new(RefCell::new(feature));
//!
//! let mut out = Vec::new();
//! Vm::new(program).run(&record, &mut out).unwrap();
//! assert_eq!(out, vec![serde_json::json!("PARK")]);
//! ```
//!
//! A [`Program`] is immutable after [`compile`] and may be shared across any
//! number of worker VMs; each [`Vm`] owns its program counter, stack, and
//! register file exclusively.

pub mod builtins;
mod compile;
mod debug;
mod error;
mod ops;
mod parse;
mod program;
mod value;
mod vm;

pub use compile::compile;
pub use error::{CompileError, ParseError, RuntimeError, ScriptError};
pub use ops::{BuiltinId, Op, RegId};
pub use program::{Constant, Program};
pub use value::{FeatureCell, Kind, MapCell, RawValue, Value};
pub use vm::{EmitSink, Vm};
