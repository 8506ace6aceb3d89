//! Stack-based virtual machine.
//!
//! A [`Vm`] executes one shared, immutable [`Program`] against one record at
//! a time. All mutable state (program counter, evaluation stack, register
//! file) is private to the VM and reset at the start of every run, so a VM
//! is safe to reuse after a faulting record.

use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::builtins;
use crate::debug;
use crate::error::RuntimeError;
use crate::ops::{Op, UNPATCHED};
use crate::program::Program;
use crate::value::{FeatureCell, Kind, RawValue, Value};

/// Destination for values emitted by a running program.
///
/// `EMIT` hands the sink the raw JSON payload of the popped value; by
/// convention the host writes each payload as one JSON line. A send may
/// block, which is how output backpressure reaches the VM.
pub trait EmitSink {
    fn emit(&mut self, value: Json) -> Result<(), RuntimeError>;
}

/// Collecting sink, mostly for tests.
impl EmitSink for Vec<Json> {
    fn emit(&mut self, value: Json) -> Result<(), RuntimeError> {
        self.push(value);
        Ok(())
    }
}

pub struct Vm {
    pub(crate) program: Arc<Program>,
    pub(crate) registers: Vec<Option<Value>>,
    pub(crate) stack: Vec<Value>,
    pub(crate) pc: usize,
    dump_on_crash: bool,
}

impl Vm {
    pub fn new(program: Arc<Program>) -> Self {
        let registers = vec![None; program.register_count];
        Self {
            program,
            registers,
            stack: Vec::new(),
            pc: 0,
            dump_on_crash: false,
        }
    }

    /// Print the full VM state to stderr whenever a run fails.
    pub fn set_dump_on_crash(&mut self, dump: bool) {
        self.dump_on_crash = dump;
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Execute the program against one input record.
    ///
    /// The record is lent for the duration of the run; mutations through
    /// `@path = …` write into the caller's record. Emitted payloads go to
    /// `out` in program order.
    pub fn run(&mut self, input: &FeatureCell, out: &mut dyn EmitSink) -> Result<(), RuntimeError> {
        self.reset();
        let result = self.execute(input, out);
        if result.is_err() && self.dump_on_crash {
            debug::dump_state(self);
        }
        result
    }

    fn reset(&mut self) {
        self.pc = 0;
        self.stack.clear();
        self.registers.clear();
        self.registers.resize(self.program.register_count, None);
    }

    fn execute(&mut self, input: &FeatureCell, out: &mut dyn EmitSink) -> Result<(), RuntimeError> {
        let program = Arc::clone(&self.program);
        while self.pc < program.code.len() {
            let mut next = self.pc + 1;
            match program.code[self.pc] {
                Op::Const(index) => {
                    let constant = program
                        .constants
                        .get(index)
                        .ok_or(RuntimeError::InvalidConstant { index })?;
                    self.stack.push(constant.to_value());
                }
                Op::Load(register) => {
                    let value = self
                        .registers
                        .get(register)
                        .ok_or(RuntimeError::InvalidRegister { register })?
                        .clone()
                        .ok_or(RuntimeError::UninitializedRegister { register })?;
                    self.stack.push(value);
                }
                Op::Store(register) => {
                    let value = self.pop()?;
                    let slot = self
                        .registers
                        .get_mut(register)
                        .ok_or(RuntimeError::InvalidRegister { register })?;
                    *slot = Some(value);
                }
                Op::LoadGlobal => {
                    self.stack
                        .push(Value::Raw(RawValue::Feature(Rc::clone(input))));
                }
                Op::Deref => {
                    let key = self.pop_str()?;
                    let ctx = self.pop()?;
                    self.stack.push(deref(&ctx, &key)?);
                }
                Op::Mut => {
                    let value = self.pop()?;
                    let key = self.pop_str()?;
                    let ctx = self.pop()?;
                    mutate(&ctx, &key, value)?;
                }
                Op::Call { builtin, argc } => {
                    let argc = argc as usize;
                    if self.stack.len() < argc {
                        return Err(RuntimeError::StackUnderflow);
                    }
                    let args = self.stack.split_off(self.stack.len() - argc);
                    self.stack.push(builtins::dispatch(builtin, &args)?);
                }
                Op::Emit => {
                    let value = self.pop()?;
                    out.emit(value.to_json())?;
                }
                Op::Add => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(left.add(&right)?);
                }
                Op::Sub => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(left.sub(&right)?);
                }
                Op::Mul => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(left.mul(&right)?);
                }
                Op::Div => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(left.div(&right)?);
                }
                Op::Eq => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(Value::Bool(left.equals(&right)));
                }
                Op::Neq => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(Value::Bool(!left.equals(&right)));
                }
                Op::Lt => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(Value::Bool(left.lt(&right)?));
                }
                Op::Lte => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(Value::Bool(left.lte(&right)?));
                }
                Op::Gt => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(Value::Bool(left.gt(&right)?));
                }
                Op::Gte => {
                    let (left, right) = self.pop_pair()?;
                    self.stack.push(Value::Bool(left.gte(&right)?));
                }
                Op::Jump(target) => {
                    next = self.jump_target(target)?;
                }
                Op::JumpIfTrue(target) => {
                    if self.pop_bool()? {
                        next = self.jump_target(target)?;
                    }
                }
                Op::JumpIfFalse(target) => {
                    if !self.pop_bool()? {
                        next = self.jump_target(target)?;
                    }
                }
            }
            self.pc = next;
        }
        Ok(())
    }

    fn jump_target(&self, target: usize) -> Result<usize, RuntimeError> {
        if target == UNPATCHED {
            return Err(RuntimeError::UnpatchedJump);
        }
        Ok(target)
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn pop_pair(&mut self) -> Result<(Value, Value), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;
        Ok((left, right))
    }

    fn pop_str(&mut self) -> Result<String, RuntimeError> {
        match self.pop()? {
            Value::Str(s) => Ok(s),
            other => Err(RuntimeError::TypeMismatch {
                expected: "str",
                found: other.kind(),
            }),
        }
    }

    fn pop_bool(&mut self) -> Result<bool, RuntimeError> {
        match self.pop()? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::TypeMismatch {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }
}

/// `DEREF`: look a string key up in a raw container.
///
/// Feature fields are `id`, `type`, `properties`, `geometry`; property maps
/// answer any key, with the empty string for keys that are absent.
fn deref(ctx: &Value, key: &str) -> Result<Value, RuntimeError> {
    let raw = match ctx {
        Value::Raw(raw) => raw,
        other => {
            return Err(RuntimeError::BadDereference {
                kind: other.kind(),
            })
        }
    };
    match raw {
        RawValue::Feature(feature) => {
            let record = feature.borrow();
            match key {
                "id" => Ok(Value::Raw(RawValue::Json(Rc::new(record.id.clone())))),
                "type" => Ok(Value::Str(record.kind.clone())),
                "properties" => Ok(Value::Raw(RawValue::Properties(Rc::clone(feature)))),
                "geometry" => Ok(Value::Raw(RawValue::Json(Rc::new(record.geometry.clone())))),
                _ => Err(RuntimeError::UnknownField {
                    key: key.to_string(),
                }),
            }
        }
        RawValue::Properties(feature) => Ok(Value::Str(
            feature
                .borrow()
                .properties
                .get(key)
                .cloned()
                .unwrap_or_default(),
        )),
        RawValue::Map(map) => Ok(Value::Str(
            map.borrow().get(key).cloned().unwrap_or_default(),
        )),
        RawValue::Json(_) => Err(RuntimeError::BadDereference { kind: Kind::Raw }),
    }
}

/// `MUT`: write a value through a raw container.
///
/// On a feature only `id` and `type` are writable; property maps accept any
/// key, stringifying scalar values.
fn mutate(ctx: &Value, key: &str, value: Value) -> Result<(), RuntimeError> {
    let raw = match ctx {
        Value::Raw(raw) => raw,
        other => {
            return Err(RuntimeError::BadDereference {
                kind: other.kind(),
            })
        }
    };
    match raw {
        RawValue::Feature(feature) => match key {
            "id" => {
                feature.borrow_mut().id = value.to_json();
                Ok(())
            }
            "type" => match value {
                Value::Str(kind) => {
                    feature.borrow_mut().kind = kind;
                    Ok(())
                }
                other => Err(RuntimeError::TypeMismatch {
                    expected: "str",
                    found: other.kind(),
                }),
            },
            "properties" | "geometry" => Err(RuntimeError::NotWritable {
                key: key.to_string(),
            }),
            _ => Err(RuntimeError::UnknownField {
                key: key.to_string(),
            }),
        },
        RawValue::Properties(feature) => {
            let text = property_string(value)?;
            feature.borrow_mut().properties.insert(key.to_string(), text);
            Ok(())
        }
        RawValue::Map(map) => {
            let text = property_string(value)?;
            map.borrow_mut().insert(key.to_string(), text);
            Ok(())
        }
        RawValue::Json(_) => Err(RuntimeError::BadDereference { kind: Kind::Raw }),
    }
}

/// Property maps are string→string; scalars stringify with the `str` cast
/// rules.
fn property_string(value: Value) -> Result<String, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s),
        Value::Int(v) => Ok(v.to_string()),
        Value::Float(v) => Ok(v.to_string()),
        Value::Bool(v) => Ok(v.to_string()),
        Value::Raw(_) => Err(RuntimeError::TypeMismatch {
            expected: "str",
            found: Kind::Raw,
        }),
    }
}
