//! Bytecode instruction set.
//!
//! Stack-based: operands are popped from the evaluation stack, results pushed
//! back. Jump targets are absolute instruction indices.

use std::fmt;

/// Register index into a VM's local-variable file.
pub type RegId = usize;

/// Index into the builtin registry table.
pub type BuiltinId = usize;

/// Sentinel target for forward jumps that have not been patched yet.
///
/// A successful compile never leaves one behind; executing it is a
/// corrupt-program runtime error.
pub const UNPATCHED: usize = usize::MAX;

/// A single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Push `constants[i]`.
    Const(usize),
    /// Push `registers[r]`.
    Load(RegId),
    /// Pop into `registers[r]`.
    Store(RegId),
    /// Push the current input record.
    LoadGlobal,
    /// Pop a string key, pop a raw container, push the child value.
    Deref,
    /// Pop a value, a string key, and a raw container; write through it.
    Mut,
    /// Pop `argc` arguments, dispatch to a builtin, push the result.
    Call { builtin: BuiltinId, argc: u8 },
    /// Pop a value and hand its raw JSON payload to the output sink.
    Emit,
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Jump to an absolute target.
    Jump(usize),
    /// Pop a bool; jump when true.
    JumpIfTrue(usize),
    /// Pop a bool; jump when false.
    JumpIfFalse(usize),
}

impl Op {
    /// Resolve the target of a forward jump emitted with [`UNPATCHED`].
    ///
    /// # Panics
    ///
    /// Panics when applied to a non-jump instruction; the patch stack only
    /// ever holds jump offsets, so this is a compiler bug.
    pub(crate) fn patch_target(&mut self, target: usize) {
        match self {
            Op::Jump(t) | Op::JumpIfTrue(t) | Op::JumpIfFalse(t) => *t = target,
            other => panic!("BUG: attempted to patch non-jump instruction {other:?}"),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn target(t: &usize) -> String {
            if *t == UNPATCHED {
                "?".to_string()
            } else {
                t.to_string()
            }
        }
        match self {
            Op::Const(i) => write!(f, "CONST {i}"),
            Op::Load(r) => write!(f, "LOAD {r}"),
            Op::Store(r) => write!(f, "STORE {r}"),
            Op::LoadGlobal => f.write_str("LOADG"),
            Op::Deref => f.write_str("DEREF"),
            Op::Mut => f.write_str("MUT"),
            Op::Call { builtin, argc } => write!(f, "CALL {builtin},{argc}"),
            Op::Emit => f.write_str("EMIT"),
            Op::Add => f.write_str("ADD"),
            Op::Sub => f.write_str("SUB"),
            Op::Mul => f.write_str("MUL"),
            Op::Div => f.write_str("DIV"),
            Op::Eq => f.write_str("EQ"),
            Op::Neq => f.write_str("NEQ"),
            Op::Lt => f.write_str("LT"),
            Op::Lte => f.write_str("LTE"),
            Op::Gt => f.write_str("GT"),
            Op::Gte => f.write_str("GTE"),
            Op::Jump(t) => write!(f, "JMP {}", target(t)),
            Op::JumpIfTrue(t) => write!(f, "JMPT {}", target(t)),
            Op::JumpIfFalse(t) => write!(f, "JMPF {}", target(t)),
        }
    }
}
