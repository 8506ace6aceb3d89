//! Single-pass bytecode compiler.
//!
//! The compiler is driven purely by the parser's event stream; there is no
//! AST. Each event appends to the code vector or mutates one of the transient
//! stacks: the constant table (deduplicated), the jump patch-list, the open
//! call frames, and the local-register table.

use indexmap::IndexMap;

use crate::builtins;
use crate::error::{CompileError, ScriptError};
use crate::ops::{Op, UNPATCHED};
use crate::parse::{self, Action, Event};
use crate::program::{Constant, Program};

/// Compile a GX script to an executable [`Program`].
///
/// Deterministic: the same source always yields identical code vectors and
/// constant tables. On any failure no program is produced.
pub fn compile(source: &str) -> Result<Program, ScriptError> {
    let events = parse::parse(source)?;
    let program = Compiler::new(source).run(&events)?;
    Ok(program)
}

/// Pending `CALL` whose argc grows as arguments are parsed.
struct PendingCall {
    builtin: usize,
    argc: u8,
}

/// Unresolved short-circuit jumps of one `&&`/`||` chain.
struct Chain {
    kind: ChainKind,
    jumps: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainKind {
    And,
    Or,
}

struct Compiler<'src> {
    source: &'src str,
    constants: Vec<Constant>,
    code: Vec<Op>,
    jump_stack: Vec<usize>,
    chain_stack: Vec<Chain>,
    call_stack: Vec<PendingCall>,
    refs: IndexMap<String, usize>,
    /// Register of the identifier most recently seen on an assignment LHS.
    last_ref: usize,
}

impl<'src> Compiler<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            constants: Vec::new(),
            code: Vec::new(),
            jump_stack: Vec::new(),
            chain_stack: Vec::new(),
            call_stack: Vec::new(),
            refs: IndexMap::new(),
            last_ref: 0,
        }
    }

    fn run(mut self, events: &[Event]) -> Result<Program, CompileError> {
        for event in events {
            let text = &self.source[event.start..event.end];
            match event.action {
                Action::IntLiteral => {
                    let value: i64 = text
                        .parse()
                        .map_err(|_| CompileError::LiteralOutOfRange(text.to_string()))?;
                    self.emit_constant(Constant::Int(value));
                }
                Action::FloatLiteral => {
                    let value: f64 = text
                        .parse()
                        .map_err(|_| CompileError::LiteralOutOfRange(text.to_string()))?;
                    self.emit_constant(Constant::Float(value));
                }
                Action::BoolLiteral => self.emit_constant(Constant::Bool(text == "true")),
                Action::StrLiteral => self.emit_constant(Constant::Str(text.to_string())),
                Action::Load => self.emit_load(text)?,
                Action::AllocRef => self.allocate_ref(text),
                Action::Store => {
                    let register = self.last_ref;
                    self.emit(Op::Store(register));
                }
                Action::PrepareMutate => self.prepare_mutate(text)?,
                Action::Mutate => {
                    self.emit(Op::Mut);
                }
                Action::Emit => {
                    self.emit(Op::Emit);
                }
                Action::StartCall => self.start_call(text)?,
                Action::CallArg => self.add_call_arg(),
                Action::EmitCall => self.emit_call(),
                Action::OpenCondJump => self.emit_cond_jump(),
                Action::CloseJump => self.set_jump(),
                Action::BeginElse => self.begin_else(),
                Action::BeginAnd => self.begin_chain(ChainKind::And),
                Action::AndArm => self.chain_arm(ChainKind::And),
                Action::CloseAnd => self.close_chain(ChainKind::And),
                Action::BeginOr => self.begin_chain(ChainKind::Or),
                Action::OrArm => self.chain_arm(ChainKind::Or),
                Action::CloseOr => self.close_chain(ChainKind::Or),
                Action::Eq => {
                    self.emit(Op::Eq);
                }
                Action::Neq => {
                    self.emit(Op::Neq);
                }
                Action::Lt => {
                    self.emit(Op::Lt);
                }
                Action::Lte => {
                    self.emit(Op::Lte);
                }
                Action::Gt => {
                    self.emit(Op::Gt);
                }
                Action::Gte => {
                    self.emit(Op::Gte);
                }
                Action::Add => {
                    self.emit(Op::Add);
                }
                Action::Sub => {
                    self.emit(Op::Sub);
                }
                Action::Mul => {
                    self.emit(Op::Mul);
                }
                Action::Div => {
                    self.emit(Op::Div);
                }
            }
        }
        Ok(self.finish())
    }

    fn emit(&mut self, op: Op) -> usize {
        self.code.push(op);
        self.code.len() - 1
    }

    /// Emit a `CONST`, reusing an existing table entry when the payloads are
    /// equal.
    fn emit_constant(&mut self, constant: Constant) {
        if let Some(index) = self.constants.iter().position(|c| *c == constant) {
            self.emit(Op::Const(index));
            return;
        }
        self.emit(Op::Const(self.constants.len()));
        self.constants.push(constant);
    }

    /// Lower a reference read. `@path` becomes `LOADG` plus a `CONST`/`DEREF`
    /// pair per dotted segment; a bare identifier must already have a
    /// register.
    fn emit_load(&mut self, reference: &str) -> Result<(), CompileError> {
        if let Some(path) = reference.strip_prefix('@') {
            self.emit(Op::LoadGlobal);
            if !path.is_empty() {
                for segment in path.split('.') {
                    self.emit_constant(Constant::Str(segment.to_string()));
                    self.emit(Op::Deref);
                }
            }
            return Ok(());
        }
        let register = *self
            .refs
            .get(reference)
            .ok_or_else(|| CompileError::UndefinedReference(reference.to_string()))?;
        self.emit(Op::Load(register));
        Ok(())
    }

    /// Register a local name; existing names keep their slot.
    fn allocate_ref(&mut self, name: &str) {
        let next = self.refs.len();
        self.last_ref = *self.refs.entry(name.to_string()).or_insert(next);
    }

    /// Lower the target path of `@a.b.c = …`: descend to the parent of the
    /// last segment, then leave the last segment's key on the stack for
    /// `MUT`.
    fn prepare_mutate(&mut self, reference: &str) -> Result<(), CompileError> {
        let Some(path) = reference.strip_prefix('@') else {
            panic!("BUG: mutate target without leading '@': {reference}");
        };
        if path.is_empty() {
            return Err(CompileError::MutateRoot);
        }
        self.emit(Op::LoadGlobal);
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = segments.split_last().expect("BUG: empty mutate path");
        for segment in parents {
            self.emit_constant(Constant::Str(segment.to_string()));
            self.emit(Op::Deref);
        }
        self.emit_constant(Constant::Str(last.to_string()));
        Ok(())
    }

    fn start_call(&mut self, name: &str) -> Result<(), CompileError> {
        let builtin = builtins::lookup(name)
            .ok_or_else(|| CompileError::UnknownFunction(name.to_string()))?;
        self.call_stack.push(PendingCall { builtin, argc: 0 });
        Ok(())
    }

    fn add_call_arg(&mut self) {
        let call = self
            .call_stack
            .last_mut()
            .expect("BUG: call argument outside of a call frame");
        call.argc += 1;
    }

    fn emit_call(&mut self) {
        let call = self
            .call_stack
            .pop()
            .expect("BUG: closing a call with no open frame");
        self.emit(Op::Call {
            builtin: call.builtin,
            argc: call.argc,
        });
    }

    fn emit_cond_jump(&mut self) {
        let at = self.emit(Op::JumpIfFalse(UNPATCHED));
        self.jump_stack.push(at);
    }

    /// Pop the patch stack and point the jump at the current code position.
    fn set_jump(&mut self) {
        let at = self
            .jump_stack
            .pop()
            .expect("BUG: patching a jump with no open frame");
        let target = self.code.len();
        self.code[at].patch_target(target);
    }

    /// Entering `else`: the open `JMPF` is re-pointed past a fresh `JMP`
    /// that skips the else body; the `JMP` takes its place on the patch
    /// stack.
    fn begin_else(&mut self) {
        let cond = self
            .jump_stack
            .pop()
            .expect("BUG: else without an open conditional jump");
        let skip = self.emit(Op::Jump(UNPATCHED));
        self.jump_stack.push(skip);
        let target = self.code.len();
        self.code[cond].patch_target(target);
    }

    fn short_circuit_op(&mut self, kind: ChainKind) -> usize {
        match kind {
            ChainKind::And => self.emit(Op::JumpIfFalse(UNPATCHED)),
            ChainKind::Or => self.emit(Op::JumpIfTrue(UNPATCHED)),
        }
    }

    fn begin_chain(&mut self, kind: ChainKind) {
        let at = self.short_circuit_op(kind);
        self.chain_stack.push(Chain {
            kind,
            jumps: vec![at],
        });
    }

    fn chain_arm(&mut self, kind: ChainKind) {
        let at = self.short_circuit_op(kind);
        let chain = self
            .chain_stack
            .last_mut()
            .expect("BUG: chain arm without an open chain");
        debug_assert_eq!(chain.kind, kind);
        chain.jumps.push(at);
    }

    /// Close an `&&`/`||` chain: test the final operand, converge on a
    /// boolean constant. For `a && b`:
    ///
    /// ```text
    ///     [a]  JMPF fail  [b]  JMPF fail  CONST true  JMP end
    /// fail:  CONST false
    /// end:
    /// ```
    ///
    /// `||` is the dual with `JMPT` and the constants swapped.
    fn close_chain(&mut self, kind: ChainKind) {
        let at = self.short_circuit_op(kind);
        let mut chain = self
            .chain_stack
            .pop()
            .expect("BUG: closing a chain that was never opened");
        debug_assert_eq!(chain.kind, kind);
        chain.jumps.push(at);

        let all_passed = matches!(kind, ChainKind::And);
        self.emit_constant(Constant::Bool(all_passed));
        let skip = self.emit(Op::Jump(UNPATCHED));
        let fail_target = self.code.len();
        for jump in chain.jumps {
            self.code[jump].patch_target(fail_target);
        }
        self.emit_constant(Constant::Bool(!all_passed));
        let end = self.code.len();
        self.code[skip].patch_target(end);
    }

    /// # Panics
    ///
    /// Panics when a patch stack or call frame is still open; the grammar
    /// balances opens and closes, so this is a compiler bug.
    fn finish(self) -> Program {
        assert!(
            self.jump_stack.is_empty(),
            "BUG: {} unpatched jumps left after compilation",
            self.jump_stack.len()
        );
        assert!(
            self.chain_stack.is_empty(),
            "BUG: {} unclosed boolean chains left after compilation",
            self.chain_stack.len()
        );
        assert!(
            self.call_stack.is_empty(),
            "BUG: {} unterminated call frames left after compilation",
            self.call_stack.len()
        );
        Program {
            constants: self.constants,
            code: self.code,
            register_count: self.refs.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn must_compile(source: &str) -> Program {
        compile(source).expect("compile failed")
    }

    #[test]
    fn constants_are_deduplicated() {
        let program = must_compile("x = 1\ny = 1\nz = \"a\"\nw = \"a\"");
        assert_eq!(
            program.constants,
            vec![Constant::Int(1), Constant::Str("a".into())]
        );
    }

    #[test]
    fn distinct_payloads_are_distinct_constants() {
        // 1 and 1.0 have different kinds; both entries must survive.
        let program = must_compile("x = 1\ny = 1.0");
        assert_eq!(
            program.constants,
            vec![Constant::Int(1), Constant::Float(1.0)]
        );
    }

    #[test]
    fn register_count_matches_distinct_locals() {
        let program = must_compile("x = 1\ny = 2\nx = 3");
        assert_eq!(program.register_count, 2);
    }

    #[test]
    fn reassignment_reuses_the_first_register() {
        let program = must_compile("x = 1\ny = 2\nx = 3");
        let stores: Vec<&Op> = program
            .code
            .iter()
            .filter(|op| matches!(op, Op::Store(_)))
            .collect();
        assert_eq!(stores, vec![&Op::Store(0), &Op::Store(1), &Op::Store(0)]);
    }

    #[test]
    fn compile_is_deterministic() {
        let source = "x = 2\nif (@type == \"Feature\" && x > 1) { emit @ }";
        let first = must_compile(source);
        let second = must_compile(source);
        assert_eq!(first, second);
    }

    #[test]
    fn dotted_load_compiles_to_deref_chain() {
        let program = must_compile("emit @properties.name");
        assert_eq!(
            program.code,
            vec![
                Op::LoadGlobal,
                Op::Const(0),
                Op::Deref,
                Op::Const(1),
                Op::Deref,
                Op::Emit,
            ]
        );
        assert_eq!(
            program.constants,
            vec![
                Constant::Str("properties".into()),
                Constant::Str("name".into())
            ]
        );
    }

    #[test]
    fn bare_global_is_just_loadg() {
        let program = must_compile("emit @");
        assert_eq!(program.code, vec![Op::LoadGlobal, Op::Emit]);
        assert!(program.constants.is_empty());
    }

    #[test]
    fn mutate_leaves_last_segment_as_key() {
        let program = must_compile("@properties.name = \"x\"");
        assert_eq!(
            program.code,
            vec![
                Op::LoadGlobal,
                Op::Const(0), // "properties"
                Op::Deref,
                Op::Const(1), // "name"
                Op::Const(2), // "x"
                Op::Mut,
            ]
        );
    }

    #[test]
    fn mutating_the_root_is_rejected() {
        let err = compile("@ = 1").unwrap_err();
        assert_eq!(err, ScriptError::Compile(CompileError::MutateRoot));
    }

    #[test]
    fn undefined_reference_is_rejected() {
        let err = compile("emit x").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Compile(CompileError::UndefinedReference("x".into()))
        );
    }

    #[test]
    fn self_reference_in_first_assignment_compiles() {
        // `x` is allocated by the LHS before the RHS is lowered; reading the
        // register before any store is a runtime matter, not a compile error.
        assert!(compile("x = x").is_ok());
    }

    #[test]
    fn unknown_function_is_rejected() {
        let err = compile("emit frobnicate(1)").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Compile(CompileError::UnknownFunction("frobnicate".into()))
        );
    }

    #[test]
    fn call_counts_arguments() {
        let program = must_compile("emit substr(\"abcdef\", 1, 3)");
        let call = program
            .code
            .iter()
            .find(|op| matches!(op, Op::Call { .. }))
            .unwrap();
        assert!(matches!(call, Op::Call { argc: 3, .. }));
    }

    #[test]
    fn if_compiles_to_single_forward_jump() {
        let program = must_compile("if (true) { emit 1 }");
        // CONST true, JMPF end, CONST 1, EMIT
        assert_eq!(program.code.len(), 4);
        assert_eq!(program.code[1], Op::JumpIfFalse(4));
    }

    #[test]
    fn if_else_compiles_to_two_jumps() {
        let program = must_compile("if (true) { emit 1 } else { emit 2 }");
        // 0: CONST true  1: JMPF 5  2: CONST 1  3: EMIT  4: JMP 7
        // 5: CONST 2     6: EMIT    7: (end)
        assert_eq!(program.code[1], Op::JumpIfFalse(5));
        assert_eq!(program.code[4], Op::Jump(7));
        assert_eq!(program.code.len(), 7);
    }

    #[test]
    fn and_chain_converges_on_bool() {
        let program = must_compile("emit true && false");
        // 0: CONST true   1: JMPF 6  2: CONST false  3: JMPF 6
        // 4: CONST true   5: JMP 7   6: CONST false  7: EMIT
        assert_eq!(program.code[1], Op::JumpIfFalse(6));
        assert_eq!(program.code[3], Op::JumpIfFalse(6));
        assert_eq!(program.code[5], Op::Jump(7));
        // Both bool constants deduplicate into two table entries.
        assert_eq!(
            program.constants,
            vec![Constant::Bool(true), Constant::Bool(false)]
        );
    }

    #[test]
    fn or_chain_uses_jmpt() {
        let program = must_compile("emit false || true");
        assert!(program
            .code
            .iter()
            .any(|op| matches!(op, Op::JumpIfTrue(_))));
    }

    #[test]
    fn no_unpatched_jumps_survive() {
        let source = "if (true && false || true) { emit 1 } else { emit 2 }";
        let program = must_compile(source);
        for op in &program.code {
            match op {
                Op::Jump(t) | Op::JumpIfTrue(t) | Op::JumpIfFalse(t) => {
                    assert!(*t <= program.code.len(), "unpatched jump survived: {op}");
                }
                _ => {}
            }
        }
    }

    #[test]
    fn parse_error_reports_rule_and_position() {
        let err = compile("if (x) { emit }").unwrap_err();
        match err {
            ScriptError::Parse(parse) => {
                assert_eq!(parse.rule, "emit");
                assert_eq!(parse.line, 1);
                assert_eq!(parse.column, 15);
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }
}
