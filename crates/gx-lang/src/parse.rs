//! PEG parser for GX scripts.
//!
//! Hand-written as mutually recursive matching functions over the source
//! bytes, one per grammar rule. The parser never builds an AST: a successful
//! parse yields a flat list of semantic-action [`Event`]s which the compiler
//! replays in order. Events recorded under an alternative that later fails
//! are rolled back together with the cursor, so no action reaches the
//! compiler unless the whole file parsed.
//!
//! Grammar, low to high precedence: `||`, `&&`, comparisons, additive,
//! multiplicative. All levels associate left-to-right. Unary minus exists
//! only inside numeric literals.

use crate::error::ParseError;

/// Semantic action fired by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Literal constants; the span covers the literal text.
    IntLiteral,
    FloatLiteral,
    BoolLiteral,
    /// Span covers the text between the quotes.
    StrLiteral,
    /// Load a reference; the span covers the full `@path` or identifier.
    Load,
    /// Register a local seen on the LHS of `=`; span covers the identifier.
    AllocRef,
    /// Store into the register of the most recently seen LHS identifier.
    Store,
    /// Lower the LHS of a `@path = …` assignment; span covers the path.
    PrepareMutate,
    /// Write through the prepared path.
    Mutate,
    /// Emit the value on top of the stack.
    Emit,
    /// Open a call frame; span covers the callee name.
    StartCall,
    /// Count one parsed argument on the open call frame.
    CallArg,
    /// Close the call frame and emit the CALL.
    EmitCall,
    /// Conditional forward jump with unknown target (`if`).
    OpenCondJump,
    /// Patch the most recent open jump to the current code position.
    CloseJump,
    /// Switch the open `if` jump into its two-jump `else` form.
    BeginElse,
    /// Short-circuit boolean chains.
    BeginAnd,
    AndArm,
    CloseAnd,
    BeginOr,
    OrArm,
    CloseOr,
    /// Binary operators, fired after both operands.
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
}

/// One recorded semantic action with its source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub action: Action,
    pub start: usize,
    pub end: usize,
}

/// Parse a script into its flat event list.
pub fn parse(source: &str) -> Result<Vec<Event>, ParseError> {
    let mut parser = Parser::new(source);
    if parser.file() {
        Ok(parser.events)
    } else {
        Err(parser.error())
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Cursor + event recorder.
///
/// `mark`/`reset` capture and restore both the position and the event count,
/// which is what makes ordered-choice backtracking safe in the presence of
/// semantic actions.
struct Parser<'src> {
    text: &'src str,
    src: &'src [u8],
    pos: usize,
    events: Vec<Event>,
    /// Active named rules: (name, position the rule started at).
    rules: Vec<(&'static str, usize)>,
    /// Furthest failure observed so far.
    fail_pos: usize,
    fail_rule: &'static str,
}

type Mark = (usize, usize);

impl<'src> Parser<'src> {
    fn new(text: &'src str) -> Self {
        Self {
            text,
            src: text.as_bytes(),
            pos: 0,
            events: Vec::new(),
            rules: Vec::new(),
            fail_pos: 0,
            fail_rule: "file",
        }
    }

    // === Cursor primitives ===

    fn mark(&self) -> Mark {
        (self.pos, self.events.len())
    }

    fn reset(&mut self, mark: Mark) {
        self.pos = mark.0;
        self.events.truncate(mark.1);
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// Record a failure at the current position and return `false`.
    ///
    /// Only the first failure at the furthest position wins; it is attributed
    /// to the innermost active rule that had already consumed input there.
    fn fail(&mut self) -> bool {
        if self.pos > self.fail_pos || (self.fail_pos == 0 && self.fail_rule == "file") {
            self.fail_pos = self.pos;
            self.fail_rule = self.blamed_rule();
        }
        false
    }

    fn blamed_rule(&self) -> &'static str {
        for &(name, start) in self.rules.iter().rev() {
            if start < self.pos {
                return name;
            }
        }
        self.rules.first().map(|&(name, _)| name).unwrap_or("file")
    }

    fn lit(&mut self, expected: &str) -> bool {
        if self.src[self.pos..].starts_with(expected.as_bytes()) {
            self.pos += expected.len();
            true
        } else {
            self.fail()
        }
    }

    /// Match a keyword with an identifier boundary after it, so `emitted`
    /// never begins with the keyword `emit`.
    fn keyword(&mut self, word: &str) -> bool {
        let start = self.pos;
        if !self.lit(word) {
            return false;
        }
        if matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos = start;
            return false;
        }
        true
    }

    fn ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn wsn(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    // === Event recording ===

    fn push(&mut self, action: Action) {
        self.events.push(Event {
            action,
            start: self.pos,
            end: self.pos,
        });
    }

    fn push_span(&mut self, action: Action, start: usize, end: usize) {
        self.events.push(Event { action, start, end });
    }

    /// Run `f` as the named rule, for failure attribution.
    fn rule(&mut self, name: &'static str, f: impl FnOnce(&mut Self) -> bool) -> bool {
        self.rules.push((name, self.pos));
        let ok = f(self);
        self.rules.pop();
        ok
    }

    fn error(&self) -> ParseError {
        let mut line = 1;
        let mut column = 1;
        for (offset, c) in self.text.char_indices() {
            if offset >= self.fail_pos {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        ParseError {
            rule: self.fail_rule,
            line,
            column,
        }
    }

    // === Grammar rules ===

    /// `file ← wsn section* EOF`
    fn file(&mut self) -> bool {
        self.rule("file", |p| {
            p.wsn();
            p.sections();
            p.at_end() || p.fail()
        })
    }

    fn sections(&mut self) {
        loop {
            let mark = self.mark();
            if !self.section() {
                self.reset(mark);
                break;
            }
        }
    }

    /// `section ← comment | block | stmt`
    fn section(&mut self) -> bool {
        self.rule("section", |p| {
            let mark = p.mark();
            if p.comment() {
                return true;
            }
            p.reset(mark);
            if p.if_block() {
                return true;
            }
            p.reset(mark);
            p.stmt()
        })
    }

    /// `comment ← "//" (¬'\n')* wsn`
    fn comment(&mut self) -> bool {
        self.rule("comment", |p| {
            if !p.lit("//") {
                return false;
            }
            while matches!(p.peek(), Some(c) if c != b'\n') {
                p.pos += 1;
            }
            p.wsn();
            true
        })
    }

    /// `if_block ← if_cond "{" wsn section* "}" wsn (else_block)? @closeJump`
    fn if_block(&mut self) -> bool {
        self.rule("if_block", |p| {
            if !p.if_cond() {
                return false;
            }
            if !p.lit("{") {
                return false;
            }
            p.wsn();
            p.sections();
            p.wsn();
            if !p.lit("}") {
                return false;
            }
            p.wsn();
            let mark = p.mark();
            if !p.else_block() {
                p.reset(mark);
            }
            p.push(Action::CloseJump);
            p.wsn();
            true
        })
    }

    /// `if_cond ← "if" ws "(" ws expr ws ")" wsn @openCondJump`
    fn if_cond(&mut self) -> bool {
        self.rule("if_cond", |p| {
            if !p.keyword("if") {
                return false;
            }
            p.ws();
            if !p.lit("(") {
                return false;
            }
            p.ws();
            if !p.expr() {
                return false;
            }
            p.ws();
            if !p.lit(")") {
                return false;
            }
            p.wsn();
            p.push(Action::OpenCondJump);
            true
        })
    }

    /// `else_block ← "else" @beginElse wsn "{" wsn section* "}" wsn`
    fn else_block(&mut self) -> bool {
        self.rule("else_block", |p| {
            if !p.keyword("else") {
                return false;
            }
            p.push(Action::BeginElse);
            p.wsn();
            if !p.lit("{") {
                return false;
            }
            p.wsn();
            p.sections();
            p.wsn();
            if !p.lit("}") {
                return false;
            }
            p.wsn();
            true
        })
    }

    /// `stmt ← (emit | assignment) wsn`
    fn stmt(&mut self) -> bool {
        self.rule("stmt", |p| {
            let mark = p.mark();
            let matched = if p.emit_stmt() {
                true
            } else {
                p.reset(mark);
                p.assignment()
            };
            if !matched {
                return false;
            }
            p.wsn();
            true
        })
    }

    /// `emit ← "emit" ws expr @emitOp`
    fn emit_stmt(&mut self) -> bool {
        self.rule("emit", |p| {
            if !p.keyword("emit") {
                return false;
            }
            p.ws();
            if !p.expr() {
                return false;
            }
            p.push(Action::Emit);
            true
        })
    }

    /// `assignment ← global_assign | var_assign`
    fn assignment(&mut self) -> bool {
        self.rule("assignment", |p| {
            let mark = p.mark();
            if p.global_assign() {
                return true;
            }
            p.reset(mark);
            p.var_assign()
        })
    }

    /// `global_assign ← <global_ref> @prepareMutate ws "=" ws expr @mut`
    fn global_assign(&mut self) -> bool {
        self.rule("global_assign", |p| {
            let start = p.pos;
            if !p.global_ref() {
                return false;
            }
            p.push_span(Action::PrepareMutate, start, p.pos);
            p.ws();
            if !p.lit("=") {
                return false;
            }
            p.ws();
            if !p.expr() {
                return false;
            }
            p.push(Action::Mutate);
            true
        })
    }

    /// `var_assign ← <variable_ref> @allocRef ws "=" ws expr @store`
    fn var_assign(&mut self) -> bool {
        self.rule("var_assign", |p| {
            let start = p.pos;
            if !p.variable_ref() {
                return false;
            }
            p.push_span(Action::AllocRef, start, p.pos);
            p.ws();
            if !p.lit("=") {
                return false;
            }
            p.ws();
            if !p.expr() {
                return false;
            }
            p.push(Action::Store);
            true
        })
    }

    fn expr(&mut self) -> bool {
        self.rule("expr", |p| p.or_expr())
    }

    /// `or_expr ← and_expr (ws "||" ws and_expr)*`, short-circuiting.
    fn or_expr(&mut self) -> bool {
        self.rule("or_expr", |p| {
            if !p.and_expr() {
                return false;
            }
            let mut arms = 0;
            loop {
                let mark = p.mark();
                p.ws();
                if !p.lit("||") {
                    p.reset(mark);
                    break;
                }
                p.push(if arms == 0 { Action::BeginOr } else { Action::OrArm });
                p.ws();
                if !p.and_expr() {
                    p.reset(mark);
                    break;
                }
                arms += 1;
            }
            if arms > 0 {
                p.push(Action::CloseOr);
            }
            true
        })
    }

    /// `and_expr ← cmp_expr (ws "&&" ws cmp_expr)*`, short-circuiting.
    fn and_expr(&mut self) -> bool {
        self.rule("and_expr", |p| {
            if !p.cmp_expr() {
                return false;
            }
            let mut arms = 0;
            loop {
                let mark = p.mark();
                p.ws();
                if !p.lit("&&") {
                    p.reset(mark);
                    break;
                }
                p.push(if arms == 0 { Action::BeginAnd } else { Action::AndArm });
                p.ws();
                if !p.cmp_expr() {
                    p.reset(mark);
                    break;
                }
                arms += 1;
            }
            if arms > 0 {
                p.push(Action::CloseAnd);
            }
            true
        })
    }

    /// `cmp_expr ← add_expr (ws cmp_op ws add_expr @cmpOp)*`
    fn cmp_expr(&mut self) -> bool {
        self.rule("cmp_expr", |p| {
            if !p.add_expr() {
                return false;
            }
            loop {
                let mark = p.mark();
                p.ws();
                // Two-character operators first.
                let action = if p.lit("==") {
                    Action::Eq
                } else if p.lit("!=") {
                    Action::Neq
                } else if p.lit("<=") {
                    Action::Lte
                } else if p.lit("<") {
                    Action::Lt
                } else if p.lit(">=") {
                    Action::Gte
                } else if p.lit(">") {
                    Action::Gt
                } else {
                    p.reset(mark);
                    break;
                };
                p.ws();
                if !p.add_expr() {
                    p.reset(mark);
                    break;
                }
                p.push(action);
            }
            true
        })
    }

    /// `add_expr ← mul_expr (ws add_op ws mul_expr @addOp)*`
    fn add_expr(&mut self) -> bool {
        self.rule("add_expr", |p| {
            if !p.mul_expr() {
                return false;
            }
            loop {
                let mark = p.mark();
                p.ws();
                let action = if p.lit("+") {
                    Action::Add
                } else if p.lit("-") {
                    Action::Sub
                } else {
                    p.reset(mark);
                    break;
                };
                p.ws();
                if !p.mul_expr() {
                    p.reset(mark);
                    break;
                }
                p.push(action);
            }
            true
        })
    }

    /// `mul_expr ← primary (ws mul_op ws primary @mulOp)*`
    fn mul_expr(&mut self) -> bool {
        self.rule("mul_expr", |p| {
            if !p.primary() {
                return false;
            }
            loop {
                let mark = p.mark();
                p.ws();
                let action = if p.lit("*") {
                    Action::Mul
                } else if p.lit("/") {
                    Action::Div
                } else {
                    p.reset(mark);
                    break;
                };
                p.ws();
                if !p.primary() {
                    p.reset(mark);
                    break;
                }
                p.push(action);
            }
            true
        })
    }

    /// `primary ← "(" ws expr ws ")" | func_call | literal | deref`
    fn primary(&mut self) -> bool {
        self.rule("primary", |p| {
            let mark = p.mark();
            if p.lit("(") {
                p.ws();
                if p.expr() {
                    p.ws();
                    if p.lit(")") {
                        return true;
                    }
                }
                p.reset(mark);
                return false;
            }
            p.reset(mark);
            if p.func_call() {
                return true;
            }
            p.reset(mark);
            if p.literal() {
                return true;
            }
            p.reset(mark);
            p.deref()
        })
    }

    /// `func_call ← <ident> @startCall "(" wsn (expr @callArg ("," wsn expr @callArg)*)? wsn ")" @call`
    fn func_call(&mut self) -> bool {
        self.rule("func_call", |p| {
            let start = p.pos;
            if !p.ident() {
                return false;
            }
            let name_end = p.pos;
            if !p.lit("(") {
                return false;
            }
            p.push_span(Action::StartCall, start, name_end);
            p.wsn();
            let mark = p.mark();
            if p.expr() {
                p.push(Action::CallArg);
                loop {
                    let arg_mark = p.mark();
                    p.ws();
                    if !p.lit(",") {
                        p.reset(arg_mark);
                        break;
                    }
                    p.wsn();
                    if !p.expr() {
                        p.reset(arg_mark);
                        break;
                    }
                    p.push(Action::CallArg);
                }
            } else {
                p.reset(mark);
            }
            p.wsn();
            if !p.lit(")") {
                return false;
            }
            p.push(Action::EmitCall);
            true
        })
    }

    /// `deref ← <ref> @load`
    fn deref(&mut self) -> bool {
        self.rule("deref", |p| {
            let start = p.pos;
            let matched = {
                let mark = p.mark();
                if p.global_ref() {
                    true
                } else {
                    p.reset(mark);
                    p.variable_ref()
                }
            };
            if !matched {
                return false;
            }
            p.push_span(Action::Load, start, p.pos);
            true
        })
    }

    /// `global_ref ← "@" (ident ("." ident)*)?`
    fn global_ref(&mut self) -> bool {
        self.rule("global_ref", |p| {
            if !p.lit("@") {
                return false;
            }
            let mark = p.mark();
            if p.ident() {
                loop {
                    let seg_mark = p.mark();
                    if !p.lit(".") {
                        p.reset(seg_mark);
                        break;
                    }
                    if !p.ident() {
                        p.reset(seg_mark);
                        break;
                    }
                }
            } else {
                p.reset(mark);
            }
            true
        })
    }

    fn variable_ref(&mut self) -> bool {
        self.rule("variable_ref", |p| p.ident())
    }

    /// `literal ← bool | float | int | string`
    ///
    /// `bool` comes before `float`/`int` so `true` is never left for the
    /// reference rule; `float` comes before `int` so `-12.5` is not matched
    /// as `-12` followed by `.5`.
    fn literal(&mut self) -> bool {
        self.rule("literal", |p| {
            let mark = p.mark();
            if p.bool_lit() {
                return true;
            }
            p.reset(mark);
            if p.float_lit() {
                return true;
            }
            p.reset(mark);
            if p.int_lit() {
                return true;
            }
            p.reset(mark);
            p.string_lit()
        })
    }

    fn bool_lit(&mut self) -> bool {
        self.rule("bool", |p| {
            let start = p.pos;
            if p.keyword("true") || p.keyword("false") {
                p.push_span(Action::BoolLiteral, start, p.pos);
                true
            } else {
                false
            }
        })
    }

    /// `float ← "-"? [0-9]+ "." [0-9]*` — trailing dot allowed, leading not.
    fn float_lit(&mut self) -> bool {
        self.rule("float", |p| {
            let start = p.pos;
            if p.peek() == Some(b'-') {
                p.pos += 1;
            }
            if !p.digits() {
                return false;
            }
            if !p.lit(".") {
                return false;
            }
            while matches!(p.peek(), Some(c) if c.is_ascii_digit()) {
                p.pos += 1;
            }
            p.push_span(Action::FloatLiteral, start, p.pos);
            true
        })
    }

    /// `int ← "-"? [0-9]+`
    fn int_lit(&mut self) -> bool {
        self.rule("int", |p| {
            let start = p.pos;
            if p.peek() == Some(b'-') {
                p.pos += 1;
            }
            if !p.digits() {
                return false;
            }
            p.push_span(Action::IntLiteral, start, p.pos);
            true
        })
    }

    /// `string ← '"' (¬'"')* '"'` — no escape processing.
    fn string_lit(&mut self) -> bool {
        self.rule("string", |p| {
            if !p.lit("\"") {
                return false;
            }
            let start = p.pos;
            while matches!(p.peek(), Some(c) if c != b'"') {
                p.pos += 1;
            }
            let end = p.pos;
            if !p.lit("\"") {
                return false;
            }
            p.push_span(Action::StrLiteral, start, end);
            true
        })
    }

    fn digits(&mut self) -> bool {
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return self.fail();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        true
    }

    /// `ident ← [A-Za-z_] [A-Za-z0-9_]*`
    fn ident(&mut self) -> bool {
        if !matches!(self.peek(), Some(c) if is_ident_start(c)) {
            return self.fail();
        }
        self.pos += 1;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos += 1;
        }
        true
    }
}
