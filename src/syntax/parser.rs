#![deny(unused_must_use)]

use std::rc::Rc;

use beef::lean::Cow;

use super::lexer::{self, Lexer, Token, TokenKind, TokenKind::*};
use super::scanner::{scan_until, ScanMode, SourceRange};
use super::{Options, ScopeKind};
use crate::bytecode::builder::{Branch, BytecodeBuilder, Fold};
use crate::bytecode::opcode::Op;
use crate::bytecode::{CompiledCode, Literal, LiteralFlags, StatusFlags};
use crate::error::{Error, ErrorKind, Result};
use crate::span::Span;

/// Runtime context-stack slots allocated per statement kind. The nominal
/// stack depth must equal the open allocations at every statement boundary.
pub(super) const TRY_CONTEXT_STACK_ALLOCATION: i32 = 2;
pub(super) const WITH_CONTEXT_STACK_ALLOCATION: i32 = 1;
pub(super) const FOR_IN_CONTEXT_STACK_ALLOCATION: i32 = 2;

const STRICT_RESERVED: &[&str] = &[
  "implements",
  "interface",
  "let",
  "package",
  "private",
  "protected",
  "public",
  "static",
  "yield",
];

pub fn parse(src: &str, options: Options) -> Result<CompiledCode> {
  log::debug!("compiling {} bytes as {:?}", src.len(), options.kind);
  let mut status = StatusFlags::empty();
  match options.kind {
    ScopeKind::Global => {}
    ScopeKind::Eval => status |= StatusFlags::EVAL,
    ScopeKind::Function => status |= StatusFlags::FUNCTION,
  }
  if options.strict {
    status |= StatusFlags::STRICT_MODE;
  }

  let mut parser = Parser {
    src,
    lex: Lexer::new(src),
    funcs: vec![Func::new(status)],
    injected: None,
  };
  parser.parse_statements()?;
  if !parser.lex.current().is(Tok_Eof) {
    return Err(parser.error(ErrorKind::UnexpectedToken));
  }
  parser.emit(Op::ReturnUndefined);
  Ok(parser.funcs.pop().unwrap().finish())
}

pub(super) struct LoopFrame {
  pub jumps: Vec<PendingJump>,
}

impl LoopFrame {
  pub fn new() -> Self {
    Self { jumps: Vec::new() }
  }
}

/// An unresolved break or continue filed into the frame it targets. The
/// flag stands in for the high offset bit of the C layout.
pub(super) struct PendingJump {
  pub branch: Branch,
  pub is_continue: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum TryPhase {
  Try,
  Catch,
  Finally,
}

/// One open statement. The stack of these is the Rust rendering of the
/// paged {payload, tag} statement stack; the vector bottom is the `START`
/// sentinel of the enclosing function scope.
pub(super) enum Frame<'src> {
  Block,
  Label {
    name: Cow<'src, str>,
    breaks: Vec<PendingJump>,
  },
  If {
    end: Branch,
  },
  Else {
    end: Branch,
  },
  Switch {
    default_branch: Option<Branch>,
    has_default: bool,
    cases: Vec<Option<Branch>>,
    next_case: usize,
    loop_frame: LoopFrame,
  },
  DoWhile {
    start: usize,
    loop_frame: LoopFrame,
  },
  While {
    end: Branch,
    cond: SourceRange,
    start: usize,
    loop_frame: LoopFrame,
  },
  For {
    end: Option<Branch>,
    cond: Option<SourceRange>,
    update: Option<SourceRange>,
    start: usize,
    loop_frame: LoopFrame,
  },
  ForIn {
    end: Branch,
    start: usize,
    loop_frame: LoopFrame,
  },
  With {
    end: Branch,
  },
  Try {
    phase: TryPhase,
    end: Branch,
  },
}

impl<'src> Frame<'src> {
  pub fn is_loop(&self) -> bool {
    matches!(
      self,
      Frame::DoWhile { .. } | Frame::While { .. } | Frame::For { .. } | Frame::ForIn { .. }
    )
  }

  /// Runtime contexts a jump out of this frame has to unwind.
  pub fn exits_context(&self) -> bool {
    matches!(self, Frame::ForIn { .. } | Frame::With { .. } | Frame::Try { .. })
  }

  pub fn loop_frame_mut(&mut self) -> Option<&mut LoopFrame> {
    match self {
      Frame::Switch { loop_frame, .. }
      | Frame::DoWhile { loop_frame, .. }
      | Frame::While { loop_frame, .. }
      | Frame::For { loop_frame, .. }
      | Frame::ForIn { loop_frame, .. } => Some(loop_frame),
      _ => None,
    }
  }
}

/// Per-function compilation state; nested function bodies push a fresh one.
pub(super) struct Func<'src> {
  pub builder: BytecodeBuilder,
  pub frames: Vec<Frame<'src>>,
  pub status: StatusFlags,
  pub has_non_strict_arg: bool,
  pub context_slots: i32,
}

impl<'src> Func<'src> {
  fn new(status: StatusFlags) -> Self {
    Self {
      builder: BytecodeBuilder::new(),
      frames: Vec::new(),
      status,
      has_non_strict_arg: false,
      context_slots: 0,
    }
  }

  fn finish(mut self) -> CompiledCode {
    debug_assert!(self.frames.is_empty());
    if self.has_non_strict_arg {
      self.status |= StatusFlags::HAS_NON_STRICT_ARG;
    }
    let code = self.builder.finish(self.status);
    log::trace!(
      "compiled function: {} literals, {} bytes",
      code.literal_end,
      code.code.len()
    );
    code
  }
}

pub(super) struct Parser<'src> {
  pub src: &'src str,
  pub lex: Lexer<'src>,
  pub funcs: Vec<Func<'src>>,
  /// A string literal captured by the directive prologue that turned out to
  /// start an expression; consumed by `primary` in place of a token.
  pub injected: Option<Token>,
}

impl<'src> Parser<'src> {
  #[inline]
  pub fn func(&mut self) -> &mut Func<'src> {
    self.funcs.last_mut().unwrap()
  }

  #[inline]
  pub fn builder(&mut self) -> &mut BytecodeBuilder {
    &mut self.func().builder
  }

  #[inline]
  pub fn strict(&self) -> bool {
    self
      .funcs
      .last()
      .unwrap()
      .status
      .contains(StatusFlags::STRICT_MODE)
  }

  #[inline]
  pub fn current(&self) -> &Token {
    self.lex.current()
  }

  #[inline]
  pub fn bump(&mut self) {
    self.lex.bump();
  }

  #[inline]
  pub fn bump_if(&mut self, kind: TokenKind) -> bool {
    if self.current().is(kind) {
      self.bump();
      true
    } else {
      false
    }
  }

  #[inline]
  pub fn expect(&mut self, kind: TokenKind, err: ErrorKind) -> Result<()> {
    if self.bump_if(kind) {
      Ok(())
    } else {
      Err(self.error(err))
    }
  }

  pub fn error(&self, kind: ErrorKind) -> Error {
    Error::new(kind, self.current().span)
  }

  pub fn error_at(&self, kind: ErrorKind, span: Span) -> Error {
    Error::new(kind, span)
  }

  // emit helpers

  pub fn emit(&mut self, op: Op) {
    self.builder().emit(op);
  }

  pub fn emit_lit(&mut self, op: Op, lit: u32) {
    self.builder().emit_lit(op, lit);
  }

  pub fn emit_byte(&mut self, op: Op, value: u8) {
    self.builder().emit_byte(op, value);
  }

  pub fn ident_lit(&mut self, name: &str) -> u32 {
    self.builder().literal(Literal::Ident(name.into()))
  }

  pub fn str_lit(&mut self, value: &str) -> u32 {
    self.builder().literal(Literal::Str(value.into()))
  }

  pub fn num_lit(&mut self, value: f64) -> u32 {
    self.builder().literal(Literal::number(value))
  }

  /// Automatic semicolon insertion: a real `;`, or a `}` / end of input /
  /// line break before the next token.
  pub fn consume_semicolon(&mut self) -> Result<()> {
    if self.bump_if(Tok_Semicolon) {
      return Ok(());
    }
    let current = self.current();
    if current.is(Brk_CurlyR) || current.is(Tok_Eof) || current.nl {
      return Ok(());
    }
    Err(self.error(ErrorKind::ExpectedSemicolon))
  }

  /// Re-parse a recorded source range with `f`, then restore the main
  /// cursor. The range must be fully consumed.
  pub fn with_range<T>(
    &mut self,
    range: SourceRange,
    f: impl FnOnce(&mut Self) -> Result<T>,
  ) -> Result<T> {
    let part = Lexer::part(self.src, range.span.range());
    let saved = std::mem::replace(&mut self.lex, part);
    let result = f(self);
    let result = result.and_then(|value| {
      if self.lex.current().is(Tok_Eof) {
        Ok(value)
      } else {
        Err(self.error(ErrorKind::UnexpectedToken))
      }
    });
    self.lex = saved;
    result
  }

  pub fn scan(&mut self, mode: ScanMode, ends: &[TokenKind]) -> Result<SourceRange> {
    scan_until(&mut self.lex, mode, ends)
  }

  // identifiers and bindings

  /// The current token as an identifier binding; checks the strict-mode
  /// restrictions and returns the name.
  pub fn binding_ident(&mut self) -> Result<Cow<'src, str>> {
    if !self.current().is(Lit_Ident) {
      return Err(self.error(ErrorKind::ExpectedIdentifier));
    }
    let name = self.lex.lexeme(self.current());
    if self.strict() {
      if name == "eval" || name == "arguments" {
        return Err(self.error(ErrorKind::NonStrictArg));
      }
      if STRICT_RESERVED.contains(&name) {
        return Err(self.error(ErrorKind::ReservedIdent));
      }
    }
    self.bump();
    Ok(Cow::from(name))
  }

  /// An identifier in expression position; only the reserved-word check
  /// applies.
  pub fn reference_ident(&mut self) -> Result<&'src str> {
    debug_assert!(self.current().is(Lit_Ident));
    let name = self.lex.lexeme(self.current());
    if self.strict() && STRICT_RESERVED.contains(&name) {
      return Err(self.error(ErrorKind::ReservedIdent));
    }
    self.bump();
    Ok(name)
  }

  /// Property name after `.`: any identifier or keyword.
  pub fn property_ident(&mut self) -> Result<&'src str> {
    let current = self.current();
    let ok = current.is(Lit_Ident) || is_keyword_token(current.kind);
    if !ok {
      return Err(self.error(ErrorKind::ExpectedIdentifier));
    }
    let name = self.lex.lexeme(current);
    self.bump();
    Ok(name)
  }

  // directive prologue

  /// Consume the directive prologue: leading bare string-literal expression
  /// statements. `"use strict"` (exactly ten bytes, no escapes) makes the
  /// scope strict. A string that turns out to start an expression is handed
  /// back to the expression parser as an injected primary.
  pub fn parse_directive_prologue(&mut self) -> Result<()> {
    while self.current().is(Lit_String) {
      let token = self.current().clone();
      let next = self.lex.peek();
      let directive = matches!(next.kind, Tok_Semicolon | Brk_CurlyR | Tok_Eof)
        || (next.nl && !continues_expression(next.kind));
      if !directive {
        self.injected = Some(token);
        self.bump();
        self.expr_statement()?;
        return Ok(());
      }

      self.bump();
      let raw = self.lex.lexeme(&token);
      if &raw[1..raw.len() - 1] == "use strict" {
        if self.func().has_non_strict_arg {
          return Err(self.error_at(ErrorKind::NonStrictArg, token.span));
        }
        self.func().status |= StatusFlags::STRICT_MODE;
      }

      let lit = self.string_literal(&token)?;
      self.emit_lit(Op::PushLiteral, lit);
      self.emit(Op::Pop);
      self.consume_semicolon()?;
    }
    Ok(())
  }

  /// Intern the decoded value of a string token.
  pub fn string_literal(&mut self, token: &Token) -> Result<u32> {
    let raw = self.lex.lexeme(token);
    let (value, has_octal) = lexer::unescape(raw)
      .map_err(|_| self.error_at(ErrorKind::InvalidToken, token.span))?;
    if has_octal && self.strict() {
      return Err(self.error_at(ErrorKind::StrictOctal, token.span));
    }
    Ok(self.str_lit(&value))
  }

  // functions

  /// Compile a `function` production. The current token is the one right
  /// after the `function` keyword. Returns the function literal's index in
  /// the parent pool.
  pub fn parse_function(&mut self, declaration: bool) -> Result<(Option<Cow<'src, str>>, u32)> {
    self.check_recursion_limit(self.current().span)?;

    let mut non_strict_name = false;
    let name = if self.current().is(Lit_Ident) {
      let lexeme = self.lex.lexeme(self.current());
      if lexeme == "eval" || lexeme == "arguments" {
        if self.strict() {
          return Err(self.error(ErrorKind::NonStrictArg));
        }
        non_strict_name = true;
        self.bump();
        Some(Cow::from(lexeme))
      } else {
        Some(self.binding_ident()?)
      }
    } else if declaration {
      return Err(self.error(ErrorKind::ExpectedIdentifier));
    } else {
      None
    };

    self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
    let mut params: Vec<(&'src str, Span)> = Vec::new();
    if !self.current().is(Brk_ParenR) {
      loop {
        if !self.current().is(Lit_Ident) {
          return Err(self.error(ErrorKind::ExpectedIdentifier));
        }
        let span = self.current().span;
        let lexeme = self.lex.lexeme(self.current());
        self.bump();
        params.push((lexeme, span));
        if !self.bump_if(Tok_Comma) {
          break;
        }
      }
    }
    self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
    self.expect(Brk_CurlyL, ErrorKind::ExpectedLeftBrace)?;
    if params.len() > u8::MAX as usize {
      return Err(self.error(ErrorKind::ArgumentLimit));
    }

    let parent_strict = self.strict();
    let mut status = StatusFlags::FUNCTION;
    if parent_strict {
      status |= StatusFlags::STRICT_MODE;
    }
    self.funcs.push(Func::new(status));
    self.func().has_non_strict_arg = non_strict_name;

    for (i, (param, span)) in params.iter().enumerate() {
      let span = *span;
      if parent_strict && (*param == "eval" || *param == "arguments") {
        return Err(self.error_at(ErrorKind::NonStrictArg, span));
      }
      if parent_strict && STRICT_RESERVED.contains(param) {
        return Err(self.error_at(ErrorKind::ReservedIdent, span));
      }
      let duplicate = params[..i].iter().any(|(p, _)| p == param);
      if duplicate && parent_strict {
        return Err(self.error_at(ErrorKind::NonStrictArg, span));
      }
      if duplicate || *param == "eval" || *param == "arguments" {
        self.func().has_non_strict_arg = true;
      }
      let lit = self.ident_lit(param);
      self.builder().mark(lit, LiteralFlags::ARG);
    }

    self.parse_statements()?;
    self.expect(Brk_CurlyR, ErrorKind::ExpectedRightBrace)?;
    self.emit(Op::ReturnUndefined);

    let code = self.funcs.pop().unwrap().finish();
    let lit = self.builder().literal(Literal::Function(Rc::new(code)));
    Ok((name, lit))
  }

  // statement boundary bookkeeping

  /// At every statement boundary the operand stack holds exactly the open
  /// contexts' allocations.
  pub fn assert_statement_boundary(&mut self) {
    let slots = self.func().context_slots;
    debug_assert_eq!(
      self.builder().depth(),
      slots,
      "statement boundary depth mismatch"
    );
  }
}

impl<'src> Parser<'src> {
  // Statements are iterative; only expressions and function bodies recurse,
  // checking in at `assignment`, `primary` and `parse_function`. One check
  // covers at most two native frames, so the headroom only has to absorb a
  // couple of frames plus the unwind back to the compile entry once the
  // error is raised.
  #[cfg(feature = "check-recursion-limit")]
  const STACK_HEADROOM: usize = 96 * 1024;

  #[cfg(feature = "check-recursion-limit")]
  pub fn check_recursion_limit(&self, span: Span) -> Result<()> {
    match stacker::remaining_stack() {
      Some(left) if left <= Self::STACK_HEADROOM => {
        Err(self.error_at(ErrorKind::InvalidExpression, span))
      }
      // platforms without stack introspection (wasm) run unchecked; the
      // host traps the overflow instead
      _ => Ok(()),
    }
  }

  #[cfg(not(feature = "check-recursion-limit"))]
  pub fn check_recursion_limit(&self, _span: Span) -> Result<()> {
    Ok(())
  }
}

pub(super) fn is_keyword_token(kind: TokenKind) -> bool {
  matches!(
    kind,
    Kw_Break
      | Kw_Case
      | Kw_Catch
      | Kw_Continue
      | Kw_Debugger
      | Kw_Default
      | Kw_Delete
      | Kw_Do
      | Kw_Else
      | Kw_Finally
      | Kw_For
      | Kw_Function
      | Kw_If
      | Kw_In
      | Kw_InstanceOf
      | Kw_New
      | Kw_Return
      | Kw_Switch
      | Kw_This
      | Kw_Throw
      | Kw_Try
      | Kw_TypeOf
      | Kw_Var
      | Kw_Void
      | Kw_While
      | Kw_With
      | Kw_Reserved
      | Lit_True
      | Lit_False
      | Lit_Null
  )
}

/// Tokens that extend an expression across a line break, defeating the
/// directive-prologue interpretation of a leading string literal.
fn continues_expression(kind: TokenKind) -> bool {
  matches!(
    kind,
    Op_Plus
      | Op_Minus
      | Op_Star
      | Op_Slash
      | Op_Percent
      | Op_Shl
      | Op_Shr
      | Op_UShr
      | Op_Amp
      | Op_Pipe
      | Op_Caret
      | Op_AmpAmp
      | Op_PipePipe
      | Op_EqualEqual
      | Op_BangEqual
      | Op_EqualEqualEqual
      | Op_BangEqualEqual
      | Op_Less
      | Op_More
      | Op_LessEqual
      | Op_MoreEqual
      | Kw_In
      | Kw_InstanceOf
      | Op_Equal
      | Op_PlusEqual
      | Op_MinusEqual
      | Op_StarEqual
      | Op_SlashEqual
      | Op_PercentEqual
      | Op_ShlEqual
      | Op_ShrEqual
      | Op_UShrEqual
      | Op_AmpEqual
      | Op_PipeEqual
      | Op_CaretEqual
      | Op_Dot
      | Brk_ParenL
      | Brk_SquareL
      | Tok_Comma
      | Tok_Question
  )
}

mod expr;
mod stmt;

#[cfg(test)]
mod tests;
