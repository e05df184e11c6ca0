//! The pre-scanner.
//!
//! `scan_until` advances the lexer across a balanced-bracket region without
//! emitting any code, and returns the source range it skipped. The
//! statement parser uses it to pin down loop conditions, for-in heads,
//! switch bodies and case expressions, which the main pass then revisits.

use super::lexer::{Lexer, TokenKind};
use super::lexer::TokenKind::*;
use crate::error::{Error, ErrorKind, Result};
use crate::span::Span;

/// A region of source skipped by the scanner, to be re-entered later with
/// [`Lexer::part`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceRange {
  pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanMode {
  PrimaryExpr,
  PrimaryAfterNew,
  PostPrimary,
  PrimaryEnd,
  Statement,
  FunctionArgs,
  PropertyName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanStack {
  Head,
  ParenExpr,
  ParenStmt,
  ColonExpr,
  ColonStmt,
  SquareBracketExpr,
  ObjectLiteral,
  BlockStmt,
  BlockExpr,
  BlockProperty,
}

fn continues_binary(kind: TokenKind) -> bool {
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
  )
}

fn is_property_name(kind: TokenKind) -> bool {
  matches!(kind, Lit_Ident | Lit_String | Lit_Number)
    || is_keyword(kind)
}

fn is_keyword(kind: TokenKind) -> bool {
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

struct Scanner<'a, 'src> {
  lex: &'a mut Lexer<'src>,
  stack: Vec<ScanStack>,
  mode: ScanMode,
}

/// Scan forward until one of `ends` appears at the outermost bracket depth,
/// starting the automaton in `mode`. The terminator is left as the current
/// token; the returned range ends just before it.
pub fn scan_until(
  lex: &mut Lexer<'_>,
  mode: ScanMode,
  ends: &[TokenKind],
) -> Result<SourceRange> {
  let start = lex.current().span.start();
  let mut scanner = Scanner {
    lex,
    stack: vec![ScanStack::Head],
    mode,
  };
  let end = scanner.run(ends)?;
  log::trace!("scanned range {start}..{end}");
  Ok(SourceRange {
    span: Span::new(start, end),
  })
}

impl<'a, 'src> Scanner<'a, 'src> {
  fn error(&self, kind: ErrorKind) -> Error {
    Error::new(kind, self.lex.current().span)
  }

  fn top(&self) -> ScanStack {
    *self.stack.last().unwrap()
  }

  fn run(&mut self, ends: &[TokenKind]) -> Result<usize> {
    loop {
      let token = self.lex.current().clone();
      if token.is(Tok_Eof) {
        return Err(self.error(ErrorKind::UnexpectedEnd));
      }
      if token.is(Tok_Error) {
        return Err(self.error(ErrorKind::InvalidToken));
      }
      if self.stack.len() == 1
        && ends.contains(&token.kind)
        && matches!(
          self.mode,
          ScanMode::PrimaryExpr | ScanMode::PostPrimary | ScanMode::PrimaryEnd | ScanMode::Statement
        )
      {
        return Ok(token.span.start());
      }

      match self.mode {
        ScanMode::PrimaryExpr | ScanMode::PrimaryAfterNew => self.primary(token.kind)?,
        ScanMode::PostPrimary => {
          if self.post_primary(token.kind)? {
            continue;
          }
        }
        ScanMode::PrimaryEnd => self.primary_end(token.kind)?,
        ScanMode::Statement => {
          if self.statement(token.kind)? {
            continue;
          }
        }
        ScanMode::PropertyName => {
          self.property_name(token.kind)?;
          continue;
        }
        ScanMode::FunctionArgs => unreachable!("FunctionArgs is entered via scan_function"),
      }
      self.lex.bump();
    }
  }

  fn primary(&mut self, kind: TokenKind) -> Result<()> {
    match kind {
      Op_Slash | Op_SlashEqual => {
        self.lex.rescan_regex()?;
        self.mode = ScanMode::PostPrimary;
      }
      Lit_Ident | Kw_This | Lit_True | Lit_False | Lit_Null | Lit_Number | Lit_String
      | Lit_Regexp => self.mode = ScanMode::PostPrimary,
      Op_Plus | Op_Minus | Op_Bang | Op_Tilde | Op_PlusPlus | Op_MinusMinus | Kw_Delete
      | Kw_Void | Kw_TypeOf => self.mode = ScanMode::PrimaryExpr,
      Kw_New => self.mode = ScanMode::PrimaryAfterNew,
      Kw_Function => {
        self.mode = ScanMode::FunctionArgs;
        return self.scan_function(ScanStack::BlockExpr);
      }
      Brk_ParenL => {
        self.stack.push(ScanStack::ParenExpr);
        self.mode = ScanMode::PrimaryExpr;
      }
      Brk_SquareL => {
        self.stack.push(ScanStack::SquareBracketExpr);
        self.mode = ScanMode::PrimaryExpr;
      }
      Brk_CurlyL => {
        self.stack.push(ScanStack::ObjectLiteral);
        self.mode = ScanMode::PropertyName;
      }
      // elisions
      Tok_Comma => self.mode = ScanMode::PrimaryExpr,
      Brk_SquareR if self.top() == ScanStack::SquareBracketExpr => {
        self.stack.pop();
        self.mode = ScanMode::PostPrimary;
      }
      // empty argument lists
      Brk_ParenR if matches!(self.top(), ScanStack::ParenExpr | ScanStack::ParenStmt) => {
        let follow = self.stack.pop().unwrap();
        self.mode = if follow == ScanStack::ParenStmt {
          ScanMode::Statement
        } else {
          ScanMode::PostPrimary
        };
      }
      // empty statements inside statement-level scans
      Tok_Semicolon => self.statement_semicolon()?,
      Brk_CurlyR => self.close_block()?,
      _ => return Err(self.error(ErrorKind::InvalidExpression)),
    }
    Ok(())
  }

  /// Returns `true` when the token was not consumed and must be
  /// re-dispatched in `PrimaryEnd` mode.
  fn post_primary(&mut self, kind: TokenKind) -> Result<bool> {
    match kind {
      Op_PlusPlus | Op_MinusMinus => self.mode = ScanMode::PrimaryEnd,
      Op_Dot => {
        self.lex.bump();
        let name = self.lex.current().kind;
        if !(name == Lit_Ident || is_keyword(name)) {
          return Err(self.error(ErrorKind::ExpectedIdentifier));
        }
      }
      Brk_ParenL => {
        self.stack.push(ScanStack::ParenExpr);
        self.mode = ScanMode::PrimaryExpr;
      }
      Brk_SquareL => {
        self.stack.push(ScanStack::SquareBracketExpr);
        self.mode = ScanMode::PrimaryExpr;
      }
      _ => {
        self.mode = ScanMode::PrimaryEnd;
        return Ok(true);
      }
    }
    Ok(false)
  }

  fn primary_end(&mut self, kind: TokenKind) -> Result<()> {
    match kind {
      kind if continues_binary(kind) => self.mode = ScanMode::PrimaryExpr,
      Tok_Question => {
        self.stack.push(ScanStack::ColonExpr);
        self.mode = ScanMode::PrimaryExpr;
      }
      Tok_Comma => {
        self.mode = if self.top() == ScanStack::ObjectLiteral {
          ScanMode::PropertyName
        } else {
          ScanMode::PrimaryExpr
        };
      }
      Tok_Colon => match self.top() {
        ScanStack::ColonExpr => {
          self.stack.pop();
          self.mode = ScanMode::PrimaryExpr;
        }
        ScanStack::ColonStmt => {
          self.stack.pop();
          self.mode = ScanMode::Statement;
        }
        // a label
        ScanStack::Head | ScanStack::BlockStmt => self.mode = ScanMode::Statement,
        _ => return Err(self.error(ErrorKind::UnexpectedToken)),
      },
      Brk_ParenR => match self.top() {
        ScanStack::ParenExpr => {
          self.stack.pop();
          self.mode = ScanMode::PostPrimary;
        }
        ScanStack::ParenStmt => {
          self.stack.pop();
          self.mode = ScanMode::Statement;
        }
        _ => return Err(self.error(ErrorKind::ExpectedRightParen)),
      },
      Brk_SquareR => match self.top() {
        ScanStack::SquareBracketExpr => {
          self.stack.pop();
          self.mode = ScanMode::PostPrimary;
        }
        _ => return Err(self.error(ErrorKind::ExpectedRightBracket)),
      },
      Brk_CurlyR => self.close_block()?,
      Tok_Semicolon => self.statement_semicolon()?,
      _ => return Err(self.error(ErrorKind::UnexpectedToken)),
    }
    Ok(())
  }

  /// Returns `true` when the token must be re-dispatched in another mode.
  fn statement(&mut self, kind: TokenKind) -> Result<bool> {
    match kind {
      Brk_CurlyL => self.stack.push(ScanStack::BlockStmt),
      Brk_CurlyR => self.close_block()?,
      Brk_ParenL => {
        self.stack.push(ScanStack::ParenStmt);
        self.mode = ScanMode::PrimaryExpr;
      }
      Tok_Semicolon => {}
      Kw_Case => {
        self.stack.push(ScanStack::ColonStmt);
        self.mode = ScanMode::PrimaryExpr;
      }
      Kw_Default => {
        self.lex.bump();
        if !self.lex.current().is(Tok_Colon) {
          return Err(self.error(ErrorKind::ExpectedColon));
        }
      }
      Kw_Do | Kw_Else | Kw_Try | Kw_Finally | Kw_Debugger | Kw_Break | Kw_Continue => {}
      Kw_If | Kw_While | Kw_For | Kw_Switch | Kw_With | Kw_Catch => {}
      Kw_Var | Kw_Return | Kw_Throw => self.mode = ScanMode::PrimaryExpr,
      Kw_Function => {
        self.mode = ScanMode::FunctionArgs;
        self.scan_function(ScanStack::BlockStmt)?;
      }
      Lit_Ident => self.mode = ScanMode::PostPrimary,
      _ => {
        self.mode = ScanMode::PrimaryExpr;
        return Ok(true);
      }
    }
    Ok(false)
  }

  /// Consumes the whole property key (and accessor heads); the caller must
  /// not bump again.
  fn property_name(&mut self, kind: TokenKind) -> Result<()> {
    if kind == Brk_CurlyR {
      return self.close_block().map(|()| self.lex.bump());
    }
    if !is_property_name(kind) {
      return Err(self.error(ErrorKind::UnexpectedToken));
    }
    let lexeme = self.lex.lexeme(self.lex.current());
    let accessor = kind == Lit_Ident && (lexeme == "get" || lexeme == "set");
    self.lex.bump();

    if accessor && is_property_name(self.lex.current().kind) {
      // `get name() { ... }` / `set name(v) { ... }`
      self.lex.bump();
      self.mode = ScanMode::FunctionArgs;
      self.scan_function_params(ScanStack::BlockProperty)?;
      self.lex.bump();
      return Ok(());
    }

    if !self.lex.current().is(Tok_Colon) {
      return Err(self.error(ErrorKind::ExpectedColon));
    }
    self.lex.bump();
    self.mode = ScanMode::PrimaryExpr;
    Ok(())
  }

  fn statement_semicolon(&mut self) -> Result<()> {
    match self.top() {
      ScanStack::ParenStmt => self.mode = ScanMode::PrimaryExpr,
      ScanStack::Head | ScanStack::BlockStmt | ScanStack::BlockExpr | ScanStack::BlockProperty => {
        self.mode = ScanMode::Statement
      }
      _ => return Err(self.error(ErrorKind::UnexpectedToken)),
    }
    Ok(())
  }

  fn close_block(&mut self) -> Result<()> {
    match self.top() {
      ScanStack::ObjectLiteral | ScanStack::BlockExpr => {
        self.stack.pop();
        self.mode = ScanMode::PostPrimary;
      }
      ScanStack::BlockStmt => {
        self.stack.pop();
        self.mode = ScanMode::Statement;
      }
      ScanStack::BlockProperty => {
        self.stack.pop();
        self.mode = ScanMode::PrimaryEnd;
      }
      _ => return Err(self.error(ErrorKind::UnexpectedToken)),
    }
    Ok(())
  }

  /// Validate `function [ident] ( ident (, ident)* ) {` and push the body
  /// block symbol. The current token is `function`.
  fn scan_function(&mut self, body: ScanStack) -> Result<()> {
    self.lex.bump();
    if self.lex.current().is(Lit_Ident) {
      self.lex.bump();
    }
    self.scan_function_params(body)
  }

  /// Validate `( ident (, ident)* ) {` and switch to statement mode.
  fn scan_function_params(&mut self, body: ScanStack) -> Result<()> {
    if !self.lex.current().is(Brk_ParenL) {
      return Err(self.error(ErrorKind::ExpectedLeftParen));
    }
    self.lex.bump();
    if !self.lex.current().is(Brk_ParenR) {
      loop {
        if !self.lex.current().is(Lit_Ident) {
          return Err(self.error(ErrorKind::ExpectedIdentifier));
        }
        self.lex.bump();
        if !self.lex.current().is(Tok_Comma) {
          break;
        }
        self.lex.bump();
      }
    }
    if !self.lex.current().is(Brk_ParenR) {
      return Err(self.error(ErrorKind::ExpectedRightParen));
    }
    self.lex.bump();
    if !self.lex.current().is(Brk_CurlyL) {
      return Err(self.error(ErrorKind::ExpectedLeftBrace));
    }
    self.stack.push(body);
    self.mode = ScanMode::Statement;
    Ok(())
  }
}
