use std::error::Error as StdError;
use std::fmt::{Display, Write};

use crate::span::Span;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// A compilation error, pinned to the offending token.
///
/// Every parser failure is reported through this one type; the first error
/// aborts the whole compilation.
#[derive(Clone, Debug)]
pub struct Error {
  pub kind: ErrorKind,
  pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
  #[error("unexpected token")]
  UnexpectedToken,
  #[error("unexpected end of input")]
  UnexpectedEnd,
  #[error("invalid token")]
  InvalidToken,
  #[error("invalid expression")]
  InvalidExpression,
  #[error("expected `(`")]
  ExpectedLeftParen,
  #[error("expected `)`")]
  ExpectedRightParen,
  #[error("expected `{{`")]
  ExpectedLeftBrace,
  #[error("expected `}}`")]
  ExpectedRightBrace,
  #[error("expected `]`")]
  ExpectedRightBracket,
  #[error("expected `;`")]
  ExpectedSemicolon,
  #[error("expected `:`")]
  ExpectedColon,
  #[error("expected `while`")]
  ExpectedWhile,
  #[error("expected an identifier")]
  ExpectedIdentifier,
  #[error("invalid left-hand side in assignment")]
  InvalidLeftHandSide,
  #[error("break statement must be inside a loop or switch")]
  InvalidBreak,
  #[error("break target label not found")]
  InvalidBreakLabel,
  #[error("continue statement must be inside a loop")]
  InvalidContinue,
  #[error("continue target label must precede a loop")]
  InvalidContinueLabel,
  #[error("duplicate label")]
  DuplicateLabel,
  #[error("multiple default cases are not allowed")]
  MultipleDefaults,
  #[error("case statement must be inside a switch block")]
  CaseOutsideSwitch,
  #[error("default statement must be inside a switch block")]
  DefaultOutsideSwitch,
  #[error("switch body must begin with `case` or `default`")]
  InvalidSwitchBody,
  #[error("return statement must be inside a function")]
  ReturnOutsideFunction,
  #[error("with statement not allowed in strict mode")]
  WithInStrictMode,
  #[error("identifier is reserved in strict mode")]
  ReservedIdent,
  #[error("`eval` and `arguments` are not allowed here in strict mode")]
  NonStrictArg,
  #[error("expected `catch` or `finally` after `try`")]
  MissingCatchOrFinally,
  #[error("illegal newline after `throw`")]
  NewlineAfterThrow,
  #[error("cannot delete an unqualified identifier in strict mode")]
  StrictDelete,
  #[error("octal literals are not allowed in strict mode")]
  StrictOctal,
  #[error("duplicate property in object literal")]
  DuplicateProperty,
  #[error("invalid regular expression")]
  InvalidRegExp,
  #[error("too many arguments")]
  ArgumentLimit,
}

impl Error {
  pub fn new(kind: ErrorKind, span: impl Into<Span>) -> Self {
    Self {
      kind,
      span: span.into(),
    }
  }

  /// Render this error with a snippet of the offending source line.
  pub fn report(&self, src: &str, use_color: bool) -> String {
    let lo = self.span.start().min(src.len());
    let hi = self.span.end().min(src.len());
    let (line, col) = Span::new(lo, hi).line_col(src);

    let mut out = String::new();
    let f = &mut out;
    writeln!(f, "{} at {line}:{col}", self.kind).unwrap();
    if lo == hi {
      return out;
    }

    let start = src[..lo].rfind('\n').map(|v| v + 1).unwrap_or(0);
    let end = src[hi..].find('\n').map(|v| v + hi).unwrap_or(src.len());

    let (r, c) = if use_color {
      ("\x1b[0m", "\x1b[4;31m")
    } else {
      ("", "")
    };

    let pre = &src[start..lo];
    let content: Vec<&str> = src[lo..hi].lines().collect();
    let post = &src[hi..end];
    let last = content.len().saturating_sub(1);
    for (i, line) in content.iter().enumerate() {
      let pre = if i == 0 { pre.trim_start() } else { "" };
      let post = if i == last { post.trim_end() } else { "" };
      writeln!(f, "| {pre}{c}{line}{r}{post}").unwrap();
    }

    out
  }
}

impl Display for Error {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.kind)
  }
}

impl StdError for Error {}
