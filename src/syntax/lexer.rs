#![allow(non_camel_case_types)]

use std::ops::Range;

use logos::Logos;

use crate::error::{Error, ErrorKind, Result};
use crate::span::Span;

#[derive(Clone, Debug)]
pub struct Token {
  pub kind: TokenKind,
  pub span: Span,
  /// A line terminator (or a comment containing one) appeared between the
  /// previous token and this one. Drives automatic semicolon insertion and
  /// the restricted productions.
  pub nl: bool,
}

impl Token {
  #[inline]
  pub fn is(&self, kind: TokenKind) -> bool {
    self.kind == kind
  }
}

/// Pull-style lexer over a byte range of the source.
///
/// `part` re-lexes a recorded sub-range, which is how deferred loop
/// conditions and switch case expressions are revisited; spans stay
/// absolute within the full source.
#[derive(Clone)]
pub struct Lexer<'src> {
  src: &'src str,
  inner: logos::Lexer<'src, TokenKind>,
  offset: usize,
  end: usize,
  previous: Token,
  current: Token,
  nl: bool,
  eof: Token,
}

impl<'src> Lexer<'src> {
  pub fn new(src: &'src str) -> Self {
    Self::part(src, 0..src.len())
  }

  pub fn part(src: &'src str, range: Range<usize>) -> Self {
    let eof = Token {
      kind: TokenKind::Tok_Eof,
      span: Span::empty(range.end),
      nl: false,
    };

    let mut lex = Self {
      src,
      inner: TokenKind::lexer(&src[range.clone()]),
      offset: range.start,
      end: range.end,
      previous: eof.clone(),
      current: eof.clone(),
      nl: false,
      eof,
    };
    lex.bump();

    lex
  }

  #[inline]
  pub fn src(&self) -> &'src str {
    self.src
  }

  #[inline]
  pub fn previous(&self) -> &Token {
    &self.previous
  }

  #[inline]
  pub fn current(&self) -> &Token {
    &self.current
  }

  #[inline]
  pub fn lexeme(&self, token: &Token) -> &'src str {
    &self.src[token.span.range()]
  }

  /// Move forward by one token.
  #[inline]
  pub fn bump(&mut self) {
    std::mem::swap(&mut self.previous, &mut self.current);
    self.current = self.next_token().unwrap_or_else(|| {
      let mut eof = self.eof.clone();
      eof.nl = std::mem::take(&mut self.nl);
      eof
    });
  }

  /// The token after the current one, without advancing.
  pub fn peek(&self) -> Token {
    let mut lookahead = self.clone();
    lookahead.bump();
    lookahead.current().clone()
  }

  fn next_token(&mut self) -> Option<Token> {
    let lexer = &mut self.inner;
    while let Some(kind) = lexer.next() {
      let span = lexer.span();
      match kind {
        Ok(TokenKind::_Tok_Whitespace | TokenKind::_Tok_LineComment) => continue,
        Ok(TokenKind::_Tok_Newline) => {
          self.nl = true;
          continue;
        }
        Ok(TokenKind::_Tok_BlockComment) => {
          if lexer.slice().contains('\n') {
            self.nl = true;
          }
          continue;
        }
        Ok(kind) => {
          return Some(Token {
            kind,
            span: Span::new(span.start + self.offset, span.end + self.offset),
            nl: std::mem::take(&mut self.nl),
          });
        }
        Err(_) => {
          return Some(Token {
            kind: TokenKind::Tok_Error,
            span: Span::new(span.start + self.offset, span.end + self.offset),
            nl: std::mem::take(&mut self.nl),
          });
        }
      }
    }
    None
  }

  /// Re-scan the current `/` or `/=` token as a regular expression literal.
  ///
  /// Only called when the parse state expects a primary expression;
  /// everywhere else `/` stays division.
  pub fn rescan_regex(&mut self) -> Result<()> {
    let tok = self.current.clone();
    debug_assert!(matches!(
      tok.kind,
      TokenKind::Op_Slash | TokenKind::Op_SlashEqual
    ));

    let start = tok.span.start();
    let bytes = self.src.as_bytes();
    let mut at = start + 1;
    let mut in_class = false;
    let body_end = loop {
      if at >= self.end {
        return Err(Error::new(ErrorKind::InvalidRegExp, start..at));
      }
      match bytes[at] {
        b'\\' => {
          at += 2;
          if at > self.end {
            return Err(Error::new(ErrorKind::InvalidRegExp, start..self.end));
          }
        }
        b'\n' | b'\r' => return Err(Error::new(ErrorKind::InvalidRegExp, start..at)),
        b'[' => {
          in_class = true;
          at += 1;
        }
        b']' => {
          in_class = false;
          at += 1;
        }
        b'/' if !in_class => break at,
        _ => at += 1,
      }
    };

    at = body_end + 1;
    while at < self.end && bytes[at].is_ascii_alphabetic() {
      at += 1;
    }

    self.current = Token {
      kind: TokenKind::Lit_Regexp,
      span: Span::new(start, at),
      nl: tok.nl,
    };
    self.inner = TokenKind::lexer(&self.src[at..self.end]);
    self.offset = at;
    Ok(())
  }

  /// Split the lexeme of a token produced by `rescan_regex` into its
  /// pattern and flags.
  pub fn regex_parts(&self, token: &Token) -> (&'src str, &'src str) {
    let lexeme = self.lexeme(token);
    let close = lexeme.rfind('/').unwrap();
    (&lexeme[1..close], &lexeme[close + 1..])
  }
}

#[derive(Clone, Copy, Debug, Logos, PartialEq, Eq)]
pub enum TokenKind {
  // Keywords
  #[token("break")]
  Kw_Break,
  #[token("case")]
  Kw_Case,
  #[token("catch")]
  Kw_Catch,
  #[token("continue")]
  Kw_Continue,
  #[token("debugger")]
  Kw_Debugger,
  #[token("default")]
  Kw_Default,
  #[token("delete")]
  Kw_Delete,
  #[token("do")]
  Kw_Do,
  #[token("else")]
  Kw_Else,
  #[token("finally")]
  Kw_Finally,
  #[token("for")]
  Kw_For,
  #[token("function")]
  Kw_Function,
  #[token("if")]
  Kw_If,
  #[token("in")]
  Kw_In,
  #[token("instanceof")]
  Kw_InstanceOf,
  #[token("new")]
  Kw_New,
  #[token("return")]
  Kw_Return,
  #[token("switch")]
  Kw_Switch,
  #[token("this")]
  Kw_This,
  #[token("throw")]
  Kw_Throw,
  #[token("try")]
  Kw_Try,
  #[token("typeof")]
  Kw_TypeOf,
  #[token("var")]
  Kw_Var,
  #[token("void")]
  Kw_Void,
  #[token("while")]
  Kw_While,
  #[token("with")]
  Kw_With,

  /// Future reserved words, always an error when used.
  #[token("class")]
  #[token("const")]
  #[token("enum")]
  #[token("export")]
  #[token("extends")]
  #[token("import")]
  #[token("super")]
  Kw_Reserved,

  // Brackets
  #[token("{")]
  Brk_CurlyL,
  #[token("}")]
  Brk_CurlyR,
  #[token("(")]
  Brk_ParenL,
  #[token(")")]
  Brk_ParenR,
  #[token("[")]
  Brk_SquareL,
  #[token("]")]
  Brk_SquareR,

  // Misc characters
  #[token(".")]
  Op_Dot,
  #[token(",")]
  Tok_Comma,
  #[token(";")]
  Tok_Semicolon,
  #[token(":")]
  Tok_Colon,
  #[token("?")]
  Tok_Question,

  // Equals operators
  #[token("=")]
  Op_Equal,
  #[token("+=")]
  Op_PlusEqual,
  #[token("-=")]
  Op_MinusEqual,
  #[token("*=")]
  Op_StarEqual,
  #[token("/=")]
  Op_SlashEqual,
  #[token("%=")]
  Op_PercentEqual,
  #[token("<<=")]
  Op_ShlEqual,
  #[token(">>=")]
  Op_ShrEqual,
  #[token(">>>=")]
  Op_UShrEqual,
  #[token("&=")]
  Op_AmpEqual,
  #[token("|=")]
  Op_PipeEqual,
  #[token("^=")]
  Op_CaretEqual,

  // Operators
  #[token("+")]
  Op_Plus,
  #[token("-")]
  Op_Minus,
  #[token("*")]
  Op_Star,
  #[token("/")]
  Op_Slash,
  #[token("%")]
  Op_Percent,
  #[token("++")]
  Op_PlusPlus,
  #[token("--")]
  Op_MinusMinus,
  #[token("<<")]
  Op_Shl,
  #[token(">>")]
  Op_Shr,
  #[token(">>>")]
  Op_UShr,
  #[token("&")]
  Op_Amp,
  #[token("|")]
  Op_Pipe,
  #[token("^")]
  Op_Caret,
  #[token("!")]
  Op_Bang,
  #[token("~")]
  Op_Tilde,
  #[token("&&")]
  Op_AmpAmp,
  #[token("||")]
  Op_PipePipe,
  #[token("==")]
  Op_EqualEqual,
  #[token("!=")]
  Op_BangEqual,
  #[token("===")]
  Op_EqualEqualEqual,
  #[token("!==")]
  Op_BangEqualEqual,
  #[token("<")]
  Op_Less,
  #[token(">")]
  Op_More,
  #[token("<=")]
  Op_LessEqual,
  #[token(">=")]
  Op_MoreEqual,

  // Literals
  #[token("true")]
  Lit_True,
  #[token("false")]
  Lit_False,
  #[token("null")]
  Lit_Null,
  /// `0`, `1.5`, `.5e10`, `0x1f`, etc.
  #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?")]
  #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
  #[regex(r"[0-9]+([eE][+-]?[0-9]+)?")]
  #[regex(r"0[xX][0-9a-fA-F]+")]
  Lit_Number,
  #[regex(r#""([^"\\]|\\[\s\S])*""#)]
  #[regex(r"'([^'\\]|\\[\s\S])*'")]
  Lit_String,
  #[regex(r"[\p{XID_Start}$_][\p{XID_Continue}$_]*")]
  Lit_Ident,
  /// Produced by `rescan_regex` only.
  Lit_Regexp,

  #[doc(hidden)]
  #[regex(r"[\n\r\u{2028}\u{2029}]+")]
  _Tok_Newline,
  #[doc(hidden)]
  #[regex(r"[ \t\x0b\x0c\u{a0}\u{feff}]+")]
  _Tok_Whitespace,
  #[doc(hidden)]
  #[regex(r"//[^\n\r]*")]
  _Tok_LineComment,
  #[doc(hidden)]
  #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
  _Tok_BlockComment,

  Tok_Error,
  Tok_Eof,
}

/// Decode a string literal's escape sequences. The returned flag is set if
/// the literal contains a legacy octal escape (an error in strict mode).
pub fn unescape(raw: &str) -> Result<(String, bool), ()> {
  debug_assert!(raw.len() >= 2);
  let body = &raw[1..raw.len() - 1];
  let mut out = String::with_capacity(body.len());
  let mut has_octal = false;
  let mut chars = body.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    let Some(esc) = chars.next() else { return Err(()) };
    match esc {
      'b' => out.push('\u{8}'),
      'f' => out.push('\u{c}'),
      'n' => out.push('\n'),
      'r' => out.push('\r'),
      't' => out.push('\t'),
      'v' => out.push('\u{b}'),
      'x' => {
        let hi = chars.next().and_then(|c| c.to_digit(16)).ok_or(())?;
        let lo = chars.next().and_then(|c| c.to_digit(16)).ok_or(())?;
        out.push(char::from_u32(hi * 16 + lo).ok_or(())?);
      }
      'u' => {
        let mut value = 0u32;
        for _ in 0..4 {
          value = value * 16 + chars.next().and_then(|c| c.to_digit(16)).ok_or(())?;
        }
        out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
      }
      '0'..='7' => {
        // \0 alone is NUL; anything else is a legacy octal escape
        let mut value = esc.to_digit(8).unwrap();
        let mut digits = 1;
        let mut rest = chars.clone();
        while digits < 3 {
          match rest.next().and_then(|c| c.to_digit(8)) {
            Some(d) if value * 8 + d <= 0xff => {
              value = value * 8 + d;
              digits += 1;
              chars = rest.clone();
            }
            _ => break,
          }
        }
        if !(esc == '0' && digits == 1) {
          has_octal = true;
        }
        out.push(char::from_u32(value).ok_or(())?);
      }
      '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
        // line continuation
        if esc == '\r' {
          let mut rest = chars.clone();
          if rest.next() == Some('\n') {
            chars = rest;
          }
        }
      }
      c => out.push(c),
    }
  }
  Ok((out, has_octal))
}

/// Decode a numeric literal. The returned flag is set for legacy
/// leading-zero forms (an error in strict mode).
pub fn parse_number(lexeme: &str) -> Result<(f64, bool), ()> {
  let bytes = lexeme.as_bytes();
  if bytes.len() > 2 && bytes[0] == b'0' && (bytes[1] | 0x20) == b'x' {
    let mut value = 0.0f64;
    for &b in &bytes[2..] {
      let digit = (b as char).to_digit(16).ok_or(())?;
      value = value * 16.0 + digit as f64;
    }
    return Ok((value, false));
  }
  if bytes.len() > 1 && bytes[0] == b'0' && bytes.iter().all(|b| b.is_ascii_digit()) {
    if bytes.iter().all(|b| (b'0'..=b'7').contains(b)) {
      let mut value = 0.0f64;
      for &b in bytes {
        value = value * 8.0 + (b - b'0') as f64;
      }
      return Ok((value, true));
    }
    // 08 and 09 fall back to decimal, still flagged for strict mode
    return lexeme.parse::<f64>().map(|v| (v, true)).map_err(|_| ());
  }
  lexeme.parse::<f64>().map(|v| (v, false)).map_err(|_| ())
}
