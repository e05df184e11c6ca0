//! The compiled-code blob and its literal pool.

pub mod builder;
pub mod disasm;
pub mod opcode;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

bitflags::bitflags! {
  /// Status flags carried from the parser to the runtime in the code-blob
  /// header.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct StatusFlags: u16 {
    const STRICT_MODE = 1 << 0;
    const FULL_LITERAL_ENCODING = 1 << 1;
    const FUNCTION = 1 << 2;
    const EVAL = 1 << 3;
    const HAS_NON_STRICT_ARG = 1 << 4;
  }
}

bitflags::bitflags! {
  /// Per-literal flags. Only identifier literals carry them.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct LiteralFlags: u8 {
    /// A formal parameter of the function.
    const ARG = 1 << 0;
    /// Declared with `var` (or hoisted by a function declaration).
    const VAR = 1 << 1;
    /// Initialized at scope entry; `init` points at the function literal.
    const INITIALIZED = 1 << 2;
  }
}

/// An interned f64. Two numbers are the same literal iff their bit patterns
/// match, which keeps NaN and negative zero distinct and hashable.
#[derive(Clone, Copy, Debug)]
pub struct Num(pub f64);

impl PartialEq for Num {
  fn eq(&self, other: &Self) -> bool {
    self.0.to_bits() == other.0.to_bits()
  }
}

impl Eq for Num {}

impl Hash for Num {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.0.to_bits().hash(state);
  }
}

impl fmt::Display for Num {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A value in the literal pool.
#[derive(Clone, Debug)]
pub enum Literal {
  Num(Num),
  Str(String),
  Ident(String),
  RegExp { pattern: String, flags: String },
  Function(Rc<CompiledCode>),
}

impl Literal {
  pub fn number(value: f64) -> Self {
    Literal::Num(Num(value))
  }

  pub fn is_ident(&self) -> bool {
    matches!(self, Literal::Ident(_))
  }
}

impl PartialEq for Literal {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Literal::Num(a), Literal::Num(b)) => a == b,
      (Literal::Str(a), Literal::Str(b)) => a == b,
      (Literal::Ident(a), Literal::Ident(b)) => a == b,
      (
        Literal::RegExp { pattern: a, flags: af },
        Literal::RegExp { pattern: b, flags: bf },
      ) => a == b && af == bf,
      // function literals are unique per compilation
      (Literal::Function(a), Literal::Function(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl Eq for Literal {}

impl Hash for Literal {
  fn hash<H: Hasher>(&self, state: &mut H) {
    core::mem::discriminant(self).hash(state);
    match self {
      Literal::Num(v) => v.hash(state),
      Literal::Str(v) | Literal::Ident(v) => v.hash(state),
      Literal::RegExp { pattern, flags } => {
        pattern.hash(state);
        flags.hash(state);
      }
      Literal::Function(v) => Rc::as_ptr(v).hash(state),
    }
  }
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Literal::Num(v) => write!(f, "{v}"),
      Literal::Str(v) => write!(f, "{v:?}"),
      Literal::Ident(v) => write!(f, "{v}"),
      Literal::RegExp { pattern, flags } => write!(f, "/{pattern}/{flags}"),
      Literal::Function(v) => {
        write!(f, "<function:{} literals, {} bytes>", v.literal_end, v.code.len())
      }
    }
  }
}

/// One slot of the literal pool.
#[derive(Clone, Debug)]
pub struct LiteralEntry {
  pub value: Literal,
  pub flags: LiteralFlags,
  /// For `VAR | INITIALIZED` idents: the pool index of the function literal
  /// bound at scope entry.
  pub init: Option<u16>,
}

/// A compiled function or program.
///
/// Emitted contiguously: the header fields, `literal_end` literal slots,
/// then `code.len()` bytes of CBC.
#[derive(Clone, Debug)]
pub struct CompiledCode {
  pub status_flags: StatusFlags,
  /// Literals `0..argument_end` are the formal parameters.
  pub argument_end: u16,
  pub register_end: u16,
  /// Literals `argument_end..ident_end` are the remaining identifiers.
  pub ident_end: u16,
  pub literal_end: u16,
  pub literals: Vec<LiteralEntry>,
  pub code: Vec<u8>,
}

impl CompiledCode {
  pub fn code_size(&self) -> usize {
    self.code.len()
  }

  pub fn is_strict(&self) -> bool {
    self.status_flags.contains(StatusFlags::STRICT_MODE)
  }

  pub fn disassemble(&self) -> String {
    disasm::Disassembly::new(self, true).to_string()
  }
}
