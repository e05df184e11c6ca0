pub mod lexer;
mod parser;
pub mod scanner;

use crate::bytecode::CompiledCode;
use crate::error::Result;

/// What kind of code a source buffer is compiled as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScopeKind {
  #[default]
  Global,
  Eval,
  Function,
}

/// Compilation options.
///
/// ```
/// let options = kumo::Options::eval().strict(true);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
  pub(crate) kind: ScopeKind,
  pub(crate) strict: bool,
}

impl Options {
  pub fn global() -> Self {
    Self {
      kind: ScopeKind::Global,
      ..Default::default()
    }
  }

  pub fn eval() -> Self {
    Self {
      kind: ScopeKind::Eval,
      ..Default::default()
    }
  }

  pub fn function() -> Self {
    Self {
      kind: ScopeKind::Function,
      ..Default::default()
    }
  }

  /// Compile as if the enclosing code were strict; eval code inherits the
  /// caller's strictness this way.
  pub fn strict(mut self, strict: bool) -> Self {
    self.strict = strict;
    self
  }
}

/// Compile a source buffer into a [`CompiledCode`] blob.
pub fn compile(src: &str, options: Options) -> Result<CompiledCode> {
  parser::parse(src, options)
}
