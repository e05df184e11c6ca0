//! A compact, embeddable ECMAScript 5.1 front end: a single-pass parser
//! and bytecode emitter producing a compact stack-oriented bytecode (CBC).
//!
//! Source text goes in, a [`CompiledCode`] blob comes out: a small header,
//! a dense literal pool, and the raw opcode stream. There is no AST; the
//! statement parser drives the emitter directly, with a targeted
//! pre-scanner supplying the lookahead for loop heads and switch bodies.
//!
//! ```
//! let code = kumo::compile("var x = 1 + 2;", kumo::Options::global()).unwrap();
//! assert_eq!(code.literal_end, 3);
//! print!("{}", code.disassemble());
//! ```

pub mod bytecode;
mod error;
mod span;
pub mod syntax;

pub use bytecode::disasm::Disassembly;
pub use bytecode::{CompiledCode, Literal, LiteralEntry, LiteralFlags, StatusFlags};
pub use error::{Error, ErrorKind, Result};
pub use span::Span;
pub use syntax::{Options, ScopeKind};

/// Compile a source buffer into bytecode.
pub fn compile(src: &str, options: Options) -> Result<CompiledCode> {
  syntax::compile(src, options)
}
