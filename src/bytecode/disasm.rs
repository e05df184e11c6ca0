use std::fmt::{self, Display};

use super::builder::decode_instr;
use super::opcode::{Op, OperandKind};
use super::{CompiledCode, StatusFlags};

/// Renders a compiled blob one instruction per line:
///
/// ```text
///   0 | push_ident 0 ; x
///   3 | branch_if_false_forward +12
/// ```
pub struct Disassembly<'a> {
  code: &'a CompiledCode,
  offsets: bool,
}

impl<'a> Disassembly<'a> {
  pub fn new(code: &'a CompiledCode, offsets: bool) -> Self {
    Self { code, offsets }
  }
}

impl<'a> Display for Disassembly<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let full = self
      .code
      .status_flags
      .contains(StatusFlags::FULL_LITERAL_ENCODING);
    let mut pos = 0;
    while pos < self.code.code.len() {
      let Some((op, _, a, b, size)) = decode_instr(&self.code.code, pos, full) else {
        return Err(fmt::Error);
      };
      if self.offsets {
        write!(f, "{pos:>4} | {}", op.name())?;
      } else {
        write!(f, "{}", op.name())?;
      }
      match op.info().operands {
        OperandKind::None => {}
        OperandKind::Byte => write!(f, " {a}")?,
        OperandKind::Lit => {
          write!(f, " {a}")?;
          if let Some(entry) = self.code.literals.get(a as usize) {
            write!(f, " ; {}", entry.value)?;
          }
        }
        OperandKind::BranchFwd => write!(f, " +{a}")?,
        OperandKind::BranchBack => write!(f, " -{a}")?,
        OperandKind::ByteBranchFwd => write!(f, " {b} +{a}")?,
      }
      writeln!(f)?;
      pos += size;
    }
    Ok(())
  }
}

/// Walk a blob and check its structural invariants: every instruction
/// decodes, every literal operand is in range, and every branch displacement
/// lands on an instruction boundary inside the code.
pub fn validate(code: &CompiledCode) -> Result<(), String> {
  let full = code
    .status_flags
    .contains(StatusFlags::FULL_LITERAL_ENCODING);
  let bytes = &code.code;

  let mut starts = vec![false; bytes.len() + 1];
  let mut pos = 0;
  while pos < bytes.len() {
    starts[pos] = true;
    let Some((op, _, a, _, size)) = decode_instr(bytes, pos, full) else {
      return Err(format!("undecodable instruction at {pos}"));
    };
    if let OperandKind::Lit = op.info().operands {
      if a >= code.literal_end as u32 {
        return Err(format!("literal index {a} out of range at {pos}"));
      }
    }
    pos += size;
  }
  if pos != bytes.len() {
    return Err("trailing bytes after last instruction".into());
  }
  starts[bytes.len()] = true;

  pos = 0;
  while pos < bytes.len() {
    let (op, _, a, _, size) = decode_instr(bytes, pos, full).unwrap();
    match op.info().operands {
      OperandKind::BranchFwd | OperandKind::ByteBranchFwd => {
        let target = pos as u32 + a;
        if a == 0 || target as usize > bytes.len() || !starts[target as usize] {
          return Err(format!("bad forward branch at {pos} (+{a})"));
        }
      }
      OperandKind::BranchBack => {
        let Some(target) = (pos as u32).checked_sub(a) else {
          return Err(format!("bad backward branch at {pos} (-{a})"));
        };
        if !starts[target as usize] {
          return Err(format!("backward branch at {pos} misses boundary (-{a})"));
        }
      }
      _ => {}
    }
    pos += size;
  }

  for (i, entry) in code.literals.iter().enumerate() {
    if let Some(init) = entry.init {
      if init >= code.literal_end {
        return Err(format!("literal {i} init link {init} out of range"));
      }
    }
  }

  Ok(())
}

/// Collect the opcode names of a blob in emission order. Test helper.
pub fn opcode_names(code: &CompiledCode) -> Vec<&'static str> {
  let full = code
    .status_flags
    .contains(StatusFlags::FULL_LITERAL_ENCODING);
  let mut names = Vec::new();
  let mut pos = 0;
  while pos < code.code.len() {
    let (op, _, _, _, size) = decode_instr(&code.code, pos, full).expect("undecodable blob");
    names.push(op.name());
    pos += size;
  }
  names
}

/// Like [`opcode_names`], but paired with the decoded primary operand.
pub fn opcodes(code: &CompiledCode) -> Vec<(Op, u32)> {
  let full = code
    .status_flags
    .contains(StatusFlags::FULL_LITERAL_ENCODING);
  let mut out = Vec::new();
  let mut pos = 0;
  while pos < code.code.len() {
    let (op, _, a, _, size) = decode_instr(&code.code, pos, full).expect("undecodable blob");
    out.push((op, a));
    pos += size;
  }
  out
}
