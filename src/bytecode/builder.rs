use indexmap::IndexMap;

use super::opcode::{
  decode_base, decode_ext, Op, OperandKind, EXT_PREFIX, FULL_LITERAL_DELTA, FULL_LITERAL_LIMIT,
  SMALL_LITERAL_DELTA, SMALL_LITERAL_LIMIT, SMALL_LITERAL_MAX,
};
use super::{CompiledCode, Literal, LiteralEntry, LiteralFlags, StatusFlags};

/// Operand value of a forward branch that has not been patched yet.
pub const UNPATCHED: u32 = u32::MAX;

/// A symbolic instruction: an opcode with its pending operands.
///
/// For literal opcodes `a` is the pool index, for byte opcodes the
/// immediate. Branch opcodes keep the target instruction index in `a`;
/// `JumpForwardExitContext` carries its context count in `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instr {
  pub op: Op,
  pub a: u32,
  pub b: u32,
}

impl Instr {
  fn new(op: Op, a: u32, b: u32) -> Self {
    Self { op, a, b }
  }
}

/// Handle to a pending forward branch. Consumed by
/// [`BytecodeBuilder::set_branch_here`].
#[derive(Debug)]
pub struct Branch {
  index: usize,
}

/// Outcome of inspecting the cached instruction at a loop tail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fold {
  /// Condition is constant-true; the push was elided.
  True,
  /// Condition is constant-false; the push was elided.
  False,
  /// Condition ended in a logical not; the not was elided.
  Inverted,
  None,
}

#[derive(Clone, Copy, Debug, Default)]
struct LiteralInfo {
  flags: LiteralFlags,
  init: Option<u32>,
}

/// Builds one function's bytecode.
///
/// Instructions are held symbolically; the most recent one stays in a
/// one-instruction cache so the parser can merge or elide it before it
/// becomes observable. `finish` runs the final encoding pass.
pub struct BytecodeBuilder {
  code: Vec<Instr>,
  cache: Option<Instr>,
  literals: IndexMap<Literal, LiteralInfo>,
  unbound_jumps: usize,
  depth: i32,
}

impl BytecodeBuilder {
  pub fn new() -> Self {
    Self {
      code: Vec::new(),
      cache: None,
      literals: IndexMap::new(),
      unbound_jumps: 0,
      depth: 0,
    }
  }

  fn effect(&self, instr: &Instr) -> i32 {
    let info = instr.op.info();
    let mut pops = info.pops as i32;
    if info.argc {
      pops += instr.a as i32;
    }
    info.pushes as i32 - pops
  }

  fn flush(&mut self) {
    if let Some(instr) = self.cache.take() {
      self.code.push(instr);
    }
  }

  fn push_instr(&mut self, instr: Instr) {
    self.flush();
    self.depth += self.effect(&instr);
    debug_assert!(self.depth >= 0, "stack underflow emitting {:?}", instr.op);
    self.cache = Some(instr);
  }

  pub fn emit(&mut self, op: Op) {
    debug_assert!(matches!(op.info().operands, OperandKind::None));
    self.push_instr(Instr::new(op, 0, 0));
  }

  pub fn emit_lit(&mut self, op: Op, lit: u32) {
    debug_assert!(matches!(op.info().operands, OperandKind::Lit));
    self.push_instr(Instr::new(op, lit, 0));
  }

  pub fn emit_byte(&mut self, op: Op, value: u8) {
    debug_assert!(matches!(op.info().operands, OperandKind::Byte));
    self.push_instr(Instr::new(op, value as u32, 0));
  }

  /// The cached instruction, if any. This is the only instruction that can
  /// still be merged or elided.
  pub fn cached(&self) -> Option<&Instr> {
    self.cache.as_ref()
  }

  /// Remove the cached instruction, reverting its stack effect.
  pub fn take_cached(&mut self) -> Option<Instr> {
    let instr = self.cache.take()?;
    self.depth -= self.effect(&instr);
    Some(instr)
  }

  /// Inspect the cached instruction for the loop-tail condition folds.
  pub fn fold_condition(&mut self) -> Fold {
    let fold = match self.cache {
      Some(Instr { op: Op::PushTrue, .. }) => Fold::True,
      Some(Instr {
        op: Op::PushFalse | Op::PushNull | Op::PushUndefined,
        ..
      }) => Fold::False,
      Some(Instr { op: Op::LogicalNot, .. }) => Fold::Inverted,
      Some(Instr { op: Op::PushLiteral, a, .. }) => match self.literal_at(a) {
        Some(Literal::Num(n)) => {
          if n.0 != 0.0 && !n.0.is_nan() {
            Fold::True
          } else {
            Fold::False
          }
        }
        _ => Fold::None,
      },
      _ => Fold::None,
    };
    if fold != Fold::None {
      self.take_cached();
    }
    fold
  }

  /// Emit a forward branch with a placeholder operand; patch it later with
  /// [`set_branch_here`](Self::set_branch_here).
  pub fn emit_forward_branch(&mut self, op: Op) -> Branch {
    self.emit_forward_branch_exit(op, 0)
  }

  pub fn emit_forward_branch_exit(&mut self, op: Op, contexts: u8) -> Branch {
    debug_assert!(op.info().is_forward());
    self.flush();
    let instr = Instr::new(op, UNPATCHED, contexts as u32);
    self.depth += self.effect(&instr);
    debug_assert!(self.depth >= 0);
    self.code.push(instr);
    self.unbound_jumps += 1;
    Branch {
      index: self.code.len() - 1,
    }
  }

  /// Patch a pending forward branch to the current position.
  pub fn set_branch_here(&mut self, branch: Branch) {
    self.flush();
    let target = self.code.len() as u32;
    let instr = &mut self.code[branch.index];
    assert!(instr.a == UNPATCHED, "branch patched twice");
    instr.a = target;
    self.unbound_jumps -= 1;
  }

  /// Emit a backward branch to a position previously captured with
  /// [`position`](Self::position).
  pub fn emit_backward_branch(&mut self, op: Op, target: usize) {
    debug_assert!(matches!(op.info().operands, OperandKind::BranchBack));
    debug_assert!(target <= self.code.len());
    self.flush();
    let instr = Instr::new(op, target as u32, 0);
    self.depth += self.effect(&instr);
    debug_assert!(self.depth >= 0);
    self.code.push(instr);
  }

  /// The current emission position, usable as a backward-branch target.
  pub fn position(&mut self) -> usize {
    self.flush();
    self.code.len()
  }

  pub fn adjust_depth(&mut self, delta: i32) {
    self.depth += delta;
    debug_assert!(self.depth >= 0);
  }

  pub fn depth(&self) -> i32 {
    self.depth
  }

  pub fn unbound_jumps(&self) -> usize {
    self.unbound_jumps
  }

  /// Intern a literal and return its (pre-reorder) pool index.
  pub fn literal(&mut self, value: Literal) -> u32 {
    if let Some(index) = self.literals.get_index_of(&value) {
      return index as u32;
    }
    let index = self.literals.len();
    self.literals.insert(value, LiteralInfo::default());
    index as u32
  }

  pub fn mark(&mut self, index: u32, flags: LiteralFlags) {
    let (_, info) = self.literals.get_index_mut(index as usize).unwrap();
    info.flags |= flags;
  }

  pub fn has_flags(&self, index: u32, flags: LiteralFlags) -> bool {
    self
      .literals
      .get_index(index as usize)
      .map(|(_, info)| info.flags.contains(flags))
      .unwrap_or(false)
  }

  /// Link a `VAR | INITIALIZED` ident to its function literal.
  pub fn set_init(&mut self, ident: u32, function: u32) {
    let (_, info) = self.literals.get_index_mut(ident as usize).unwrap();
    info.init = Some(function);
  }

  pub fn literal_at(&self, index: u32) -> Option<&Literal> {
    self.literals.get_index(index as usize).map(|(lit, _)| lit)
  }

  pub fn ident_name(&self, index: u32) -> Option<&str> {
    match self.literal_at(index) {
      Some(Literal::Ident(name)) => Some(name),
      _ => None,
    }
  }

  /// Finalize: reorder the literal pool (arguments, idents, values), pick
  /// the literal encoding, assign branch widths and serialize.
  pub fn finish(mut self, mut status: StatusFlags) -> CompiledCode {
    self.flush();
    assert!(self.unbound_jumps == 0, "unpatched forward branch at finish");

    let count = self.literals.len();
    let mut order: Vec<usize> = Vec::with_capacity(count);
    for (i, (_, info)) in self.literals.iter().enumerate() {
      if info.flags.contains(LiteralFlags::ARG) {
        order.push(i);
      }
    }
    let argument_end = order.len() as u16;
    for (i, (value, info)) in self.literals.iter().enumerate() {
      if value.is_ident() && !info.flags.contains(LiteralFlags::ARG) {
        order.push(i);
      }
    }
    let ident_end = order.len() as u16;
    for (i, (value, _)) in self.literals.iter().enumerate() {
      if !value.is_ident() {
        order.push(i);
      }
    }
    let literal_end = order.len() as u16;
    debug_assert_eq!(order.len(), count);

    let mut remap = vec![0u32; count];
    for (new, &old) in order.iter().enumerate() {
      remap[old] = new as u32;
    }

    if literal_end as u32 > SMALL_LITERAL_MAX as u32 + 1 {
      status |= StatusFlags::FULL_LITERAL_ENCODING;
    }
    let full = status.contains(StatusFlags::FULL_LITERAL_ENCODING);
    assert!((literal_end as u32) <= FULL_LITERAL_DELTA as u32, "too many literals");

    // branch widths start minimal and only ever grow
    let mut widths: Vec<u8> = self
      .code
      .iter()
      .map(|i| u8::from(i.op.info().is_branch()))
      .collect();
    let offsets = loop {
      let mut offsets = Vec::with_capacity(self.code.len() + 1);
      let mut pos = 0u32;
      for (i, instr) in self.code.iter().enumerate() {
        offsets.push(pos);
        pos += instr_size(instr, widths[i], full, &remap);
      }
      offsets.push(pos);

      let mut changed = false;
      for (i, instr) in self.code.iter().enumerate() {
        let info = instr.op.info();
        if !info.is_branch() {
          continue;
        }
        let disp = displacement(&offsets, i, instr.a as usize, info.is_forward());
        let need = width_for(disp);
        assert!(need <= 3, "branch displacement too large");
        if need > widths[i] {
          widths[i] = need;
          changed = true;
        }
      }
      if !changed {
        break offsets;
      }
    };

    let mut bytes = Vec::with_capacity(*offsets.last().unwrap() as usize);
    for (i, instr) in self.code.iter().enumerate() {
      let info = instr.op.info();
      if info.ext {
        bytes.push(EXT_PREFIX);
      }
      let width = if info.is_branch() { widths[i] } else { 1 };
      bytes.push(instr.op.wire(width));
      match info.operands {
        OperandKind::None => {}
        OperandKind::Byte => bytes.push(instr.a as u8),
        OperandKind::Lit => encode_literal(&mut bytes, remap[instr.a as usize] as u16, full),
        OperandKind::BranchFwd | OperandKind::BranchBack => {
          let disp = displacement(&offsets, i, instr.a as usize, info.is_forward());
          push_displacement(&mut bytes, disp, width);
        }
        OperandKind::ByteBranchFwd => {
          bytes.push(instr.b as u8);
          let disp = displacement(&offsets, i, instr.a as usize, true);
          push_displacement(&mut bytes, disp, width);
        }
      }
    }
    debug_assert_eq!(bytes.len() as u32, *offsets.last().unwrap());

    let mut literals = Vec::with_capacity(count);
    for &old in order.iter() {
      let (value, info) = self.literals.get_index(old).unwrap();
      literals.push(LiteralEntry {
        value: value.clone(),
        flags: info.flags,
        init: info.init.map(|i| remap[i as usize] as u16),
      });
    }

    CompiledCode {
      status_flags: status,
      argument_end,
      register_end: argument_end,
      ident_end,
      literal_end,
      literals,
      code: bytes,
    }
  }
}

impl Default for BytecodeBuilder {
  fn default() -> Self {
    Self::new()
  }
}

fn displacement(offsets: &[u32], from: usize, to: usize, forward: bool) -> u32 {
  if forward {
    debug_assert!(to > from, "forward branch must move forward");
    offsets[to] - offsets[from]
  } else {
    debug_assert!(to <= from);
    offsets[from] - offsets[to]
  }
}

fn width_for(disp: u32) -> u8 {
  if disp <= 0xff {
    1
  } else if disp <= 0xffff {
    2
  } else if disp <= 0xff_ffff {
    3
  } else {
    4
  }
}

fn instr_size(instr: &Instr, width: u8, full: bool, remap: &[u32]) -> u32 {
  let info = instr.op.info();
  let opcode = 1 + u32::from(info.ext);
  let operands = match info.operands {
    OperandKind::None => 0,
    OperandKind::Byte => 1,
    OperandKind::Lit => literal_width(remap[instr.a as usize] as u16, full),
    OperandKind::BranchFwd | OperandKind::BranchBack => width as u32,
    OperandKind::ByteBranchFwd => 1 + width as u32,
  };
  opcode + operands
}

pub(crate) fn literal_limits(full: bool) -> (u16, u16) {
  if full {
    (FULL_LITERAL_LIMIT, FULL_LITERAL_DELTA)
  } else {
    (SMALL_LITERAL_LIMIT, SMALL_LITERAL_DELTA)
  }
}

fn literal_width(index: u16, full: bool) -> u32 {
  let (limit, _) = literal_limits(full);
  if index < limit {
    1
  } else {
    2
  }
}

pub(crate) fn encode_literal(buf: &mut Vec<u8>, index: u16, full: bool) {
  let (limit, delta) = literal_limits(full);
  if index < limit {
    buf.push(index as u8);
  } else {
    let value = index + delta;
    buf.push((value >> 8) as u8);
    buf.push((value & 0xff) as u8);
  }
}

/// Decode a literal operand; returns `(index, bytes consumed)`.
pub(crate) fn decode_literal(buf: &[u8], full: bool) -> Option<(u16, usize)> {
  let (limit, delta) = literal_limits(full);
  let first = *buf.first()? as u16;
  if first < limit {
    Some((first, 1))
  } else {
    let second = *buf.get(1)? as u16;
    let value = (first << 8) | second;
    Some((value.checked_sub(delta)?, 2))
  }
}

fn push_displacement(buf: &mut Vec<u8>, disp: u32, width: u8) {
  for k in (0..width).rev() {
    buf.push((disp >> (8 * k)) as u8);
  }
}

/// Decode one instruction at `pos`; returns the symbolic parts and size.
/// Branch operands come back as raw displacements in `a`.
pub(crate) fn decode_instr(code: &[u8], pos: usize, full: bool) -> Option<(Op, u8, u32, u32, usize)> {
  let mut at = pos;
  let byte = *code.get(at)?;
  at += 1;
  let (op, width) = if byte == EXT_PREFIX {
    let ext = *code.get(at)?;
    at += 1;
    decode_ext(ext)?
  } else {
    decode_base(byte)?
  };
  let info = op.info();
  let (a, b) = match info.operands {
    OperandKind::None => (0, 0),
    OperandKind::Byte => {
      let v = *code.get(at)? as u32;
      at += 1;
      (v, 0)
    }
    OperandKind::Lit => {
      let (index, used) = decode_literal(code.get(at..)?, full)?;
      at += used;
      (index as u32, 0)
    }
    OperandKind::BranchFwd | OperandKind::BranchBack => {
      let mut disp = 0u32;
      for _ in 0..width {
        disp = (disp << 8) | *code.get(at)? as u32;
        at += 1;
      }
      (disp, 0)
    }
    OperandKind::ByteBranchFwd => {
      let count = *code.get(at)? as u32;
      at += 1;
      let mut disp = 0u32;
      for _ in 0..width {
        disp = (disp << 8) | *code.get(at)? as u32;
        at += 1;
      }
      (disp, count)
    }
  };
  Some((op, width, a, b, at - pos))
}
