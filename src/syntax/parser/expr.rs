use std::collections::HashMap;

use super::*;
use crate::bytecode::builder::Instr;

enum BinOp {
  Plain(Op),
  LogicalAnd,
  LogicalOr,
}

/// ES 5.1 binary operator precedence, `||` lowest.
fn binary_op(kind: TokenKind) -> Option<(u8, BinOp)> {
  let entry = match kind {
    Op_PipePipe => (1, BinOp::LogicalOr),
    Op_AmpAmp => (2, BinOp::LogicalAnd),
    Op_Pipe => (3, BinOp::Plain(Op::BitOr)),
    Op_Caret => (4, BinOp::Plain(Op::BitXor)),
    Op_Amp => (5, BinOp::Plain(Op::BitAnd)),
    Op_EqualEqual => (6, BinOp::Plain(Op::Equal)),
    Op_BangEqual => (6, BinOp::Plain(Op::NotEqual)),
    Op_EqualEqualEqual => (6, BinOp::Plain(Op::StrictEqual)),
    Op_BangEqualEqual => (6, BinOp::Plain(Op::StrictNotEqual)),
    Op_Less => (7, BinOp::Plain(Op::Less)),
    Op_More => (7, BinOp::Plain(Op::Greater)),
    Op_LessEqual => (7, BinOp::Plain(Op::LessEqual)),
    Op_MoreEqual => (7, BinOp::Plain(Op::GreaterEqual)),
    Kw_In => (7, BinOp::Plain(Op::In)),
    Kw_InstanceOf => (7, BinOp::Plain(Op::InstanceOf)),
    Op_Shl => (8, BinOp::Plain(Op::ShiftLeft)),
    Op_Shr => (8, BinOp::Plain(Op::ShiftRight)),
    Op_UShr => (8, BinOp::Plain(Op::ShiftRightUnsigned)),
    Op_Plus => (9, BinOp::Plain(Op::Add)),
    Op_Minus => (9, BinOp::Plain(Op::Sub)),
    Op_Star => (10, BinOp::Plain(Op::Mul)),
    Op_Slash => (10, BinOp::Plain(Op::Div)),
    Op_Percent => (10, BinOp::Plain(Op::Mod)),
    _ => return None,
  };
  Some(entry)
}

fn assign_op(kind: TokenKind) -> Option<Option<Op>> {
  let op = match kind {
    Op_Equal => None,
    Op_PlusEqual => Some(Op::Add),
    Op_MinusEqual => Some(Op::Sub),
    Op_StarEqual => Some(Op::Mul),
    Op_SlashEqual => Some(Op::Div),
    Op_PercentEqual => Some(Op::Mod),
    Op_ShlEqual => Some(Op::ShiftLeft),
    Op_ShrEqual => Some(Op::ShiftRight),
    Op_UShrEqual => Some(Op::ShiftRightUnsigned),
    Op_AmpEqual => Some(Op::BitAnd),
    Op_PipeEqual => Some(Op::BitOr),
    Op_CaretEqual => Some(Op::BitXor),
    _ => return None,
  };
  Some(op)
}

/// The shape of an assignable expression, read out of the instruction
/// cache before it is committed.
enum Target {
  Ident(u32),
  PropLit(u32),
  Prop,
}

impl<'src> Parser<'src> {
  /// A full (comma) expression. Returns whether a value was left on the
  /// stack; with `needs_value` unset, a trailing assignment stores without
  /// pushing its value.
  pub(super) fn expr(&mut self, needs_value: bool) -> Result<bool> {
    let mut produced = self.assignment(needs_value)?;
    while self.bump_if(Tok_Comma) {
      if produced {
        self.emit(Op::Pop);
      }
      produced = self.assignment(needs_value)?;
    }
    Ok(produced)
  }

  /// AssignmentExpression: the target shape is resolved from the cached
  /// instruction left behind by the left-hand parse.
  pub(super) fn assignment(&mut self, needs_value: bool) -> Result<bool> {
    self.check_recursion_limit(self.current().span)?;
    self.conditional()?;

    let Some(compound) = assign_op(self.current().kind) else {
      return Ok(true);
    };
    let span = self.current().span;
    let target = match self.builder().cached() {
      Some(Instr { op: Op::PushIdent, a, .. }) => Target::Ident(*a),
      Some(Instr { op: Op::PropGetLiteral, a, .. }) => Target::PropLit(*a),
      Some(Instr { op: Op::PropGet, .. }) => Target::Prop,
      _ => return Err(self.error_at(ErrorKind::InvalidLeftHandSide, span)),
    };
    if let Target::Ident(lit) = target {
      self.check_strict_assign_target(lit, span)?;
    }
    self.bump(); // operator

    match compound {
      None => {
        let _ = self.builder().take_cached();
        let _ = self.assignment(true)?;
      }
      Some(op) => {
        match target {
          // the cached read stays as the left operand
          Target::Ident(_) => {}
          Target::PropLit(lit) => {
            let _ = self.builder().take_cached();
            self.emit_lit(Op::PropGetLiteralRef, lit);
          }
          Target::Prop => {
            let _ = self.builder().take_cached();
            self.emit(Op::PropGetRef);
          }
        }
        let _ = self.assignment(true)?;
        self.emit(op);
      }
    }

    match target {
      Target::Ident(lit) => {
        self.emit_assign(Op::AssignIdent, Op::AssignIdentPush, Some(lit), needs_value)
      }
      Target::PropLit(lit) => self.emit_assign(
        Op::AssignPropLiteral,
        Op::AssignPropLiteralPush,
        Some(lit),
        needs_value,
      ),
      Target::Prop => self.emit_assign(Op::AssignProp, Op::AssignPropPush, None, needs_value),
    }
    Ok(needs_value)
  }

  fn emit_assign(&mut self, plain: Op, push: Op, lit: Option<u32>, needs_value: bool) {
    let op = if needs_value { push } else { plain };
    match lit {
      Some(lit) => self.emit_lit(op, lit),
      None => self.emit(op),
    }
  }

  fn check_strict_assign_target(&mut self, lit: u32, span: Span) -> Result<()> {
    if !self.strict() {
      return Ok(());
    }
    if matches!(self.builder().ident_name(lit), Some("eval" | "arguments")) {
      return Err(Error::new(ErrorKind::NonStrictArg, span));
    }
    Ok(())
  }

  fn conditional(&mut self) -> Result<()> {
    self.binary(0)?;
    if self.bump_if(Tok_Question) {
      let alternate = self.builder().emit_forward_branch(Op::BranchIfFalseForward);
      let _ = self.assignment(true)?;
      self.expect(Tok_Colon, ErrorKind::ExpectedColon)?;
      let end = self.builder().emit_forward_branch(Op::JumpForward);
      self.builder().set_branch_here(alternate);
      // only one arm's value is live on either path
      self.builder().adjust_depth(-1);
      let _ = self.assignment(true)?;
      self.builder().set_branch_here(end);
    }
    Ok(())
  }

  fn binary(&mut self, min_prec: u8) -> Result<()> {
    self.unary()?;
    loop {
      let Some((prec, op)) = binary_op(self.current().kind) else {
        return Ok(());
      };
      if prec < min_prec {
        return Ok(());
      }
      self.bump();
      match op {
        BinOp::LogicalAnd => self.logical(Op::BranchIfFalseForward, prec)?,
        BinOp::LogicalOr => self.logical(Op::BranchIfTrueForward, prec)?,
        BinOp::Plain(op) => {
          self.binary(prec + 1)?;
          self.emit(op);
        }
      }
    }
  }

  /// Short-circuit: keep the left value if the branch takes, otherwise pop
  /// it and evaluate the right side.
  fn logical(&mut self, branch: Op, prec: u8) -> Result<()> {
    self.emit(Op::Dup);
    let end = self.builder().emit_forward_branch(branch);
    self.emit(Op::Pop);
    self.binary(prec + 1)?;
    self.builder().set_branch_here(end);
    Ok(())
  }

  fn unary(&mut self) -> Result<()> {
    if self.injected.is_some() {
      return self.postfix();
    }
    let span = self.current().span;
    match self.current().kind {
      Op_PlusPlus | Op_MinusMinus => {
        let decr = self.current().is(Op_MinusMinus);
        self.bump();
        self.unary()?;
        self.incr_decr(true, decr, span)
      }
      Op_Plus => self.simple_unary(Op::Plus),
      Op_Minus => self.simple_unary(Op::Neg),
      Op_Bang => self.simple_unary(Op::LogicalNot),
      Op_Tilde => self.simple_unary(Op::BitNot),
      Kw_Void => self.simple_unary(Op::Void),
      Kw_TypeOf => {
        self.bump();
        self.unary()?;
        // typeof of a bare ident must not throw on unresolved references
        if let Some(Instr { op: Op::PushIdent, a, .. }) = self.builder().cached().copied() {
          let _ = self.builder().take_cached();
          self.emit_lit(Op::TypeofIdent, a);
        } else {
          self.emit(Op::Typeof);
        }
        Ok(())
      }
      Kw_Delete => {
        self.bump();
        self.unary()?;
        match self.builder().cached().copied() {
          Some(Instr { op: Op::PushIdent, a, .. }) => {
            if self.strict() {
              return Err(self.error_at(ErrorKind::StrictDelete, span));
            }
            let _ = self.builder().take_cached();
            self.emit_lit(Op::DeleteIdent, a);
          }
          Some(Instr { op: Op::PropGetLiteral, a, .. }) => {
            let _ = self.builder().take_cached();
            self.emit_lit(Op::PushLiteral, a);
            self.emit(Op::DeleteProp);
          }
          Some(Instr { op: Op::PropGet, .. }) => {
            let _ = self.builder().take_cached();
            self.emit(Op::DeleteProp);
          }
          _ => {
            // deleting a non-reference yields true
            self.emit(Op::Pop);
            self.emit(Op::PushTrue);
          }
        }
        Ok(())
      }
      _ => self.postfix(),
    }
  }

  fn simple_unary(&mut self, op: Op) -> Result<()> {
    self.bump();
    self.unary()?;
    self.emit(op);
    Ok(())
  }

  fn incr_decr(&mut self, pre: bool, decr: bool, span: Span) -> Result<()> {
    match self.builder().cached().copied() {
      Some(Instr { op: Op::PushIdent, a, .. }) => {
        self.check_strict_assign_target(a, span)?;
        let _ = self.builder().take_cached();
        let op = match (pre, decr) {
          (true, false) => Op::PreIncrIdent,
          (true, true) => Op::PreDecrIdent,
          (false, false) => Op::PostIncrIdent,
          (false, true) => Op::PostDecrIdent,
        };
        self.emit_lit(op, a);
      }
      Some(Instr { op: Op::PropGetLiteral, a, .. }) => {
        let _ = self.builder().take_cached();
        self.emit_lit(Op::PushLiteral, a);
        self.prop_incr_decr(pre, decr);
      }
      Some(Instr { op: Op::PropGet, .. }) => {
        let _ = self.builder().take_cached();
        self.prop_incr_decr(pre, decr);
      }
      _ => return Err(self.error_at(ErrorKind::InvalidLeftHandSide, span)),
    }
    Ok(())
  }

  fn prop_incr_decr(&mut self, pre: bool, decr: bool) {
    let op = match (pre, decr) {
      (true, false) => Op::PreIncrProp,
      (true, true) => Op::PreDecrProp,
      (false, false) => Op::PostIncrProp,
      (false, true) => Op::PostDecrProp,
    };
    self.emit(op);
  }

  fn postfix(&mut self) -> Result<()> {
    self.lhs()?;
    let current = self.current();
    if (current.is(Op_PlusPlus) || current.is(Op_MinusMinus)) && !current.nl {
      let span = current.span;
      let decr = current.is(Op_MinusMinus);
      self.bump();
      self.incr_decr(false, decr, span)?;
    }
    Ok(())
  }

  fn lhs(&mut self) -> Result<()> {
    if self.injected.is_none() && self.current().is(Kw_New) {
      self.new_expr()?;
    } else {
      self.primary()?;
    }
    self.call_member_tail()
  }

  fn new_expr(&mut self) -> Result<()> {
    self.bump(); // new
    if self.current().is(Kw_New) {
      self.new_expr()?;
    } else {
      self.primary()?;
      self.member_tail()?;
    }
    let argc = if self.current().is(Brk_ParenL) {
      self.call_args()?
    } else {
      0
    };
    self.emit_byte(Op::New, argc);
    Ok(())
  }

  /// Member accesses only; used under `new`, where an argument list binds
  /// to the constructor instead of being a call.
  fn member_tail(&mut self) -> Result<()> {
    loop {
      if self.bump_if(Op_Dot) {
        let name = self.property_ident()?;
        let lit = self.str_lit(name);
        self.emit_lit(Op::PropGetLiteral, lit);
      } else if self.bump_if(Brk_SquareL) {
        let _ = self.expr(true)?;
        self.expect(Brk_SquareR, ErrorKind::ExpectedRightBracket)?;
        self.emit(Op::PropGet);
      } else {
        return Ok(());
      }
    }
  }

  fn call_member_tail(&mut self) -> Result<()> {
    loop {
      if self.bump_if(Op_Dot) {
        let name = self.property_ident()?;
        let lit = self.str_lit(name);
        self.emit_lit(Op::PropGetLiteral, lit);
      } else if self.bump_if(Brk_SquareL) {
        let _ = self.expr(true)?;
        self.expect(Brk_SquareR, ErrorKind::ExpectedRightBracket)?;
        self.emit(Op::PropGet);
      } else if self.current().is(Brk_ParenL) {
        // a pending property read turns into a this-binding call
        match self.builder().cached().copied() {
          Some(Instr { op: Op::PropGetLiteral, a, .. }) => {
            let _ = self.builder().take_cached();
            self.emit_lit(Op::PushLiteral, a);
            let argc = self.call_args()?;
            self.emit_byte(Op::CallProp, argc);
          }
          Some(Instr { op: Op::PropGet, .. }) => {
            let _ = self.builder().take_cached();
            let argc = self.call_args()?;
            self.emit_byte(Op::CallProp, argc);
          }
          _ => {
            let argc = self.call_args()?;
            self.emit_byte(Op::Call, argc);
          }
        }
      } else {
        return Ok(());
      }
    }
  }

  fn call_args(&mut self) -> Result<u8> {
    let span = self.current().span;
    self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
    let mut argc = 0usize;
    if !self.current().is(Brk_ParenR) {
      loop {
        let _ = self.assignment(true)?;
        argc += 1;
        if !self.bump_if(Tok_Comma) {
          break;
        }
      }
    }
    self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
    if argc > u8::MAX as usize {
      return Err(self.error_at(ErrorKind::ArgumentLimit, span));
    }
    Ok(argc as u8)
  }

  fn primary(&mut self) -> Result<()> {
    if let Some(token) = self.injected.take() {
      let lit = self.string_literal(&token)?;
      self.emit_lit(Op::PushLiteral, lit);
      return Ok(());
    }
    self.check_recursion_limit(self.current().span)?;

    match self.current().kind {
      Lit_Ident => {
        let name = self.reference_ident()?;
        let lit = self.ident_lit(name);
        self.emit_lit(Op::PushIdent, lit);
      }
      Kw_This => {
        self.bump();
        self.emit(Op::PushThis);
      }
      Lit_True => {
        self.bump();
        self.emit(Op::PushTrue);
      }
      Lit_False => {
        self.bump();
        self.emit(Op::PushFalse);
      }
      Lit_Null => {
        self.bump();
        self.emit(Op::PushNull);
      }
      Lit_Number => {
        let token = self.current().clone();
        let (value, octal) = lexer::parse_number(self.lex.lexeme(&token))
          .map_err(|_| self.error_at(ErrorKind::InvalidToken, token.span))?;
        if octal && self.strict() {
          return Err(self.error_at(ErrorKind::StrictOctal, token.span));
        }
        self.bump();
        let lit = self.num_lit(value);
        self.emit_lit(Op::PushLiteral, lit);
      }
      Lit_String => {
        let token = self.current().clone();
        self.bump();
        let lit = self.string_literal(&token)?;
        self.emit_lit(Op::PushLiteral, lit);
      }
      Op_Slash | Op_SlashEqual => {
        self.lex.rescan_regex()?;
        let token = self.current().clone();
        let (pattern, flags) = self.lex.regex_parts(&token);
        let mut seen = 0u8;
        for flag in flags.chars() {
          let bit = match flag {
            'i' => 1,
            'g' => 2,
            'm' => 4,
            _ => return Err(self.error_at(ErrorKind::InvalidRegExp, token.span)),
          };
          if seen & bit != 0 {
            return Err(self.error_at(ErrorKind::InvalidRegExp, token.span));
          }
          seen |= bit;
        }
        self.bump();
        let lit = self.builder().literal(Literal::RegExp {
          pattern: pattern.into(),
          flags: flags.into(),
        });
        self.emit_lit(Op::PushLiteral, lit);
      }
      Brk_ParenL => {
        // the cache survives grouping, so `(a) = 1` assigns
        self.bump();
        let _ = self.expr(true)?;
        self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
      }
      Brk_SquareL => self.array_literal()?,
      Brk_CurlyL => self.object_literal()?,
      Kw_Function => {
        self.bump();
        let (_, lit) = self.parse_function(false)?;
        self.emit_lit(Op::PushLiteral, lit);
      }
      Tok_Eof => return Err(self.error(ErrorKind::UnexpectedEnd)),
      Tok_Error => return Err(self.error(ErrorKind::InvalidToken)),
      _ => return Err(self.error(ErrorKind::InvalidExpression)),
    }
    Ok(())
  }

  fn array_literal(&mut self) -> Result<()> {
    self.bump(); // [
    self.emit(Op::CreateArray);
    let mut pending: u8 = 0;
    loop {
      if self.bump_if(Brk_SquareR) {
        break;
      }
      if self.current().is(Tok_Comma) {
        // elision
        self.bump();
        self.emit(Op::PushUndefined);
        pending += 1;
      } else {
        let _ = self.assignment(true)?;
        pending += 1;
        if !self.bump_if(Tok_Comma) {
          self.expect(Brk_SquareR, ErrorKind::ExpectedRightBracket)?;
          break;
        }
      }
      if pending == 64 {
        self.emit_byte(Op::ArrayAppend, pending);
        pending = 0;
      }
    }
    if pending > 0 {
      self.emit_byte(Op::ArrayAppend, pending);
    }
    Ok(())
  }

  fn object_literal(&mut self) -> Result<()> {
    const DATA: u8 = 1;
    const GET: u8 = 2;
    const SET: u8 = 4;

    self.bump(); // {
    self.emit(Op::CreateObject);
    let mut seen: HashMap<String, u8> = HashMap::new();
    loop {
      if self.bump_if(Brk_CurlyR) {
        break;
      }

      let accessor = if self.current().is(Lit_Ident) {
        let lexeme = self.lex.lexeme(self.current());
        let is_accessor = (lexeme == "get" || lexeme == "set")
          && is_property_name_token(self.lex.peek().kind);
        is_accessor.then(|| lexeme == "get")
      } else {
        None
      };

      if let Some(is_get) = accessor {
        self.bump(); // get / set
        let (name, span) = self.property_name()?;
        let lit = self.str_lit(&name);
        let function = self.parse_function(false)?.1;

        let argc = match self.builder().literal_at(function) {
          Some(Literal::Function(code)) => code.argument_end,
          _ => unreachable!(),
        };
        if (is_get && argc != 0) || (!is_get && argc != 1) {
          return Err(self.error_at(ErrorKind::InvalidExpression, span));
        }

        let mask = seen.entry(name).or_insert(0);
        let bit = if is_get { GET } else { SET };
        if *mask & (DATA | bit) != 0 {
          return Err(self.error_at(ErrorKind::DuplicateProperty, span));
        }
        *mask |= bit;

        self.emit_lit(Op::PushLiteral, function);
        self.emit_lit(if is_get { Op::SetGetter } else { Op::SetSetter }, lit);
      } else {
        let (name, span) = self.property_name()?;
        let lit = self.str_lit(&name);
        self.expect(Tok_Colon, ErrorKind::ExpectedColon)?;
        let _ = self.assignment(true)?;

        let strict = self.strict();
        let mask = seen.entry(name).or_insert(0);
        if *mask & (GET | SET) != 0 || (*mask & DATA != 0 && strict) {
          return Err(self.error_at(ErrorKind::DuplicateProperty, span));
        }
        *mask |= DATA;

        self.emit_lit(Op::SetPropertyLiteral, lit);
      }

      if !self.bump_if(Tok_Comma) {
        self.expect(Brk_CurlyR, ErrorKind::ExpectedRightBrace)?;
        break;
      }
    }
    Ok(())
  }

  /// PropertyName: IdentifierName, string or number; numbers canonicalize
  /// to their string form.
  fn property_name(&mut self) -> Result<(String, Span)> {
    let token = self.current().clone();
    let name = match token.kind {
      Lit_String => {
        let raw = self.lex.lexeme(&token);
        let (value, octal) =
          lexer::unescape(raw).map_err(|_| self.error_at(ErrorKind::InvalidToken, token.span))?;
        if octal && self.strict() {
          return Err(self.error_at(ErrorKind::StrictOctal, token.span));
        }
        value
      }
      Lit_Number => {
        let (value, octal) = lexer::parse_number(self.lex.lexeme(&token))
          .map_err(|_| self.error_at(ErrorKind::InvalidToken, token.span))?;
        if octal && self.strict() {
          return Err(self.error_at(ErrorKind::StrictOctal, token.span));
        }
        number_to_string(value)
      }
      kind if kind == Lit_Ident || is_keyword_token(kind) => self.lex.lexeme(&token).to_string(),
      _ => return Err(self.error(ErrorKind::UnexpectedToken)),
    };
    self.bump();
    Ok((name, token.span))
  }

  /// The enumeration target of a for-in; the shape resolution mirrors
  /// assignment, with an undefined base reference for non-assignable
  /// targets so the first iteration throws at runtime.
  pub(super) fn for_in_target(&mut self) -> Result<()> {
    let span = self.current().span;
    self.lhs()?;
    match self.builder().cached().copied() {
      Some(Instr { op: Op::PushIdent, a, .. }) => {
        self.check_strict_assign_target(a, span)?;
        let _ = self.builder().take_cached();
        self.emit(Op::ForInGetNext);
        self.emit_lit(Op::AssignIdent, a);
      }
      Some(Instr { op: Op::PropGetLiteral, a, .. }) => {
        let _ = self.builder().take_cached();
        self.emit_lit(Op::PushLiteral, a);
        self.emit(Op::ForInGetNext);
        self.emit(Op::AssignProp);
      }
      Some(Instr { op: Op::PropGet, .. }) => {
        let _ = self.builder().take_cached();
        self.emit(Op::ForInGetNext);
        self.emit(Op::AssignProp);
      }
      _ => {
        self.emit(Op::Pop);
        self.emit(Op::PushUndefinedBase);
        self.emit(Op::ForInGetNext);
        self.emit(Op::AssignProp);
      }
    }
    Ok(())
  }
}

fn is_property_name_token(kind: TokenKind) -> bool {
  matches!(kind, Lit_Ident | Lit_String | Lit_Number) || is_keyword_token(kind)
}

fn number_to_string(value: f64) -> String {
  if value.fract() == 0.0 && value.abs() <= 9e15 {
    format!("{}", value as i64)
  } else {
    format!("{value}")
  }
}
