use super::*;

impl<'src> Parser<'src> {
  /// The main statement loop. Runs until the end of the input (global and
  /// eval scopes) or the `}` closing the current function body.
  ///
  /// Statement nesting is not recursive: statements that wrap a body push a
  /// frame and let the loop parse the body as the next statement; the
  /// terminator loop in `statement_end` closes frames whose body just
  /// ended.
  pub(super) fn parse_statements(&mut self) -> Result<()> {
    self.parse_directive_prologue()?;
    loop {
      self.assert_statement_boundary();
      match self.current().kind {
        Tok_Eof => {
          let root = self.funcs.len() == 1;
          if root && self.func().frames.is_empty() {
            return Ok(());
          }
          return Err(self.error(ErrorKind::UnexpectedEnd));
        }
        Tok_Error => return Err(self.error(ErrorKind::InvalidToken)),
        Brk_CurlyR => {
          if self.func().frames.is_empty() {
            if self.funcs.len() > 1 {
              // the caller consumes the function body's `}`
              return Ok(());
            }
            return Err(self.error(ErrorKind::UnexpectedToken));
          }
          self.close_brace()?;
        }
        Brk_CurlyL => {
          self.bump();
          self.func().frames.push(Frame::Block);
        }
        Tok_Semicolon => {
          self.bump();
          self.statement_end()?;
        }
        Kw_Var => self.var_statement()?,
        Kw_Function => self.function_declaration()?,
        Kw_If => self.if_statement()?,
        Kw_Switch => self.switch_statement()?,
        Kw_Do => self.do_statement()?,
        Kw_While => self.while_statement()?,
        Kw_For => self.for_statement()?,
        Kw_With => self.with_statement()?,
        Kw_Try => self.try_statement()?,
        Kw_Case => self.case_label()?,
        Kw_Default => self.default_label()?,
        Kw_Break => self.break_statement()?,
        Kw_Continue => self.continue_statement()?,
        Kw_Return => self.return_statement()?,
        Kw_Throw => self.throw_statement()?,
        Kw_Debugger => {
          self.bump();
          self.emit(Op::Debugger);
          self.consume_semicolon()?;
          self.statement_end()?;
        }
        Lit_Ident if self.lex.peek().is(Tok_Colon) => self.label_statement()?,
        _ => self.expr_statement()?,
      }
    }
  }

  /// Close any frames whose body ended at the current position. Stops at
  /// frames that only a `}` can close.
  fn statement_end(&mut self) -> Result<()> {
    loop {
      self.assert_statement_boundary();
      match self.func().frames.last() {
        None | Some(Frame::Block | Frame::Switch { .. } | Frame::Try { .. }) => return Ok(()),
        _ => {}
      }
      let frame = self.func().frames.pop().unwrap();
      match frame {
        Frame::Label { breaks, .. } => {
          for jump in breaks {
            debug_assert!(!jump.is_continue);
            self.builder().set_branch_here(jump.branch);
          }
        }
        Frame::If { end } => {
          if self.bump_if(Kw_Else) {
            let next = self.builder().emit_forward_branch(Op::JumpForward);
            self.builder().set_branch_here(end);
            self.func().frames.push(Frame::Else { end: next });
            // the else body is the next statement
            return Ok(());
          }
          self.builder().set_branch_here(end);
        }
        Frame::Else { end } => self.builder().set_branch_here(end),
        Frame::While {
          end,
          cond,
          start,
          mut loop_frame,
        } => {
          self.set_continues_here(&mut loop_frame);
          self.builder().set_branch_here(end);
          self.with_range(cond, |p| p.expr(true).map(drop))?;
          self.emit_loop_tail(start);
          self.set_breaks_here(loop_frame);
        }
        Frame::DoWhile {
          start,
          mut loop_frame,
        } => {
          self.expect(Kw_While, ErrorKind::ExpectedWhile)?;
          self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
          self.set_continues_here(&mut loop_frame);
          let _ = self.expr(true)?;
          self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
          self.emit_loop_tail(start);
          // the trailing semicolon may be omitted entirely
          self.bump_if(Tok_Semicolon);
          self.set_breaks_here(loop_frame);
        }
        Frame::For {
          end,
          cond,
          update,
          start,
          mut loop_frame,
        } => {
          self.set_continues_here(&mut loop_frame);
          if let Some(update) = update {
            let produced = self.with_range(update, |p| p.expr(false))?;
            if produced {
              self.emit(Op::Pop);
            }
          }
          if let Some(end) = end {
            self.builder().set_branch_here(end);
          }
          match cond {
            Some(cond) => {
              self.with_range(cond, |p| p.expr(true).map(drop))?;
              self.emit_loop_tail(start);
            }
            None => self.builder().emit_backward_branch(Op::JumpBackward, start),
          }
          self.set_breaks_here(loop_frame);
        }
        Frame::ForIn {
          end,
          start,
          mut loop_frame,
        } => {
          self.set_continues_here(&mut loop_frame);
          self
            .builder()
            .emit_backward_branch(Op::BranchIfForInHasNext, start);
          self.builder().set_branch_here(end);
          self.set_breaks_here(loop_frame);
          self.builder().adjust_depth(-FOR_IN_CONTEXT_STACK_ALLOCATION);
          self.func().context_slots -= FOR_IN_CONTEXT_STACK_ALLOCATION;
        }
        Frame::With { end } => {
          self.emit(Op::ContextEnd);
          self.builder().set_branch_here(end);
          self.builder().adjust_depth(-WITH_CONTEXT_STACK_ALLOCATION);
          self.func().context_slots -= WITH_CONTEXT_STACK_ALLOCATION;
        }
        Frame::Block | Frame::Switch { .. } | Frame::Try { .. } => unreachable!(),
      }
    }
  }

  /// Emit the backward branch of a loop, applying the condition folds:
  /// constant true turns the branch unconditional, constant false elides
  /// it, a trailing logical not inverts it.
  fn emit_loop_tail(&mut self, start: usize) {
    match self.builder().fold_condition() {
      Fold::True => self.builder().emit_backward_branch(Op::JumpBackward, start),
      Fold::False => {}
      Fold::Inverted => self
        .builder()
        .emit_backward_branch(Op::BranchIfFalseBackward, start),
      Fold::None => self
        .builder()
        .emit_backward_branch(Op::BranchIfTrueBackward, start),
    }
  }

  fn set_continues_here(&mut self, loop_frame: &mut LoopFrame) {
    let jumps = std::mem::take(&mut loop_frame.jumps);
    for jump in jumps {
      if jump.is_continue {
        self.builder().set_branch_here(jump.branch);
      } else {
        loop_frame.jumps.push(jump);
      }
    }
  }

  fn set_breaks_here(&mut self, loop_frame: LoopFrame) {
    for jump in loop_frame.jumps {
      debug_assert!(!jump.is_continue);
      self.builder().set_branch_here(jump.branch);
    }
  }

  /// `}` at statement position: closes a block, a switch, or one phase of a
  /// try statement. Anything else on top is a syntax error.
  fn close_brace(&mut self) -> Result<()> {
    match self.func().frames.last() {
      Some(Frame::Block) => {
        self.bump();
        let _ = self.func().frames.pop();
        self.statement_end()
      }
      Some(Frame::Switch { .. }) => self.close_switch(),
      Some(Frame::Try { .. }) => self.try_phase_end(),
      _ => Err(self.error(ErrorKind::UnexpectedToken)),
    }
  }

  fn var_statement(&mut self) -> Result<()> {
    self.bump();
    self.var_declarations()?;
    self.consume_semicolon()?;
    self.statement_end()
  }

  /// `ident [= expr] (, ident [= expr])*`; shared with the for-init.
  fn var_declarations(&mut self) -> Result<()> {
    loop {
      let name = self.binding_ident()?;
      let lit = self.ident_lit(&name);
      self.builder().mark(lit, LiteralFlags::VAR);
      if self.bump_if(Op_Equal) {
        let _ = self.assignment(true)?;
        self.emit_lit(Op::AssignIdent, lit);
      }
      if !self.bump_if(Tok_Comma) {
        return Ok(());
      }
    }
  }

  /// A function declaration hoists its binding: the ident literal is marked
  /// `VAR | INITIALIZED` and linked to the compiled sub-function; no code
  /// is emitted at the declaration site.
  fn function_declaration(&mut self) -> Result<()> {
    self.bump();
    let (name, function) = self.parse_function(true)?;
    let name = name.unwrap();
    let ident = self.ident_lit(&name);
    self
      .builder()
      .mark(ident, LiteralFlags::VAR | LiteralFlags::INITIALIZED);
    self.builder().set_init(ident, function);
    self.statement_end()
  }

  fn if_statement(&mut self) -> Result<()> {
    self.bump();
    self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
    let _ = self.expr(true)?;
    self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
    let end = self.builder().emit_forward_branch(Op::BranchIfFalseForward);
    self.func().frames.push(Frame::If { end });
    Ok(())
  }

  /// `while (cond) body` defers the condition: record its range, jump over
  /// the body, and emit it at the loop tail.
  fn while_statement(&mut self) -> Result<()> {
    self.bump();
    self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
    let cond = self.scan(ScanMode::PrimaryExpr, &[Brk_ParenR])?;
    self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
    let end = self.builder().emit_forward_branch(Op::JumpForward);
    let start = self.builder().position();
    self.func().frames.push(Frame::While {
      end,
      cond,
      start,
      loop_frame: LoopFrame::new(),
    });
    Ok(())
  }

  fn do_statement(&mut self) -> Result<()> {
    self.bump();
    let start = self.builder().position();
    self.func().frames.push(Frame::DoWhile {
      start,
      loop_frame: LoopFrame::new(),
    });
    Ok(())
  }

  /// The for-family. A scan of the head up to `;` or `in` decides between
  /// the classic three-part loop and for-in.
  fn for_statement(&mut self) -> Result<()> {
    self.bump();
    self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
    let saved = self.lex.clone();
    let head = self.scan(ScanMode::Statement, &[Tok_Semicolon, Kw_In])?;
    if self.current().is(Kw_In) {
      self.for_in_statement(head)
    } else {
      self.lex = saved;
      self.classic_for_statement()
    }
  }

  fn for_in_statement(&mut self, target: SourceRange) -> Result<()> {
    self.bump(); // in

    // a `var` target declares now and runs its initializer once, before
    // the enumerated object is evaluated
    let mut var_target = None;
    let starts_with_var = Lexer::part(self.src, target.span.range())
      .current()
      .is(Kw_Var);
    if starts_with_var {
      self.with_range(target, |p| {
        p.bump();
        let name = p.binding_ident()?;
        let lit = p.ident_lit(&name);
        p.builder().mark(lit, LiteralFlags::VAR);
        if p.bump_if(Op_Equal) {
          let _ = p.assignment(true)?;
          p.emit_lit(Op::AssignIdent, lit);
        }
        var_target = Some(lit);
        Ok(())
      })?;
    }

    let _ = self.expr(true)?;
    self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
    let end = self.builder().emit_forward_branch(Op::ForInCreateContext);
    self.func().context_slots += FOR_IN_CONTEXT_STACK_ALLOCATION;
    let start = self.builder().position();

    match var_target {
      Some(lit) => {
        self.emit(Op::ForInGetNext);
        self.emit_lit(Op::AssignIdent, lit);
      }
      None => self.with_range(target, |p| p.for_in_target())?,
    }

    self.func().frames.push(Frame::ForIn {
      end,
      start,
      loop_frame: LoopFrame::new(),
    });
    Ok(())
  }

  fn classic_for_statement(&mut self) -> Result<()> {
    if self.bump_if(Tok_Semicolon) {
      // no init
    } else if self.bump_if(Kw_Var) {
      self.var_declarations()?;
      self.expect(Tok_Semicolon, ErrorKind::ExpectedSemicolon)?;
    } else {
      let produced = self.expr(false)?;
      if produced {
        self.emit(Op::Pop);
      }
      self.expect(Tok_Semicolon, ErrorKind::ExpectedSemicolon)?;
    }

    let cond = if self.bump_if(Tok_Semicolon) {
      None
    } else {
      let range = self.scan(ScanMode::PrimaryExpr, &[Tok_Semicolon])?;
      self.expect(Tok_Semicolon, ErrorKind::ExpectedSemicolon)?;
      Some(range)
    };
    let update = if self.current().is(Brk_ParenR) {
      None
    } else {
      Some(self.scan(ScanMode::PrimaryExpr, &[Brk_ParenR])?)
    };
    self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;

    let end = cond
      .is_some()
      .then(|| self.builder().emit_forward_branch(Op::JumpForward));
    let start = self.builder().position();
    self.func().frames.push(Frame::For {
      end,
      cond,
      update,
      start,
      loop_frame: LoopFrame::new(),
    });
    Ok(())
  }

  fn with_statement(&mut self) -> Result<()> {
    let span = self.current().span;
    self.bump();
    if self.strict() {
      return Err(self.error_at(ErrorKind::WithInStrictMode, span));
    }
    self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
    let _ = self.expr(true)?;
    self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
    let end = self.builder().emit_forward_branch(Op::WithCreateContext);
    self.func().context_slots += WITH_CONTEXT_STACK_ALLOCATION;
    self.func().frames.push(Frame::With { end });
    Ok(())
  }

  fn try_statement(&mut self) -> Result<()> {
    self.bump();
    self.expect(Brk_CurlyL, ErrorKind::ExpectedLeftBrace)?;
    let end = self.builder().emit_forward_branch(Op::TryCreateContext);
    self.func().context_slots += TRY_CONTEXT_STACK_ALLOCATION;
    self.func().frames.push(Frame::Try {
      phase: TryPhase::Try,
      end,
    });
    Ok(())
  }

  /// `}` ended one phase of a try statement; move to the next phase or
  /// close it down.
  fn try_phase_end(&mut self) -> Result<()> {
    self.bump(); // }
    let Some(Frame::Try { phase, end }) = self.func().frames.pop() else {
      unreachable!();
    };
    match phase {
      TryPhase::Try => {
        if self.bump_if(Kw_Catch) {
          self.builder().set_branch_here(end);
          self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
          let name = self.binding_ident()?;
          let lit = self.ident_lit(&name);
          self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
          self.expect(Brk_CurlyL, ErrorKind::ExpectedLeftBrace)?;
          let end = self.builder().emit_forward_branch(Op::Catch);
          self.emit_lit(Op::AssignIdent, lit);
          self.func().frames.push(Frame::Try {
            phase: TryPhase::Catch,
            end,
          });
          Ok(())
        } else if self.bump_if(Kw_Finally) {
          self.builder().set_branch_here(end);
          self.enter_finally()
        } else {
          Err(self.error(ErrorKind::MissingCatchOrFinally))
        }
      }
      TryPhase::Catch => {
        if self.bump_if(Kw_Finally) {
          self.builder().set_branch_here(end);
          self.enter_finally()
        } else {
          self.close_try(end)
        }
      }
      TryPhase::Finally => self.close_try(end),
    }
  }

  fn enter_finally(&mut self) -> Result<()> {
    self.expect(Brk_CurlyL, ErrorKind::ExpectedLeftBrace)?;
    let end = self.builder().emit_forward_branch(Op::Finally);
    self.func().frames.push(Frame::Try {
      phase: TryPhase::Finally,
      end,
    });
    Ok(())
  }

  fn close_try(&mut self, end: Branch) -> Result<()> {
    self.emit(Op::ContextEnd);
    self.builder().set_branch_here(end);
    self.builder().adjust_depth(-TRY_CONTEXT_STACK_ALLOCATION);
    self.func().context_slots -= TRY_CONTEXT_STACK_ALLOCATION;
    self.statement_end()
  }

  /// Pre-pass over a switch body: enumerate the case expressions and the
  /// default label, emit the comparison chain, then re-enter the body to
  /// parse the statements with the case branches pending.
  fn switch_statement(&mut self) -> Result<()> {
    self.bump();
    self.expect(Brk_ParenL, ErrorKind::ExpectedLeftParen)?;
    let _ = self.expr(true)?;
    self.expect(Brk_ParenR, ErrorKind::ExpectedRightParen)?;
    self.expect(Brk_CurlyL, ErrorKind::ExpectedLeftBrace)?;

    if self.bump_if(Brk_CurlyR) {
      // `{}`: pop the scrutinee and reduce the statement to a block
      self.emit(Op::Pop);
      return self.statement_end();
    }
    if !self.current().is(Kw_Case) && !self.current().is(Kw_Default) {
      return Err(self.error(ErrorKind::InvalidSwitchBody));
    }

    let saved = self.lex.clone();
    let mut case_ranges = Vec::new();
    let mut has_default = false;
    loop {
      match self.current().kind {
        Brk_CurlyR => break,
        Kw_Case => {
          self.bump();
          let range = self.scan(ScanMode::PrimaryExpr, &[Tok_Colon])?;
          self.expect(Tok_Colon, ErrorKind::ExpectedColon)?;
          case_ranges.push(range);
          let _ = self.scan(ScanMode::Statement, &[Kw_Case, Kw_Default, Brk_CurlyR])?;
        }
        Kw_Default => {
          if has_default {
            return Err(self.error(ErrorKind::MultipleDefaults));
          }
          has_default = true;
          self.bump();
          self.expect(Tok_Colon, ErrorKind::ExpectedColon)?;
          let _ = self.scan(ScanMode::Statement, &[Kw_Case, Kw_Default, Brk_CurlyR])?;
        }
        _ => unreachable!("switch scan stopped on an unexpected token"),
      }
    }

    // comparison chain: dup + strict-equal + branch for every case but the
    // last, which pops the scrutinee with a fused compare-and-branch
    let mut cases = Vec::with_capacity(case_ranges.len());
    for (i, range) in case_ranges.iter().enumerate() {
      let last = i + 1 == case_ranges.len();
      if !last {
        self.emit(Op::Dup);
      }
      self.with_range(*range, |p| p.expr(true).map(drop))?;
      if !last {
        self.emit(Op::StrictEqual);
        cases.push(Some(
          self.builder().emit_forward_branch(Op::BranchIfTrueForward),
        ));
      } else {
        cases.push(Some(
          self.builder().emit_forward_branch(Op::BranchIfStrictEqual),
        ));
      }
    }
    if case_ranges.is_empty() {
      self.emit(Op::Pop);
    }
    let default_branch = Some(self.builder().emit_forward_branch(Op::JumpForward));

    self.lex = saved;
    self.func().frames.push(Frame::Switch {
      default_branch,
      has_default,
      cases,
      next_case: 0,
      loop_frame: LoopFrame::new(),
    });
    Ok(())
  }

  /// `case expr:` inside an open switch body. The expression was already
  /// compiled by the pre-pass; skip it and patch the pending branch.
  fn case_label(&mut self) -> Result<()> {
    if !matches!(self.func().frames.last(), Some(Frame::Switch { .. })) {
      return Err(self.error(ErrorKind::CaseOutsideSwitch));
    }
    self.bump();
    let _ = self.scan(ScanMode::PrimaryExpr, &[Tok_Colon])?;
    self.expect(Tok_Colon, ErrorKind::ExpectedColon)?;
    let branch = {
      let Some(Frame::Switch { cases, next_case, .. }) = self.func().frames.last_mut() else {
        unreachable!();
      };
      let index = *next_case;
      *next_case += 1;
      cases[index].take().unwrap()
    };
    self.builder().set_branch_here(branch);
    Ok(())
  }

  fn default_label(&mut self) -> Result<()> {
    if !matches!(self.func().frames.last(), Some(Frame::Switch { .. })) {
      return Err(self.error(ErrorKind::DefaultOutsideSwitch));
    }
    self.bump();
    self.expect(Tok_Colon, ErrorKind::ExpectedColon)?;
    let branch = {
      let Some(Frame::Switch { default_branch, .. }) = self.func().frames.last_mut() else {
        unreachable!();
      };
      default_branch.take().unwrap()
    };
    self.builder().set_branch_here(branch);
    Ok(())
  }

  fn close_switch(&mut self) -> Result<()> {
    self.bump(); // }
    let Some(Frame::Switch {
      default_branch,
      cases,
      loop_frame,
      ..
    }) = self.func().frames.pop()
    else {
      unreachable!();
    };
    debug_assert!(cases.iter().all(Option::is_none));
    if let Some(branch) = default_branch {
      self.builder().set_branch_here(branch);
    }
    self.set_breaks_here(loop_frame);
    self.statement_end()
  }

  fn break_statement(&mut self) -> Result<()> {
    let span = self.current().span;
    self.bump();
    let label = self.jump_label();
    self.emit_jump_out(label, span, false)?;
    self.consume_semicolon()?;
    self.statement_end()
  }

  fn continue_statement(&mut self) -> Result<()> {
    let span = self.current().span;
    self.bump();
    let label = self.jump_label();
    self.emit_jump_out(label, span, true)?;
    self.consume_semicolon()?;
    self.statement_end()
  }

  /// An optional label operand on the same line.
  fn jump_label(&mut self) -> Option<&'src str> {
    let current = self.current();
    if current.is(Lit_Ident) && !current.nl {
      let name = self.lex.lexeme(current);
      self.bump();
      Some(name)
    } else {
      None
    }
  }

  /// Resolve a break or continue: walk the frame stack for the target,
  /// counting the for-in/with/try contexts the jump escapes; those upgrade
  /// the opcode to `JumpForwardExitContext`.
  fn emit_jump_out(&mut self, label: Option<&str>, span: Span, is_continue: bool) -> Result<()> {
    let func = self.funcs.last_mut().unwrap();
    let frames = &func.frames;

    let mut contexts = 0usize;
    let mut target = None;
    if let Some(name) = label {
      if is_continue {
        let label_index = frames
          .iter()
          .position(|f| matches!(f, Frame::Label { name: n, .. } if n.as_ref() == name));
        let Some(label_index) = label_index else {
          return Err(Error::new(ErrorKind::InvalidContinueLabel, span));
        };
        // the label must directly precede a loop
        let mut at = label_index + 1;
        while matches!(frames.get(at), Some(Frame::Label { .. })) {
          at += 1;
        }
        if !matches!(frames.get(at), Some(f) if f.is_loop()) {
          return Err(Error::new(ErrorKind::InvalidContinueLabel, span));
        }
        contexts = frames[at + 1..].iter().filter(|f| f.exits_context()).count();
        target = Some(at);
      } else {
        for (i, frame) in frames.iter().enumerate().rev() {
          match frame {
            Frame::Label { name: n, .. } if n.as_ref() == name => {
              target = Some(i);
              break;
            }
            f if f.exits_context() => contexts += 1,
            _ => {}
          }
        }
        if target.is_none() {
          return Err(Error::new(ErrorKind::InvalidBreakLabel, span));
        }
      }
    } else {
      for (i, frame) in frames.iter().enumerate().rev() {
        let hit = if is_continue {
          frame.is_loop()
        } else {
          frame.is_loop() || matches!(frame, Frame::Switch { .. })
        };
        if hit {
          // breaking out of a for-in unwinds its own context too
          if !is_continue && matches!(frame, Frame::ForIn { .. }) {
            contexts += 1;
          }
          target = Some(i);
          break;
        }
        if frame.exits_context() {
          contexts += 1;
        }
      }
      if target.is_none() {
        let kind = if is_continue {
          ErrorKind::InvalidContinue
        } else {
          ErrorKind::InvalidBreak
        };
        return Err(Error::new(kind, span));
      }
    }

    let target = target.unwrap();
    let branch = if contexts > 0 {
      func
        .builder
        .emit_forward_branch_exit(Op::JumpForwardExitContext, contexts as u8)
    } else {
      func.builder.emit_forward_branch(Op::JumpForward)
    };
    let jump = PendingJump { branch, is_continue };
    match &mut func.frames[target] {
      Frame::Label { breaks, .. } => breaks.push(jump),
      frame => frame.loop_frame_mut().unwrap().jumps.push(jump),
    }
    Ok(())
  }

  fn return_statement(&mut self) -> Result<()> {
    let span = self.current().span;
    if !self.func().status.contains(StatusFlags::FUNCTION) {
      return Err(self.error_at(ErrorKind::ReturnOutsideFunction, span));
    }
    self.bump();
    let current = self.current();
    if current.is(Tok_Semicolon) || current.is(Brk_CurlyR) || current.is(Tok_Eof) || current.nl {
      self.emit(Op::ReturnUndefined);
    } else {
      let _ = self.expr(true)?;
      self.emit(Op::Return);
    }
    self.consume_semicolon()?;
    self.statement_end()
  }

  fn throw_statement(&mut self) -> Result<()> {
    self.bump();
    if self.current().nl {
      return Err(self.error(ErrorKind::NewlineAfterThrow));
    }
    let _ = self.expr(true)?;
    self.emit(Op::Throw);
    self.consume_semicolon()?;
    self.statement_end()
  }

  fn label_statement(&mut self) -> Result<()> {
    let name = self.lex.lexeme(self.current());
    if self.strict() && STRICT_RESERVED.contains(&name) {
      return Err(self.error(ErrorKind::ReservedIdent));
    }
    let duplicate = self
      .func()
      .frames
      .iter()
      .any(|f| matches!(f, Frame::Label { name: n, .. } if n.as_ref() == name));
    if duplicate {
      return Err(self.error(ErrorKind::DuplicateLabel));
    }
    self.bump(); // ident
    self.bump(); // colon
    self.func().frames.push(Frame::Label {
      name: Cow::from(name),
      breaks: Vec::new(),
    });
    Ok(())
  }

  pub(super) fn expr_statement(&mut self) -> Result<()> {
    let produced = self.expr(false)?;
    if produced {
      self.emit(Op::Pop);
    }
    self.consume_semicolon()?;
    self.statement_end()
  }
}
