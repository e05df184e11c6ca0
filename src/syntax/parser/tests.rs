use indoc::indoc;

use super::*;
use crate::bytecode::disasm::{opcode_names, opcodes, validate};
use crate::syntax::Options;

fn compile_ok(src: &str) -> CompiledCode {
  match parse(src, Options::global()) {
    Ok(code) => {
      validate(&code).unwrap();
      code
    }
    Err(e) => panic!("{}", e.report(src, false)),
  }
}

fn names(src: &str) -> Vec<&'static str> {
  opcode_names(&compile_ok(src))
}

fn err(src: &str) -> ErrorKind {
  match parse(src, Options::global()) {
    Ok(_) => panic!("expected an error for {src:?}"),
    Err(e) => e.kind,
  }
}

fn function_literal(code: &CompiledCode) -> &CompiledCode {
  for entry in &code.literals {
    if let Literal::Function(f) = &entry.value {
      return f;
    }
  }
  panic!("no function literal in pool");
}

#[test]
fn var_with_initializer_fuses_into_assign_ident() {
  let code = compile_ok("var x = 1 + 2;");
  assert_eq!(
    opcode_names(&code),
    vec!["push_literal", "push_literal", "add", "assign_ident", "return_undefined"]
  );
  assert!(code.literal_end >= 3);
  assert_eq!(code.argument_end, 0);
  assert_eq!(code.ident_end, 1);
  assert!(code.literals[0].flags.contains(LiteralFlags::VAR));
  // the assignment targets the ident slot
  assert_eq!(opcodes(&code)[3], (Op::AssignIdent, 0));
}

#[test]
fn while_true_folds_to_bare_jump_backward() {
  let code = compile_ok("while(1){}");
  assert_eq!(
    opcode_names(&code),
    vec!["jump_forward", "jump_backward", "return_undefined"]
  );
  // the forward jump lands on the condition, which folded away entirely
  assert_eq!(opcodes(&code)[0], (Op::JumpForward, 2));
  assert_eq!(opcodes(&code)[1], (Op::JumpBackward, 0));
}

#[test]
fn while_literal_true_folds_too() {
  assert_eq!(
    names("while(true){}"),
    vec!["jump_forward", "jump_backward", "return_undefined"]
  );
}

#[test]
fn while_not_inverts_the_backward_branch() {
  assert_eq!(
    names("while(!a){}"),
    vec!["jump_forward", "push_ident", "branch_if_false_backward", "return_undefined"]
  );
}

#[test]
fn while_false_elides_the_branch() {
  assert_eq!(
    names("while(0){}"),
    vec!["jump_forward", "return_undefined"]
  );
}

#[test]
fn if_else_patches_two_branches() {
  let code = compile_ok("if(a)b;else c;");
  assert_eq!(
    opcode_names(&code),
    vec![
      "push_ident",
      "branch_if_false_forward",
      "push_ident",
      "pop",
      "jump_forward",
      "push_ident",
      "pop",
      "return_undefined",
    ]
  );
}

#[test]
fn for_loop_break_lands_after_the_back_edge() {
  let code = compile_ok("for(var i=0;i<3;i++)break;");
  let names = opcode_names(&code);
  assert_eq!(
    names,
    vec![
      "push_literal",
      "assign_ident",
      "jump_forward",
      "jump_forward",
      "post_incr_ident",
      "pop",
      "push_ident",
      "push_literal",
      "less",
      "branch_if_true_backward",
      "return_undefined",
    ]
  );
  // the break (second jump_forward) targets the instruction after the
  // backward branch
  let full = code.status_flags.contains(StatusFlags::FULL_LITERAL_ENCODING);
  let mut offset = 0usize;
  let mut jumps = Vec::new();
  for _ in 0..names.len() {
    let (op, _, a, _, size) =
      crate::bytecode::builder::decode_instr(&code.code, offset, full).unwrap();
    if op == Op::JumpForward {
      jumps.push(offset + a as usize);
    }
    offset += size;
  }
  assert_eq!(jumps.len(), 2);
  // return_undefined is the final single-byte instruction
  assert_eq!(jumps[1], code.code.len() - 1);
  // the loop-head jump lands on the condition, before the back edge
  assert!(jumps[0] < jumps[1]);
}

#[test]
fn try_catch_finally_context_order() {
  let code = compile_ok("try{}catch(e){}finally{}");
  assert_eq!(
    opcode_names(&code),
    vec![
      "try_create_context",
      "catch",
      "assign_ident",
      "finally",
      "context_end",
      "return_undefined",
    ]
  );
}

#[test]
fn try_catch_without_finally() {
  assert_eq!(
    names("try{}catch(e){}"),
    vec!["try_create_context", "catch", "assign_ident", "context_end", "return_undefined"]
  );
}

#[test]
fn try_finally_without_catch() {
  assert_eq!(
    names("try{}finally{}"),
    vec!["try_create_context", "finally", "context_end", "return_undefined"]
  );
}

#[test]
fn switch_emission_shape() {
  let code = compile_ok("switch(x){case 1:break;default:}");
  assert_eq!(
    opcode_names(&code),
    vec![
      "push_ident",
      "push_literal",
      "branch_if_strict_equal",
      "jump_forward",
      "jump_forward",
      "return_undefined",
    ]
  );
}

#[test]
fn switch_multiple_cases_dup_the_scrutinee() {
  assert_eq!(
    names("switch(x){case 1:case 2:break;}"),
    vec![
      "push_ident",
      "dup",
      "push_literal",
      "strict_equal",
      "branch_if_true_forward",
      "push_literal",
      "branch_if_strict_equal",
      "jump_forward",
      "jump_forward",
      "return_undefined",
    ]
  );
}

#[test]
fn empty_switch_reduces_to_a_block() {
  assert_eq!(names("switch(x){}"), vec!["push_ident", "pop", "return_undefined"]);
}

#[test]
fn switch_with_only_default() {
  assert_eq!(
    names("switch(x){default: y();}"),
    vec!["push_ident", "pop", "jump_forward", "push_ident", "call", "pop", "return_undefined"]
  );
}

#[test]
fn do_while_parses_the_tail_condition_in_place() {
  assert_eq!(
    names("do x(); while(a);"),
    vec!["push_ident", "call", "pop", "push_ident", "branch_if_true_backward", "return_undefined"]
  );
}

#[test]
fn continue_targets_the_while_condition() {
  let code = compile_ok("while(a) continue;");
  assert_eq!(
    opcode_names(&code),
    vec!["jump_forward", "jump_forward", "push_ident", "branch_if_true_backward", "return_undefined"]
  );
  // both forward jumps land on the condition
  let full = code.status_flags.contains(StatusFlags::FULL_LITERAL_ENCODING);
  let (_, _, a0, _, s0) = crate::bytecode::builder::decode_instr(&code.code, 0, full).unwrap();
  let (_, _, a1, _, _) = crate::bytecode::builder::decode_instr(&code.code, s0, full).unwrap();
  assert_eq!(a0 as usize, s0 + a1 as usize);
}

#[test]
fn for_in_emission_shape() {
  assert_eq!(
    names("for (x in o) {}"),
    vec![
      "push_ident",
      "for_in_create_context",
      "for_in_get_next",
      "assign_ident",
      "branch_if_for_in_has_next",
      "return_undefined",
    ]
  );
}

#[test]
fn for_in_var_initializer_runs_once_before_the_loop() {
  assert_eq!(
    names("for (var x = 1 in o) {}"),
    vec![
      "push_literal",
      "assign_ident",
      "push_ident",
      "for_in_create_context",
      "for_in_get_next",
      "assign_ident",
      "branch_if_for_in_has_next",
      "return_undefined",
    ]
  );
}

#[test]
fn for_in_property_target() {
  assert_eq!(
    names("for (o.p in q) {}"),
    vec![
      "push_ident",
      "for_in_create_context",
      "push_ident",
      "push_literal",
      "for_in_get_next",
      "assign_prop",
      "branch_if_for_in_has_next",
      "return_undefined",
    ]
  );
}

#[test]
fn for_in_non_assignable_target_defers_to_runtime() {
  assert_eq!(
    names("for (f() in o) {}"),
    vec![
      "push_ident",
      "for_in_create_context",
      "push_ident",
      "call",
      "pop",
      "push_undefined_base",
      "for_in_get_next",
      "assign_prop",
      "branch_if_for_in_has_next",
      "return_undefined",
    ]
  );
}

#[test]
fn for_without_condition_jumps_back_unconditionally() {
  assert_eq!(
    names("for(;;)break;"),
    vec!["jump_forward", "jump_backward", "return_undefined"]
  );
}

#[test]
fn break_out_of_with_exits_the_context() {
  let code = compile_ok("a: with(o) break a;");
  assert_eq!(
    opcode_names(&code),
    vec![
      "push_ident",
      "with_create_context",
      "jump_forward_exit_context",
      "context_end",
      "return_undefined",
    ]
  );
}

#[test]
fn break_out_of_try_exits_the_context() {
  assert_eq!(
    names("a: try { break a; } finally {}"),
    vec![
      "try_create_context",
      "jump_forward_exit_context",
      "finally",
      "context_end",
      "return_undefined",
    ]
  );
}

#[test]
fn break_out_of_for_in_exits_its_own_context() {
  let code = compile_ok("for (x in o) break;");
  assert!(opcode_names(&code).contains(&"jump_forward_exit_context"));
}

#[test]
fn logical_and_keeps_the_left_value() {
  assert_eq!(
    names("x = a && b;"),
    vec![
      "push_ident",
      "dup",
      "branch_if_false_forward",
      "pop",
      "push_ident",
      "assign_ident",
      "return_undefined",
    ]
  );
}

#[test]
fn conditional_expression_branches() {
  assert_eq!(
    names("x = a ? 1 : 2;"),
    vec![
      "push_ident",
      "branch_if_false_forward",
      "push_literal",
      "jump_forward",
      "push_literal",
      "assign_ident",
      "return_undefined",
    ]
  );
}

#[test]
fn calls_and_method_calls() {
  let code = compile_ok("f(1); o.m(2, 3); new C(4);");
  assert_eq!(
    opcode_names(&code),
    vec![
      "push_ident", "push_literal", "call", "pop",
      "push_ident", "push_literal", "push_literal", "push_literal", "call_prop", "pop",
      "push_ident", "push_literal", "new", "pop",
      "return_undefined",
    ]
  );
  let ops = opcodes(&code);
  assert_eq!(ops[2].0, Op::Call);
  assert_eq!(ops[2].1, 1);
  assert_eq!(ops[8], (Op::CallProp, 2));
  assert_eq!(ops[12], (Op::New, 1));
}

#[test]
fn assignment_value_used_selects_the_push_variant() {
  assert_eq!(
    names("x = y = 1;"),
    vec!["push_literal", "assign_ident_push", "assign_ident", "return_undefined"]
  );
}

#[test]
fn compound_property_assignment_uses_a_reference_read() {
  assert_eq!(
    names("o.p += 1;"),
    vec![
      "push_ident",
      "prop_get_literal_ref",
      "push_literal",
      "add",
      "assign_prop_literal",
      "return_undefined",
    ]
  );
  assert_eq!(
    names("o[k] -= 1;"),
    vec![
      "push_ident",
      "push_ident",
      "prop_get_ref",
      "push_literal",
      "sub",
      "assign_prop",
      "return_undefined",
    ]
  );
}

#[test]
fn indexed_assignment() {
  assert_eq!(
    names("o[k] = v;"),
    vec!["push_ident", "push_ident", "push_ident", "assign_prop", "return_undefined"]
  );
}

#[test]
fn parenthesized_target_still_assigns() {
  assert_eq!(
    names("(x) = 1;"),
    vec!["push_literal", "assign_ident", "return_undefined"]
  );
}

#[test]
fn typeof_ident_never_throws() {
  assert_eq!(
    names("x = typeof y;"),
    vec!["typeof_ident", "assign_ident", "return_undefined"]
  );
  assert_eq!(
    names("x = typeof y.z;"),
    vec!["push_ident", "prop_get_literal", "typeof", "assign_ident", "return_undefined"]
  );
}

#[test]
fn delete_forms() {
  assert_eq!(
    names("delete o.p;"),
    vec!["push_ident", "push_literal", "delete_prop", "pop", "return_undefined"]
  );
  assert_eq!(
    names("delete x;"),
    vec!["delete_ident", "pop", "return_undefined"]
  );
  assert_eq!(
    names("delete 1;"),
    vec!["push_literal", "pop", "push_true", "pop", "return_undefined"]
  );
}

#[test]
fn increment_forms() {
  assert_eq!(names("++x;"), vec!["pre_incr_ident", "pop", "return_undefined"]);
  assert_eq!(names("x--;"), vec!["post_decr_ident", "pop", "return_undefined"]);
  assert_eq!(
    names("o.p++;"),
    vec!["push_ident", "push_literal", "post_incr_prop", "pop", "return_undefined"]
  );
  assert_eq!(
    names("--o[k];"),
    vec!["push_ident", "push_ident", "pre_decr_prop", "pop", "return_undefined"]
  );
}

#[test]
fn array_literal_with_elisions() {
  assert_eq!(
    names("var v = [1,,2];"),
    vec![
      "create_array",
      "push_literal",
      "push_undefined",
      "push_literal",
      "array_append",
      "assign_ident",
      "return_undefined",
    ]
  );
}

#[test]
fn object_literal_with_accessors() {
  let code = compile_ok("var v = {a: 1, get b() { return 2; }, set b(x) {}};");
  assert_eq!(
    opcode_names(&code),
    vec![
      "create_object",
      "push_literal",
      "set_property_literal",
      "push_literal",
      "set_getter",
      "push_literal",
      "set_setter",
      "assign_ident",
      "return_undefined",
    ]
  );
}

#[test]
fn regex_literal_in_primary_position() {
  let code = compile_ok("var r = /ab+c/gi;");
  assert!(matches!(
    &code.literals.iter().find(|e| matches!(e.value, Literal::RegExp { .. })).unwrap().value,
    Literal::RegExp { pattern, flags } if pattern == "ab+c" && flags == "gi"
  ));
  // after a value, `/` is division
  assert_eq!(names("x = a / b;"), vec!["push_ident", "push_ident", "div", "assign_ident", "return_undefined"]);
}

#[test]
fn function_declaration_hoists_without_emitting() {
  let code = compile_ok("function f(a, b) { return a; }");
  assert_eq!(opcode_names(&code), vec!["return_undefined"]);
  let entry = code
    .literals
    .iter()
    .find(|e| matches!(e.value, Literal::Ident(ref n) if n == "f"))
    .unwrap();
  assert!(entry
    .flags
    .contains(LiteralFlags::VAR | LiteralFlags::INITIALIZED));
  let init = entry.init.unwrap();
  let Literal::Function(f) = &code.literals[init as usize].value else {
    panic!("init link must point at the function literal");
  };
  assert!(f.status_flags.contains(StatusFlags::FUNCTION));
  assert_eq!(f.argument_end, 2);
  assert_eq!(f.register_end, 2);
  assert_eq!(
    opcode_names(f),
    vec!["push_ident", "return", "return_undefined"]
  );
  // `a` resolves to the argument slot
  assert_eq!(opcodes(f)[0], (Op::PushIdent, 0));
}

#[test]
fn function_expression_pushes_the_literal() {
  assert_eq!(
    names("var f = function (x) { return x; };"),
    vec!["push_literal", "assign_ident", "return_undefined"]
  );
}

#[test]
fn use_strict_directive_is_observable_in_the_header() {
  let code = compile_ok("'use strict'; var x;");
  assert!(code.status_flags.contains(StatusFlags::STRICT_MODE));
  // directives still compile as expression statements
  assert_eq!(&opcode_names(&code)[..2], &["push_literal", "pop"]);
}

#[test]
fn use_strict_outside_the_prologue_is_an_ordinary_statement() {
  let code = compile_ok("var a; 'use strict'; with(a){}");
  assert!(!code.status_flags.contains(StatusFlags::STRICT_MODE));
}

#[test]
fn use_strict_in_a_function_body() {
  let code = compile_ok("function f() { 'use strict'; }");
  assert!(!code.status_flags.contains(StatusFlags::STRICT_MODE));
  assert!(function_literal(&code)
    .status_flags
    .contains(StatusFlags::STRICT_MODE));
}

#[test]
fn nested_functions_inherit_strictness() {
  let code = compile_ok("'use strict'; function f() {}");
  assert!(function_literal(&code)
    .status_flags
    .contains(StatusFlags::STRICT_MODE));
}

#[test]
fn prologue_string_that_starts_an_expression_is_reinjected() {
  let code = compile_ok("'use strict' + 1;");
  assert!(!code.status_flags.contains(StatusFlags::STRICT_MODE));
  assert_eq!(
    opcode_names(&code),
    vec!["push_literal", "push_literal", "add", "pop", "return_undefined"]
  );
}

#[test]
fn prologue_string_continued_across_a_newline() {
  let code = compile_ok("'use strict'\n+ 1;");
  assert!(!code.status_flags.contains(StatusFlags::STRICT_MODE));
}

#[test]
fn directive_with_escapes_does_not_enable_strict_mode() {
  let code = compile_ok("'use strict\\u0020trailing'; 'use\\x20strict';");
  assert!(!code.status_flags.contains(StatusFlags::STRICT_MODE));
}

#[test]
fn asi_inserts_semicolons_at_newlines() {
  assert_eq!(
    names("var a = 1\nvar b = 2"),
    vec!["push_literal", "assign_ident", "push_literal", "assign_ident", "return_undefined"]
  );
  assert_eq!(err("a = 1 b = 2"), ErrorKind::ExpectedSemicolon);
}

#[test]
fn asi_restricts_return_operands() {
  let code = compile_ok("function f() { return\n1; }");
  assert_eq!(
    opcode_names(function_literal(&code)),
    vec!["return_undefined", "push_literal", "pop", "return_undefined"]
  );
}

#[test]
fn postfix_operators_do_not_attach_across_newlines() {
  let code = compile_ok("function f(a) { a\n++a; }");
  assert_eq!(
    opcode_names(function_literal(&code)),
    vec!["push_ident", "pop", "pre_incr_ident", "pop", "return_undefined"]
  );
}

#[test]
fn break_label_does_not_attach_across_newlines() {
  // the break is unlabeled, `a` is a separate statement
  let code = compile_ok("a: while(1) { break\na; }");
  validate(&code).unwrap();
}

#[test]
fn labelled_continue_requires_a_directly_preceding_loop() {
  assert!(parse("a: while(0) continue a;", Options::global()).is_ok());
  assert!(parse("a: b: while(0) continue a;", Options::global()).is_ok());
  assert_eq!(err("a: continue a;"), ErrorKind::InvalidContinueLabel);
  assert_eq!(err("a: { while(0); continue a; }"), ErrorKind::InvalidContinueLabel);
  assert_eq!(err("a: switch(x) { default: continue a; }"), ErrorKind::InvalidContinueLabel);
}

#[test]
fn error_taxonomy() {
  assert_eq!(err("}"), ErrorKind::UnexpectedToken);
  assert_eq!(err("var x = "), ErrorKind::UnexpectedEnd);
  assert_eq!(err("if a"), ErrorKind::ExpectedLeftParen);
  assert_eq!(err("if (a b"), ErrorKind::ExpectedRightParen);
  assert_eq!(err("try x"), ErrorKind::ExpectedLeftBrace);
  assert_eq!(err("x = a ? b; c"), ErrorKind::ExpectedColon);
  assert_eq!(err("var 1;"), ErrorKind::ExpectedIdentifier);
  assert_eq!(err("do ;"), ErrorKind::ExpectedWhile);
  assert_eq!(err("1 = 2;"), ErrorKind::InvalidLeftHandSide);
  assert_eq!(err("a + b = c;"), ErrorKind::InvalidLeftHandSide);
  assert_eq!(err("f() = 1;"), ErrorKind::InvalidLeftHandSide);
  assert_eq!(err("break;"), ErrorKind::InvalidBreak);
  assert_eq!(err("continue;"), ErrorKind::InvalidContinue);
  assert_eq!(err("while(1) break b;"), ErrorKind::InvalidBreakLabel);
  assert_eq!(err("a: a: ;"), ErrorKind::DuplicateLabel);
  assert_eq!(err("switch(x){default:;default:;}"), ErrorKind::MultipleDefaults);
  assert_eq!(err("case 1: ;"), ErrorKind::CaseOutsideSwitch);
  assert_eq!(err("default: ;"), ErrorKind::DefaultOutsideSwitch);
  assert_eq!(err("switch(x){ y(); }"), ErrorKind::InvalidSwitchBody);
  assert_eq!(err("return;"), ErrorKind::ReturnOutsideFunction);
  assert_eq!(err("try{}"), ErrorKind::MissingCatchOrFinally);
  assert_eq!(err("throw\n1;"), ErrorKind::NewlineAfterThrow);
  assert_eq!(err("var o = {a:1, get a(){}};"), ErrorKind::DuplicateProperty);
  assert_eq!(err("var r = /a/xy;"), ErrorKind::InvalidRegExp);
  assert_eq!(err("var a = 1 +;"), ErrorKind::InvalidExpression);
}

#[test]
fn strict_mode_errors() {
  assert_eq!(err("'use strict'; with(a){}"), ErrorKind::WithInStrictMode);
  assert_eq!(err("'use strict'; var let;"), ErrorKind::ReservedIdent);
  assert_eq!(err("'use strict'; var eval;"), ErrorKind::NonStrictArg);
  assert_eq!(err("'use strict'; arguments = 1;"), ErrorKind::NonStrictArg);
  assert_eq!(err("'use strict'; eval++;"), ErrorKind::NonStrictArg);
  assert_eq!(err("'use strict'; delete a;"), ErrorKind::StrictDelete);
  assert_eq!(err("'use strict'; var a = 017;"), ErrorKind::StrictOctal);
  assert_eq!(err("'use strict'; var s = '\\101';"), ErrorKind::StrictOctal);
  assert_eq!(err("'use strict'; var o = {a:1, a:2};"), ErrorKind::DuplicateProperty);
  assert_eq!(err("function f(a, a) { 'use strict'; }"), ErrorKind::NonStrictArg);
  assert_eq!(err("function eval() { 'use strict'; }"), ErrorKind::NonStrictArg);
  assert_eq!(err("'use strict'; function f(eval) {}"), ErrorKind::NonStrictArg);
  // all fine without the directive
  assert!(parse("with(a){}", Options::global()).is_ok());
  assert!(parse("var o = {a:1, a:2};", Options::global()).is_ok());
  assert!(parse("function f(a, a) {}", Options::global()).is_ok());
}

#[test]
fn eval_and_function_scopes() {
  let code = parse("1;", Options::eval()).unwrap();
  assert!(code.status_flags.contains(StatusFlags::EVAL));

  let code = parse("return 1;", Options::function()).unwrap();
  assert!(code.status_flags.contains(StatusFlags::FUNCTION));
  assert_eq!(opcode_names(&code), vec!["push_literal", "return", "return_undefined"]);

  let code = parse("1;", Options::eval().strict(true)).unwrap();
  assert!(code.status_flags.contains(StatusFlags::STRICT_MODE));
}

#[test]
fn keywords_as_property_names() {
  assert!(parse("x = o.delete; y = o.in; z = { if: 1, class: 2 };", Options::global()).is_ok());
}

#[test]
fn duplicate_sloppy_parameters_collapse() {
  let code = compile_ok("function f(a, a, b) {}");
  let f = function_literal(&code);
  assert_eq!(f.argument_end, 2);
}

#[test]
fn statement_boundary_invariants_over_a_corpus() {
  let corpus = [
    "var a, b = 1, c = a + b;",
    ";;;",
    "{}",
    "{ var a; { var b; } }",
    "if (a) if (b) c(); else d();",
    "while (a) { if (b) break; else continue; }",
    "do { a--; } while (a > 0);",
    "for (var i = 0, n = f(); i < n; i++) g(i);",
    "for (i = 0; ; ) { if (h(i)) break; }",
    "for (var k in o) { if (k === 'x') continue; p(k); }",
    "outer: for (var i = 0; i < 3; i++) { for (var j in o) { if (j) continue outer; break; } }",
    "switch (x) { case 1: case 2: a(); break; case f(x): b(); default: c(); }",
    "try { risky(); } catch (e) { log(e); } finally { cleanup(); }",
    "try { a(); } catch (e) { try { b(); } finally { c(); } }",
    "with (o) { a = b; }",
    "a: with (o) { for (x in y) break a; }",
    "var s = typeof new Date().getTime;",
    "x = a ? b ? 1 : 2 : c ? 3 : 4;",
    "x = a || b && c | d ^ e & f == g < h << i + j * k;",
    "f(g(h(1), 2), 3)(4)(5);",
    "o.a.b.c = o['a']['b']['c'] += 1;",
    "var v = [1, [2, [3, {}]], {a: {b: [4]}}];",
    "var o = {'a b': 1, 42: 2, 1.5: 3, null: 4};",
    "!function () { return /x/g.test('x'); }();",
    "var f = function g() { return f; };",
    "throw new Error('boom');",
    "debugger;",
    "for (;;) { break; }",
    "while (a) ;",
    "x = (1, 2, 3);",
    "void 0; ~a; +b; -c;",
    "'use strict'; function f() { return this; }",
  ];
  for src in corpus {
    let code = match parse(src, Options::global()) {
      Ok(code) => code,
      Err(e) => panic!("{src:?}: {}", e.report(src, false)),
    };
    // property 1: no unresolved placeholders; every branch lands on an
    // instruction boundary
    if let Err(e) = validate(&code) {
      panic!("{src:?}: {e}");
    }
    for entry in &code.literals {
      if let Literal::Function(f) = &entry.value {
        validate(f).unwrap_or_else(|e| panic!("{src:?} (nested): {e}"));
      }
    }
  }
}

#[test]
fn failing_parses_release_everything() {
  // property 2/3: drop-based cleanup; nothing to observe beyond "no panic"
  let corpus = [
    "if (",
    "while (a { }",
    "switch (x) { case }",
    "try { } catch (",
    "for (var i = 0; i < 10; i++ { }",
    "a = {b: }",
    "f(1, 2",
    "x = [1, 2",
    "do { } while",
    "'use strict'; with (o) {}",
  ];
  for src in corpus {
    assert!(parse(src, Options::global()).is_err(), "{src:?}");
  }
}

#[test]
fn errors_pin_the_offending_token() {
  let src = "var a;\nvar 1;";
  let e = parse(src, Options::global()).unwrap_err();
  assert_eq!(e.kind, ErrorKind::ExpectedIdentifier);
  assert_eq!(e.span.line_col(src), (2, 5));
}

#[test]
fn deeply_nested_statements() {
  let src = indoc! {r#"
    if (a) {
      while (b) {
        switch (c) {
          case 1:
            try {
              for (var i = 0; i < 10; i++) {
                if (d) continue;
                break;
              }
            } catch (e) {
              do { f(); } while (g);
            }
            break;
          default:
            h();
        }
      }
    }
  "#};
  let code = compile_ok(src);
  assert!(code.code.len() > 0);
}

#[test]
fn comma_expression_values() {
  assert_eq!(
    names("x = (a, b);"),
    vec!["push_ident", "pop", "push_ident", "assign_ident", "return_undefined"]
  );
}

#[test]
fn empty_source_compiles() {
  assert_eq!(names(""), vec!["return_undefined"]);
  assert_eq!(names("// only a comment"), vec!["return_undefined"]);
}
