use indoc::indoc;
use kumo::{compile, ErrorKind, Literal, Options, StatusFlags};

fn check(src: &str) -> kumo::CompiledCode {
  match compile(src, Options::global()) {
    Ok(code) => {
      kumo::bytecode::disasm::validate(&code).unwrap();
      for entry in &code.literals {
        if let Literal::Function(f) = &entry.value {
          kumo::bytecode::disasm::validate(f).unwrap();
        }
      }
      code
    }
    Err(e) => panic!("{}", e.report(src, false)),
  }
}

#[test]
fn fibonacci() {
  let src = indoc! {r#"
    function fib(n) {
      if (n < 2) return n;
      return fib(n - 1) + fib(n - 2);
    }
    var out = [];
    for (var i = 0; i < 10; i++) {
      out[out.length] = fib(i);
    }
  "#};
  let code = check(src);
  assert!(code.literal_end > 0);
  assert!(!code.disassemble().is_empty());
}

#[test]
fn event_emitter() {
  let src = indoc! {r#"
    function Emitter() {
      this.listeners = {};
    }
    Emitter.prototype.on = function (name, fn) {
      var list = this.listeners[name] || (this.listeners[name] = []);
      list[list.length] = fn;
      return this;
    };
    Emitter.prototype.emit = function (name) {
      var list = this.listeners[name];
      if (!list) return false;
      for (var i = 0; i < list.length; i++) {
        try {
          list[i](name);
        } catch (e) {
          continue;
        }
      }
      return true;
    };
    var e = new Emitter();
    e.on('tick', function (name) { count++; }).emit('tick');
  "#};
  check(src);
}

#[test]
fn strict_module_pattern() {
  let src = indoc! {r#"
    'use strict';
    var api = (function () {
      var hidden = 0;
      return {
        get value() { return hidden; },
        set value(v) { hidden = v; },
        bump: function () { return ++hidden; }
      };
    })();
    api.value = 41;
    api.bump();
  "#};
  let code = check(src);
  assert!(code.status_flags.contains(StatusFlags::STRICT_MODE));
}

#[test]
fn tokenizer_in_js() {
  let src = indoc! {r#"
    function tokenize(input) {
      var tokens = [], at = 0, ch;
      while (at < input.length) {
        ch = input.charAt(at);
        switch (ch) {
          case ' ':
          case '\t':
            at++;
            continue;
          case '(':
          case ')':
            tokens[tokens.length] = { kind: ch, at: at++ };
            break;
          default:
            if (/[0-9]/.test(ch)) {
              var start = at;
              do {
                at++;
              } while (at < input.length && /[0-9]/.test(input.charAt(at)));
              tokens[tokens.length] = { kind: 'num', value: +input.slice(start, at) };
            } else {
              throw new Error('unexpected character ' + ch);
            }
        }
      }
      return tokens;
    }
  "#};
  check(src);
}

#[test]
fn labelled_matrix_scan() {
  let src = indoc! {r#"
    var found = null;
    scan: for (var i = 0; i < grid.length; i++) {
      for (var j = 0; j < grid[i].length; j++) {
        if (grid[i][j] === needle) {
          found = [i, j];
          break scan;
        }
        if (grid[i][j] == null) continue scan;
      }
    }
  "#};
  check(src);
}

#[test]
fn eval_code_inherits_strictness() {
  let err = compile("with (o) {}", Options::eval().strict(true)).unwrap_err();
  assert_eq!(err.kind, ErrorKind::WithInStrictMode);
  assert!(compile("with (o) {}", Options::eval()).is_ok());
}

#[test]
fn error_reports_render_a_snippet() {
  let src = "var x = 1;\nvar y = *;\n";
  let err = compile(src, Options::global()).unwrap_err();
  let report = err.report(src, false);
  assert!(report.contains("2:9"), "{report}");
  assert!(report.contains('*'), "{report}");
}

#[test]
fn disassembly_round_trips_every_instruction() {
  let src = indoc! {r#"
    var total = 0;
    outer: for (var k in data) {
      with (data[k]) {
        try {
          total += value / (count || 1);
        } catch (e) {
          delete data[k];
          continue outer;
        } finally {
          total++;
        }
      }
    }
  "#};
  let code = check(src);
  let disasm = code.disassemble();
  // one line per instruction, each carrying its offset
  assert!(disasm.lines().count() > 10);
  assert!(disasm.contains("for_in_create_context"));
  assert!(disasm.contains("with_create_context"));
  assert!(disasm.contains("try_create_context"));
  assert!(disasm.contains("jump_forward_exit_context"));
}
