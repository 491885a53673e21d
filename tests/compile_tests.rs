//! Integration tests for the `compile` pipeline.

use schemy_core::{
    compile,
    host::{Host, TestHost},
    intern::SymbolId,
    value::Value,
    CompileError, CompileResult, CompiledProcedure, MacroExpander, NoopExpander, Opcode, Warning,
    WarningSink,
};

#[derive(Debug, Default)]
struct CollectingWarnings(Vec<Warning>);

impl WarningSink for CollectingWarnings {
    fn warn(&mut self, warning: Warning) {
        self.0.push(warning);
    }
}

fn sym(host: &mut TestHost, name: &str) -> Value {
    Value::symbol(host.intern(name))
}

fn form(items: Vec<Value>) -> Value {
    Value::list(items)
}

#[test]
fn noop_expander_passes_the_form_through_unchanged() {
    let mut host = TestHost::new();
    let mut expander = NoopExpander;
    let mut warnings = CollectingWarnings::default();
    let lib = Value::Bool(false);

    let CompiledProcedure { irep } =
        compile(&mut host, &mut expander, &mut warnings, &Value::Int(42), &lib).expect("compiles");

    assert_eq!(irep.code, vec![Opcode::Pushint(42), Opcode::Ret(1)]);
}

/// Stands in for a macro expander that rewrites `(twice x)` to `(+ x x)`
/// before analysis ever sees it, the way a real `syntax-rules` expansion
/// would run ahead of the analyzer. Its renamed output
/// symbols are interned up front, the way a real expander's rename table
/// would already hold them rather than interning mid-expansion.
struct TwiceExpander {
    twice: SymbolId,
    plus: SymbolId,
}

impl MacroExpander for TwiceExpander {
    fn expand(&mut self, expr: &Value, _lib: &Value) -> CompileResult<Value> {
        let (Some(head), Some(rest)) = (expr.car(), expr.cdr()) else {
            return Ok(expr.clone());
        };
        if head.as_symbol() != Some(self.twice) {
            return Ok(expr.clone());
        }
        let Some(x) = rest.car() else {
            return Ok(expr.clone());
        };
        Ok(Value::list(vec![Value::symbol(self.plus), x.clone(), x.clone()]))
    }
}

#[test]
fn a_macro_expander_runs_before_analysis_sees_the_form() {
    // This test only needs `compile` to actually call `expander.expand` with
    // the unexpanded form, and to feed its result (not the original) into
    // analysis. `TwiceExpander` rewrites `(twice 5)` into `(+ 5 5)` before
    // analysis, so a correctly-wired `compile` never even reaches analysis
    // with a bare `twice` symbol -- if it did, analysis would fail with an
    // unbound variable, since `twice` is not part of the base library.
    let mut host = TestHost::new();
    let twice = host.intern("twice");
    let plus = host.find_rename("+").expect("+ is a base library name");
    let mut expander = TwiceExpander { twice, plus };
    let mut warnings = CollectingWarnings::default();
    let lib = Value::Bool(false);
    let expr = form(vec![Value::symbol(twice), Value::Int(5)]);

    let CompiledProcedure { irep } =
        compile(&mut host, &mut expander, &mut warnings, &expr, &lib).expect("expansion removes the unbound `twice`");

    assert_eq!(irep.code, vec![Opcode::Pushint(5), Opcode::Pushint(5), Opcode::Add, Opcode::Ret(1)]);
}

/// A macro expander that always fails, to verify `compile` propagates the
/// expander's error without ever reaching analysis or codegen.
struct FailingExpander;

impl MacroExpander for FailingExpander {
    fn expand(&mut self, _expr: &Value, _lib: &Value) -> CompileResult<Value> {
        Err(CompileError::syntax("macro expansion blew up"))
    }
}

#[test]
fn an_expander_error_short_circuits_before_analysis() {
    let mut host = TestHost::new();
    let mut expander = FailingExpander;
    let mut warnings = CollectingWarnings::default();
    let lib = Value::Bool(false);

    let err = compile(&mut host, &mut expander, &mut warnings, &Value::Int(1), &lib)
        .expect_err("a failing expander must fail the whole compile");
    assert!(matches!(err, CompileError::Syntax { .. }));
}

#[test]
fn an_unbound_variable_from_analysis_propagates_through_compile() {
    let mut host = TestHost::new();
    let mut expander = NoopExpander;
    let mut warnings = CollectingWarnings::default();
    let lib = Value::Bool(false);
    let expr = sym(&mut host, "nowhere-bound");

    let err = compile(&mut host, &mut expander, &mut warnings, &expr, &lib)
        .expect_err("an unbound variable in the expanded form must fail compile");
    assert!(matches!(err, CompileError::UnboundVariable { .. }));
}

#[test]
fn a_warning_raised_during_analysis_reaches_the_caller_sink() {
    let mut host = TestHost::new();
    let mut expander = NoopExpander;
    let mut warnings = CollectingWarnings::default();
    let lib = Value::Bool(false);
    let x_name = host.intern("x");
    let redefine = form(vec![
        sym(&mut host, "begin"),
        form(vec![sym(&mut host, "define"), Value::symbol(x_name), Value::Int(1)]),
        form(vec![sym(&mut host, "define"), Value::symbol(x_name), Value::Int(2)]),
    ]);

    compile(&mut host, &mut expander, &mut warnings, &redefine, &lib).expect("redefinition only warns");
    assert_eq!(warnings.0.len(), 1);
    assert!(matches!(warnings.0[0], Warning::RedefiningVariable { .. }));
}
