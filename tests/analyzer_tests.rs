//! Integration tests for the analyzer.

use schemy_core::{
    analyze,
    ast::{Node, VarRef},
    error::{CollectingWarnings, CompileError, Warning},
    host::{Host, TestHost},
    value::Value,
};

fn sym(host: &mut TestHost, name: &str) -> Value {
    Value::symbol(host.intern(name))
}

/// A symbol already bound in the simulated global environment, so a bare
/// reference to it resolves instead of raising `unbound-variable`.
fn global(host: &mut TestHost, name: &str) -> Value {
    Value::symbol(host.declare_global(name))
}

fn form(items: Vec<Value>) -> Value {
    Value::list(items)
}

#[test]
fn bare_self_evaluating_literal_at_top_level_wraps_in_return() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let expr = Value::Int(42);

    let program = analyze(&mut host, &mut warnings, &expr).expect("analysis should succeed");

    match program.root {
        Node::Return(values) => {
            assert_eq!(values.len(), 1);
            assert!(matches!(values[0], Node::Quote(Value::Int(42))));
        }
        other => panic!("expected a top-level RETURN wrapper, got {other:?}"),
    }
    assert!(program.lambdas.is_empty());
}

#[test]
fn top_level_define_classifies_as_global_not_local() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let x = sym(&mut host, "x");
    let expr = form(vec![sym(&mut host, "define"), x, Value::Int(7)]);

    let program = analyze(&mut host, &mut warnings, &expr).expect("analysis should succeed");

    match program.root {
        Node::Return(values) => match &values[0] {
            Node::Setbang(VarRef::Global(_), value) => {
                assert!(matches!(**value, Node::Quote(Value::Int(7))));
            }
            other => panic!("expected a global SETBANG, got {other:?}"),
        },
        other => panic!("expected the SETBANG wrapped in a top-level RETURN, got {other:?}"),
    }
}

#[test]
fn if_with_missing_else_defaults_to_false() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let expr = form(vec![sym(&mut host, "if"), Value::Bool(true), Value::Int(1)]);

    let program = analyze(&mut host, &mut warnings, &expr).expect("analysis should succeed");

    match program.root {
        Node::If(_, _, else_branch) => match *else_branch {
            Node::Return(values) => assert!(matches!(values[0], Node::Quote(Value::Bool(false)))),
            other => panic!("expected the missing else to normalize to a tail #f, got {other:?}"),
        },
        other => panic!("expected an IF node, got {other:?}"),
    }
}

#[test]
fn lambda_form_defers_and_fills_the_arena_by_the_time_analysis_returns() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let x = sym(&mut host, "x");
    let lambda = form(vec![sym(&mut host, "lambda"), form(vec![x.clone()]), x]);

    let program = analyze(&mut host, &mut warnings, &lambda).expect("analysis should succeed");

    let id = match program.root {
        Node::Return(values) => match values[0] {
            Node::Lambda(id) => id,
            ref other => panic!("expected a LAMBDA node, got {other:?}"),
        },
        ref other => panic!("expected a top-level RETURN wrapper, got {other:?}"),
    };
    let lambda_node = program.lambdas.get(id);
    assert_eq!(lambda_node.args.len(), 1);
    assert!(!lambda_node.varg);
    assert!(matches!(*lambda_node.body, Node::Return(_)));
}

#[test]
fn nested_lambda_captures_an_outer_argument() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let x = sym(&mut host, "x");
    // (lambda (x) (lambda () x))
    let inner = form(vec![sym(&mut host, "lambda"), form(vec![]), x.clone()]);
    let outer = form(vec![sym(&mut host, "lambda"), form(vec![x]), inner]);

    let program = analyze(&mut host, &mut warnings, &outer).expect("analysis should succeed");

    let outer_id = match program.root {
        Node::Return(ref values) => match values[0] {
            Node::Lambda(id) => id,
            ref other => panic!("expected a LAMBDA node, got {other:?}"),
        },
        ref other => panic!("expected a top-level RETURN wrapper, got {other:?}"),
    };
    let outer_node = program.lambdas.get(outer_id);
    let inner_id = match *outer_node.body {
        Node::Return(ref values) => match values[0] {
            Node::Lambda(id) => id,
            ref other => panic!("expected the inner LAMBDA node, got {other:?}"),
        },
        ref other => panic!("expected the outer body to be a tail RETURN, got {other:?}"),
    };
    let inner_node = program.lambdas.get(inner_id);
    match *inner_node.body {
        Node::Return(ref values) => assert!(matches!(values[0], Node::Cref { depth: 1, .. })),
        ref other => panic!("expected the inner body to be a tail RETURN, got {other:?}"),
    }
    // The capture is recorded on the binding frame (outer), which exposes x
    // in its own capture area for inner to read, not on
    // inner, which does no binding of its own that anything captures.
    assert_eq!(outer_node.captures.len(), 1);
    assert!(inner_node.captures.is_empty());
}

#[test]
fn shadowing_a_primitive_name_compiles_to_a_call_not_the_primitive_node() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    // A real macro expander would alpha-rename a shadowing `(lambda (cons)
    // ...)`'s bound `cons` away from the base library's `cons`, so the two
    // occurrences below are already distinct symbols, the way an expanded
    // form would reach the analyzer. `shadowed_cons` stands in for that
    // renamed identity.
    let shadowed_cons = sym(&mut host, "cons%1");
    // ((lambda (cons%1) (cons%1 1 2)) list)
    let body = form(vec![shadowed_cons.clone(), Value::Int(1), Value::Int(2)]);
    let shadowing_lambda = form(vec![sym(&mut host, "lambda"), form(vec![shadowed_cons]), body]);
    let expr = form(vec![shadowing_lambda, global(&mut host, "list")]);

    let program = analyze(&mut host, &mut warnings, &expr).expect("analysis should succeed");

    // The whole expression is in tail position at the top level, so this is
    // a TAILCALL rather than a RETURN-wrapped CALL.
    let lambda_id = match program.root {
        Node::Tailcall(ref callee, _) => match **callee {
            Node::Lambda(id) => id,
            ref other => panic!("expected the callee to be the shadowing lambda, got {other:?}"),
        },
        ref other => panic!("expected the outer application to be a TAILCALL, got {other:?}"),
    };
    let lambda_node = program.lambdas.get(lambda_id);
    assert!(
        matches!(*lambda_node.body, Node::Tailcall(..)),
        "a call to the shadowed name must be a TAILCALL, never a CONS node: {:?}",
        lambda_node.body
    );
}

#[test]
fn rest_argument_occupies_the_first_local_slot() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let rest = sym(&mut host, "rest");
    let lambda = form(vec![sym(&mut host, "lambda"), rest.clone(), rest]);

    let program = analyze(&mut host, &mut warnings, &lambda).expect("analysis should succeed");

    let id = match program.root {
        Node::Return(ref values) => match values[0] {
            Node::Lambda(id) => id,
            ref other => panic!("expected a LAMBDA node, got {other:?}"),
        },
        ref other => panic!("expected a top-level RETURN wrapper, got {other:?}"),
    };
    let lambda_node = program.lambdas.get(id);
    assert!(lambda_node.varg);
    assert!(lambda_node.args.is_empty());
    assert_eq!(lambda_node.locals.len(), 1, "the rest-arg symbol must land in locals, not args");
}

#[test]
fn unary_predicate_rejects_arity_other_than_one() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let expr = form(vec![sym(&mut host, "car"), Value::Int(1), Value::Int(2)]);

    let err = analyze(&mut host, &mut warnings, &expr).expect_err("car with two arguments must fail");
    assert!(matches!(err, CompileError::WrongNumberOfArguments { .. }));
}

#[test]
fn comparison_falls_back_to_a_generic_call_outside_two_arguments() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    // (< 1 2 3) -- three operands, no 3-ary `<` intrinsic exists.
    let expr = form(vec![sym(&mut host, "<"), Value::Int(1), Value::Int(2), Value::Int(3)]);

    let program = analyze(&mut host, &mut warnings, &expr).expect("falls back to a call, doesn't error");

    assert!(matches!(program.root, Node::Tailcall(..)), "expected a tail call to the `<` procedure, got {:?}", program.root);
}

#[test]
fn unbound_variable_is_reported_by_name() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let expr = sym(&mut host, "nowhere-bound");

    let err = analyze(&mut host, &mut warnings, &expr).expect_err("an unbound variable must fail");
    match err {
        CompileError::UnboundVariable { msg } => assert_eq!(msg.as_ref(), "nowhere-bound"),
        other => panic!("expected UnboundVariable, got {other:?}"),
    }
}

#[test]
fn redefining_a_variable_in_the_same_scope_warns_without_erroring() {
    let mut host = TestHost::new();
    let mut warnings = CollectingWarnings::new();
    let x_name = host.intern("x");
    let redefine = form(vec![
        sym(&mut host, "begin"),
        form(vec![sym(&mut host, "define"), Value::symbol(x_name), Value::Int(1)]),
        form(vec![sym(&mut host, "define"), Value::symbol(x_name), Value::Int(2)]),
    ]);

    analyze(&mut host, &mut warnings, &redefine).expect("redefinition is a warning, not an error");
    assert_eq!(warnings.as_slice(), [Warning::RedefiningVariable { name: x_name }]);
}
