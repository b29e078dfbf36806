use jsflow_checker::builder::ty;
use jsflow_checker::{
    AstBuilder, BinaryOperator, CheckOptions, CheckOutcome, Checker, DiagnosticKind, Doc, Program,
};

fn check(program: &Program) -> CheckOutcome {
    Checker::new(CheckOptions::default()).check(program, None)
}

fn kinds(outcome: &CheckOutcome) -> Vec<DiagnosticKind> {
    outcome.diagnostics.iter().map(|d| d.kind).collect()
}

fn nullable_named() -> jsflow_checker::TypeAnnotation {
    ty::nullable(ty::record(vec![("name", ty::string())]))
}

#[test]
fn typeof_guard_narrows_both_branches() {
    // function f(v) { if (typeof v === 'string') { return 0; } return v; }
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new()
            .param("v", ty::union(vec![ty::number(), ty::string()]))
            .returns(ty::number()),
        "f",
        &["v"],
        vec![
            b.if_(
                b.binary(BinaryOperator::StrictEqual, b.typeof_(b.ident("v")), b.str("string")),
                vec![b.ret(Some(b.num(0.0)))],
                None,
            ),
            b.ret(Some(b.ident("v"))),
        ],
    )]);

    assert!(check(&program).diagnostics.is_empty());
}

#[test]
fn union_returned_without_guard_is_a_mismatch() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new()
            .param("v", ty::union(vec![ty::number(), ty::string()]))
            .returns(ty::number()),
        "f",
        &["v"],
        vec![b.ret(Some(b.ident("v")))],
    )]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::ReturnTypeMismatch]);
}

#[test]
fn truthiness_check_removes_null() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().param("p", nullable_named()).returns(ty::string()),
        "nameOf",
        &["p"],
        vec![
            b.if_(b.ident("p"), vec![b.ret(Some(b.member(b.ident("p"), "name")))], None),
            b.ret(Some(b.str(""))),
        ],
    )]);

    assert!(check(&program).diagnostics.is_empty());
}

#[test]
fn unguarded_nullable_read_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().param("p", nullable_named()).returns(ty::string()),
        "nameOf",
        &["p"],
        vec![b.ret(Some(b.member(b.ident("p"), "name")))],
    )]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::NullableDereference]);
}

#[test]
fn strict_null_comparison_narrows_else_branch() {
    // if (p === null) { return ''; } else { return p.name; }
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().param("p", nullable_named()).returns(ty::string()),
        "nameOf",
        &["p"],
        vec![b.if_(
            b.binary(BinaryOperator::StrictEqual, b.ident("p"), b.null()),
            vec![b.ret(Some(b.str("")))],
            Some(vec![b.ret(Some(b.member(b.ident("p"), "name")))]),
        )],
    )]);

    assert!(check(&program).diagnostics.is_empty());
}

#[test]
fn logical_and_guards_the_right_operand() {
    // return p && p.name; the result may still be null
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().param("p", nullable_named()).returns(ty::string()),
        "nameOf",
        &["p"],
        vec![b.ret(Some(b.and(b.ident("p"), b.member(b.ident("p"), "name"))))],
    )]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::ReturnTypeMismatch]);
}

#[test]
fn loop_condition_narrows_body_across_rounds() {
    // var n = 0; while (p !== null) { n = n + p.size; p = null; } return n;
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new()
            .param("p", ty::nullable(ty::record(vec![("size", ty::number())])))
            .returns(ty::number()),
        "total",
        &["p"],
        vec![
            b.var("n", Some(b.num(0.0))),
            b.while_(
                b.binary(BinaryOperator::StrictNotEqual, b.ident("p"), b.null()),
                vec![
                    b.expr(b.assign(
                        b.ident("n"),
                        b.binary(BinaryOperator::Add, b.ident("n"), b.member(b.ident("p"), "size")),
                    )),
                    b.expr(b.assign(b.ident("p"), b.null())),
                ],
            ),
            b.ret(Some(b.ident("n"))),
        ],
    )]);

    assert!(check(&program).diagnostics.is_empty());
}

#[test]
fn counting_loop_reaches_a_fixpoint_without_errors() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().returns(ty::number()),
        "count",
        &[],
        vec![
            b.var("i", Some(b.num(0.0))),
            b.while_(
                b.binary(BinaryOperator::Less, b.ident("i"), b.num(10.0)),
                vec![b.expr(b.assign(
                    b.ident("i"),
                    b.binary(BinaryOperator::Add, b.ident("i"), b.num(1.0)),
                ))],
            ),
            b.ret(Some(b.ident("i"))),
        ],
    )]);

    assert!(check(&program).diagnostics.is_empty());
}

#[test]
fn value_assigned_in_loop_is_seen_after_it() {
    // var s = 0; while (flag) { s = 'done'; } return s;
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().param("flag", ty::boolean()).returns(ty::number()),
        "after",
        &["flag"],
        vec![
            b.var("s", Some(b.num(0.0))),
            b.while_(b.ident("flag"), vec![b.expr(b.assign(b.ident("s"), b.str("done")))]),
            b.ret(Some(b.ident("s"))),
        ],
    )]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::ReturnTypeMismatch]);
}

#[test]
fn instanceof_with_non_constructor_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().param("x", ty::any()),
        "test",
        &["x"],
        vec![b.if_(
            b.binary(BinaryOperator::Instanceof, b.ident("x"), b.num(3.0)),
            vec![],
            None,
        )],
    )]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::InvalidInstanceofTarget]
    );
}

/// `/** @return {number} */ function t() { var x = 0; try { ... } catch (e) { return x; } return x; }`
fn try_returning_from_catch(b: &AstBuilder, body: Vec<jsflow_checker::Statement>) -> Program {
    b.program(vec![b.function_decl_doc(
        Doc::new().returns(ty::number()),
        "t",
        &[],
        vec![
            b.var("x", Some(b.num(0.0))),
            b.try_(body, Some((Some("e"), vec![b.ret(Some(b.ident("x")))])), None),
            b.ret(Some(b.ident("x"))),
        ],
    )])
}

#[test]
fn catch_sees_every_intermediate_state_of_the_try_block() {
    let b = AstBuilder::new();
    let program = try_returning_from_catch(
        &b,
        vec![
            b.expr(b.assign(b.ident("x"), b.str("a"))),
            b.expr(b.assign(b.ident("x"), b.num(1.0))),
        ],
    );

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::ReturnTypeMismatch]);
}

#[test]
fn catch_of_a_type_preserving_try_is_clean() {
    let b = AstBuilder::new();
    let program = try_returning_from_catch(&b, vec![b.expr(b.assign(b.ident("x"), b.num(1.0)))]);

    assert!(check(&program).diagnostics.is_empty());
}

/// `switch (n) { case 1: r = 'one'; [break;] case 2: return r; default: return 0; }`
fn switch_on_number(b: &AstBuilder, break_after_first: bool) -> Program {
    let mut first = vec![b.expr(b.assign(b.ident("r"), b.str("one")))];
    if break_after_first {
        first.push(b.break_());
    }
    b.program(vec![b.function_decl_doc(
        Doc::new().param("n", ty::number()).returns(ty::number()),
        "s",
        &["n"],
        vec![
            b.var("r", Some(b.num(0.0))),
            b.switch(
                b.ident("n"),
                vec![
                    (Some(b.num(1.0)), first),
                    (Some(b.num(2.0)), vec![b.ret(Some(b.ident("r")))]),
                    (None, vec![b.ret(Some(b.num(0.0)))]),
                ],
            ),
            b.ret(Some(b.num(0.0))),
        ],
    )])
}

#[test]
fn switch_fallthrough_carries_assignments_into_the_next_case() {
    let b = AstBuilder::new();
    assert_eq!(
        kinds(&check(&switch_on_number(&b, false))),
        vec![DiagnosticKind::ReturnTypeMismatch]
    );
}

#[test]
fn break_stops_switch_fallthrough() {
    let b = AstBuilder::new();
    assert!(check(&switch_on_number(&b, true)).diagnostics.is_empty());
}
