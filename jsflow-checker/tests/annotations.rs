use jsflow_checker::builder::ty;
use jsflow_checker::{AstBuilder, CheckOptions, CheckOutcome, Checker, DiagnosticKind, Doc, Program};

fn check(program: &Program) -> CheckOutcome {
    Checker::new(CheckOptions::default()).check(program, None)
}

fn kinds(outcome: &CheckOutcome) -> Vec<DiagnosticKind> {
    outcome.diagnostics.iter().map(|d| d.kind).collect()
}

#[test]
fn unknown_type_name_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.var_doc(Doc::new().ty(ty::named("Nope")), "x", None)]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::UnrecognizedTypeName]);
    assert!(outcome.diagnostics[0].message.contains("Nope"));
}

#[test]
fn required_parameter_after_optional_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new()
            .param("a", ty::optional(ty::number()))
            .param("b", ty::number()),
        "f",
        &["a", "b"],
        vec![],
    )]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::RequiredAfterOptional]);
}

#[test]
fn rest_parameter_must_come_last() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new()
            .param("xs", ty::rest(ty::number()))
            .param("y", ty::number()),
        "f",
        &["xs", "y"],
        vec![],
    )]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::RestNotLast]);
}

#[test]
fn optional_parameters_widen_the_accepted_arity() {
    // /** @param {number} a @param {number=} b @return {number} */ function f(a, b) { return a; }
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(
            Doc::new()
                .param("a", ty::number())
                .param("b", ty::optional(ty::number()))
                .returns(ty::number()),
            "f",
            &["a", "b"],
            vec![b.ret(Some(b.ident("a")))],
        ),
        b.expr(b.call(b.ident("f"), vec![b.num(1.0)])),
        b.expr(b.call(b.ident("f"), vec![b.num(1.0), b.num(2.0)])),
        b.expr(b.call(b.ident("f"), vec![])),
        b.expr(b.call(b.ident("f"), vec![b.num(1.0), b.num(2.0), b.num(3.0)])),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![
            DiagnosticKind::WrongArgumentCount,
            DiagnosticKind::WrongArgumentCount
        ]
    );
}

#[test]
fn typedef_names_a_record_shape() {
    // /** @typedef {{name: string}} */ var Person;
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.var_doc(
            Doc::new().typedef(ty::record(vec![("name", ty::string())])),
            "Person",
            None,
        ),
        b.function_decl_doc(
            Doc::new()
                .param("p", ty::named("Person"))
                .returns(ty::string()),
            "greet",
            &["p"],
            vec![b.ret(Some(b.member(b.ident("p"), "name")))],
        ),
        b.expr(b.call(b.ident("greet"), vec![b.object(vec![("name", b.str("Ada"))])])),
        b.expr(b.call(b.ident("greet"), vec![b.object(vec![("name", b.num(1.0))])])),
    ]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::InvalidArgumentType]);
}

#[test]
fn cyclic_typedefs_are_reported_once() {
    // /** @typedef {B} */ var A;  /** @typedef {A} */ var B;
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.var_doc(Doc::new().typedef(ty::named("B")), "A", None),
        b.var_doc(Doc::new().typedef(ty::named("A")), "B", None),
    ]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::CyclicTypedef]);
}
