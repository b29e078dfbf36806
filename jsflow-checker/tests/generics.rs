use jsflow_checker::builder::ty;
use jsflow_checker::{AstBuilder, CheckOptions, CheckOutcome, Checker, DiagnosticKind, Doc, Program};

fn check(program: &Program) -> CheckOutcome {
    Checker::new(CheckOptions::default()).check(program, None)
}

fn kinds(outcome: &CheckOutcome) -> Vec<DiagnosticKind> {
    outcome.diagnostics.iter().map(|d| d.kind).collect()
}

fn identity_doc() -> Doc {
    Doc::new()
        .template("T")
        .param("x", ty::named("T"))
        .returns(ty::named("T"))
}

#[test]
fn conflicting_bindings_report_not_unique_instantiation() {
    // /** @template T @param {T} a @param {T} b @return {T} */ function same(a, b) { return a; }
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(
            Doc::new()
                .template("T")
                .param("a", ty::named("T"))
                .param("b", ty::named("T"))
                .returns(ty::named("T")),
            "same",
            &["a", "b"],
            vec![b.ret(Some(b.ident("a")))],
        ),
        b.expr(b.call(b.ident("same"), vec![b.num(1.0), b.str("a")])),
    ]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::NotUniqueInstantiation]);
    assert!(outcome.diagnostics[0].message.contains("T"));
}

#[test]
fn related_bindings_take_the_wider_type() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(
            Doc::new()
                .template("T")
                .param("a", ty::named("T"))
                .param("b", ty::named("T"))
                .returns(ty::named("T")),
            "same",
            &["a", "b"],
            vec![b.ret(Some(b.ident("a")))],
        ),
        b.expr(b.call(
            b.ident("same"),
            vec![b.num(1.0), b.cast(ty::nullable(ty::number()), b.num(2.0))],
        )),
    ]);

    assert!(check(&program).diagnostics.is_empty());
}

#[test]
fn return_type_is_instantiated_at_the_call() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(identity_doc(), "identity", &["x"], vec![b.ret(Some(b.ident("x")))]),
        b.var_doc(
            Doc::new().ty(ty::string()),
            "fine",
            Some(b.call(b.ident("identity"), vec![b.str("a")])),
        ),
        b.var_doc(
            Doc::new().ty(ty::string()),
            "wrong",
            Some(b.call(b.ident("identity"), vec![b.num(1.0)])),
        ),
    ]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::MistypedAssignRhs]);
}

#[test]
fn type_arguments_on_non_generic_type_are_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(Doc::new().constructor(), "Plain", &[], vec![]),
        b.var_doc(
            Doc::new().ty(ty::generic("Plain", vec![ty::number()])),
            "p",
            None,
        ),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::GenericArgumentsOnNonGenericType]
    );
}

#[test]
fn wrong_number_of_type_arguments_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.var_doc(
        Doc::new().ty(ty::generic("Array", vec![ty::number(), ty::string()])),
        "pairs",
        None,
    )]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::WrongTypeArgumentCount]
    );
}

#[test]
fn array_element_type_checks_index_assignment() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.var_doc(
            Doc::new().ty(ty::generic("Array", vec![ty::number()])),
            "xs",
            Some(b.array(vec![b.num(1.0), b.num(2.0)])),
        ),
        b.expr(b.assign(b.index(b.ident("xs"), b.num(0.0)), b.str("three"))),
    ]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::MistypedAssignRhs]);
}
