use jsflow_checker::builder::ty;
use jsflow_checker::{
    AstBuilder, BinaryOperator, CheckOptions, CheckOutcome, Checker, DiagnosticKind,
    DiagnosticLevel, Doc, InputMode, Program,
};
use jsflow_checker::types::ObjectType;

fn check(program: &Program) -> CheckOutcome {
    Checker::new(CheckOptions::default()).check(program, None)
}

fn kinds(outcome: &CheckOutcome) -> Vec<DiagnosticKind> {
    outcome.diagnostics.iter().map(|d| d.kind).collect()
}

#[test]
fn rejects_string_assigned_to_number_variable() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.var_doc(
        Doc::new().ty(ty::number()),
        "x",
        Some(b.str("str")),
    )]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::MistypedAssignRhs]);
    let message = &outcome.diagnostics[0].message;
    assert!(
        message.contains("string") && message.contains("number"),
        "expected both types in the message, found {message:?}"
    );
}

#[test]
fn inferred_parameter_type_flags_bad_call_exactly_once() {
    // function f(x) { return x - 5; }  f('str');
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl(
            "f",
            &["x"],
            vec![b.ret(Some(b.binary(BinaryOperator::Subtract, b.ident("x"), b.num(5.0))))],
        ),
        b.expr(b.call(b.ident("f"), vec![b.str("str")])),
    ]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::InvalidArgumentType]);

    let summary = outcome.summary_named("f").expect("f is summarized");
    assert_eq!(summary.function.required.len(), 1);
    assert!(summary.function.required[0].is_number());
}

#[test]
fn declared_call_checked_without_deferral() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(
            Doc::new().param("n", ty::number()).returns(ty::number()),
            "double",
            &["n"],
            vec![b.ret(Some(b.binary(BinaryOperator::Multiply, b.ident("n"), b.num(2.0))))],
        ),
        b.expr(b.call(b.ident("double"), vec![b.boolean(true)])),
    ]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::InvalidArgumentType]);
}

#[test]
fn reports_wrong_argument_count() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(
            Doc::new().param("n", ty::number()).returns(ty::number()),
            "id",
            &["n"],
            vec![b.ret(Some(b.ident("n")))],
        ),
        b.expr(b.call(b.ident("id"), vec![b.num(1.0), b.num(2.0)])),
    ]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::WrongArgumentCount]);
}

#[test]
fn reports_return_type_mismatch() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().returns(ty::number()),
        "name",
        &[],
        vec![b.ret(Some(b.str("bob")))],
    )]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::ReturnTypeMismatch]);
}

#[test]
fn reports_missing_return_statement() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().param("flag", ty::boolean()).returns(ty::number()),
        "pick",
        &["flag"],
        vec![b.if_(b.ident("flag"), vec![b.ret(Some(b.num(1.0)))], None)],
    )]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::MissingReturnStatement]);
}

#[test]
fn arithmetic_on_string_operand_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.var("s", Some(b.str("a"))),
        b.var("n", Some(b.binary(BinaryOperator::Multiply, b.ident("s"), b.num(2.0)))),
    ]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::InvalidOperandType]);
}

#[test]
fn string_concatenation_is_accepted() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.var_doc(
        Doc::new().ty(ty::string()),
        "label",
        Some(b.binary(BinaryOperator::Add, b.str("n = "), b.num(3.0))),
    )]);

    assert!(check(&program).diagnostics.is_empty());
}

#[test]
fn reports_undeclared_name() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.expr(b.call(b.ident("missing"), vec![]))]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::UndefinedName]);
}

#[test]
fn reports_const_reassignment() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.var_doc(Doc::new().constant(), "LIMIT", Some(b.num(1.0))),
        b.expr(b.assign(b.ident("LIMIT"), b.num(2.0))),
    ]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::ConstReassigned]);
}

#[test]
fn suppress_annotation_silences_enclosed_diagnostics() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().suppress("checkTypes"),
        "quiet",
        &[],
        vec![b.var_doc(Doc::new().ty(ty::number()), "x", Some(b.str("a")))],
    )]);

    assert!(check(&program).diagnostics.is_empty());
}

#[test]
fn diagnostics_are_sorted_by_position() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.var_doc(Doc::new().ty(ty::number()), "a", Some(b.str("a"))),
        b.var_doc(Doc::new().ty(ty::string()), "b", Some(b.num(1.0))),
    ]);

    let outcome = check(&program);
    assert_eq!(outcome.diagnostics.len(), 2);
    let lines: Vec<usize> = outcome
        .diagnostics
        .iter()
        .map(|d| d.span.expect("flow diagnostics carry spans").line)
        .collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
}

#[test]
fn property_uses_type_an_inferred_record_parameter() {
    // function lo(o) { return o.a - 1; }  lo({a: 'x'});  lo({a: 2});
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl(
            "lo",
            &["o"],
            vec![b.ret(Some(b.binary(
                BinaryOperator::Subtract,
                b.member(b.ident("o"), "a"),
                b.num(1.0),
            )))],
        ),
        b.expr(b.call(b.ident("lo"), vec![b.object(vec![("a", b.str("x"))])])),
        b.expr(b.call(b.ident("lo"), vec![b.object(vec![("a", b.num(2.0))])])),
    ]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::InvalidArgumentType]);
    let summary = outcome.summary_named("lo").expect("lo is summarized");
    match summary.function.required[0].objects() {
        [ObjectType::Record(record)] => {
            assert!(record.loose);
            assert!(record.properties["a"].ty.is_number());
        }
        other => panic!("expected one loose record, found {other:?}"),
    }
}

#[test]
fn called_property_must_be_a_function() {
    // function run(o) { return o.go(); }  run({go: 1});
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl(
            "run",
            &["o"],
            vec![b.ret(Some(b.call(b.member(b.ident("o"), "go"), vec![])))],
        ),
        b.expr(b.call(b.ident("run"), vec![b.object(vec![("go", b.num(1.0))])])),
    ]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::InvalidArgumentType]);
}

#[test]
fn returns_from_provisional_loop_rounds_do_not_widen_the_summary() {
    // function g(c) { var x = 0; while (c) { if (c) { return x + 1; } x = 'a'; } return 'z'; }
    // The first round sees x as a number, the settled state as number|string.
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl(
        "g",
        &["c"],
        vec![
            b.var("x", Some(b.num(0.0))),
            b.while_(
                b.ident("c"),
                vec![
                    b.if_(
                        b.ident("c"),
                        vec![b.ret(Some(b.binary(BinaryOperator::Add, b.ident("x"), b.num(1.0))))],
                        None,
                    ),
                    b.expr(b.assign(b.ident("x"), b.str("a"))),
                ],
            ),
            b.ret(Some(b.str("z"))),
        ],
    )]);

    let outcome = check(&program);
    assert!(outcome.diagnostics.is_empty());
    let summary = outcome.summary_named("g").expect("g is summarized");
    assert!(summary.function.return_type.is_string());
}

/// `function f(a, b) { return a; }  f(1);`
fn short_call() -> Program {
    let b = AstBuilder::new();
    b.program(vec![
        b.function_decl("f", &["a", "b"], vec![b.ret(Some(b.ident("a")))]),
        b.expr(b.call(b.ident("f"), vec![b.num(1.0)])),
    ])
}

#[test]
fn undeclared_parameters_are_required_by_default() {
    assert_eq!(kinds(&check(&short_call())), vec![DiagnosticKind::WrongArgumentCount]);
}

#[test]
fn legacy_mode_relaxes_arity_of_undeclared_parameters() {
    let options = CheckOptions {
        legacy_compatibility: true,
        ..CheckOptions::default()
    };
    let outcome = Checker::new(options).check(&short_call(), None);
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn unknown_types_are_reported_only_when_asked() {
    // /** @param {?} v */ function f(v) { return v; }
    let b = AstBuilder::new();
    let program = b.program(vec![b.function_decl_doc(
        Doc::new().param("v", ty::unknown()),
        "f",
        &["v"],
        vec![b.ret(Some(b.ident("v")))],
    )]);

    assert!(check(&program).diagnostics.is_empty());

    let options = CheckOptions {
        report_unknown_types: true,
        ..CheckOptions::default()
    };
    let outcome = Checker::new(options).check(&program, None);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::UnknownExpressionType]);
    assert_eq!(outcome.diagnostics[0].level, DiagnosticLevel::Warning);
    assert!(!outcome.has_errors());
}

#[test]
fn mixed_mode_flags_es6_syntax() {
    // let total = 0;  var f = () => 1;
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.let_("total", Some(b.num(0.0))),
        b.var("f", Some(b.arrow(&[], vec![b.ret(Some(b.num(1.0)))]))),
    ]);

    assert!(check(&program).diagnostics.is_empty());

    let options = CheckOptions {
        input_mode: InputMode::Mixed,
        ..CheckOptions::default()
    };
    let outcome = Checker::new(options).check(&program, None);
    assert_eq!(
        kinds(&outcome),
        vec![
            DiagnosticKind::RequiresTranspilation,
            DiagnosticKind::RequiresTranspilation
        ]
    );
    assert!(!outcome.has_errors());
}
