use indexmap::IndexMap;
use jsflow_checker::types::{FunctionType, Type};
use jsflow_checker::{
    AstBuilder, BinaryOperator, CallSite, CheckOptions, Checker, DeferredCheck, DeferredChecks,
    DiagnosticKind, Diagnostics, FunctionSummary, Registry, SourceSpan,
};

fn summaries(id: usize, function: FunctionType) -> IndexMap<usize, FunctionSummary> {
    let mut summaries = IndexMap::new();
    summaries.insert(
        id,
        FunctionSummary {
            id,
            name: "f".to_string(),
            function,
        },
    );
    summaries
}

fn string_call(line: usize) -> DeferredCheck {
    let mut site = CallSite::new(SourceSpan::new(line, 1, line, 10), "f");
    site.argument_spans = vec![SourceSpan::new(line, 3, line, 8)];
    DeferredCheck {
        site,
        callee: 7,
        arguments: vec![Type::string()],
        receiver: None,
    }
}

#[test]
fn replay_checks_against_the_summary() {
    let registry = Registry::new();
    let summaries = summaries(7, FunctionType::new(vec![Type::number()], Type::number()));
    let mut deferred = DeferredChecks::new();
    deferred.defer(string_call(3));

    let mut diagnostics = Diagnostics::new();
    assert_eq!(deferred.replay(&registry, &summaries, &mut diagnostics), 1);
    assert_eq!(diagnostics.count_of(DiagnosticKind::InvalidArgumentType), 1);
    let span = diagnostics.entries()[0].span.expect("argument span");
    assert_eq!(span.column, 3);
}

#[test]
fn replay_drains_the_queue() {
    let registry = Registry::new();
    let summaries = summaries(7, FunctionType::new(vec![Type::number()], Type::number()));
    let mut deferred = DeferredChecks::new();
    deferred.defer(string_call(3));

    let mut diagnostics = Diagnostics::new();
    deferred.replay(&registry, &summaries, &mut diagnostics);
    assert!(deferred.is_empty());
    assert_eq!(deferred.replay(&registry, &summaries, &mut diagnostics), 0);
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn deferring_the_same_site_twice_keeps_one_check() {
    let mut deferred = DeferredChecks::new();
    deferred.defer(string_call(3));
    deferred.defer(string_call(3));
    deferred.defer(string_call(4));

    assert_eq!(deferred.len(), 2);
    assert!(deferred.contains(&SourceSpan::new(3, 1, 3, 10)));
}

#[test]
fn unknown_callee_is_skipped() {
    let registry = Registry::new();
    let mut deferred = DeferredChecks::new();
    deferred.defer(string_call(3));

    let mut diagnostics = Diagnostics::new();
    assert_eq!(deferred.replay(&registry, &IndexMap::new(), &mut diagnostics), 0);
    assert!(diagnostics.is_empty());
}

#[test]
fn checking_twice_gives_identical_diagnostics() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl(
            "f",
            &["x"],
            vec![b.ret(Some(b.binary(BinaryOperator::Subtract, b.ident("x"), b.num(5.0))))],
        ),
        b.expr(b.call(b.ident("f"), vec![b.str("str")])),
        b.expr(b.call(b.ident("f"), vec![b.num(1.0)])),
    ]);
    let checker = Checker::new(CheckOptions::default());

    let first = checker.check(&program, None);
    let second = checker.check(&program, None);
    let render = |outcome: &jsflow_checker::CheckOutcome| {
        outcome
            .diagnostics
            .iter()
            .map(|d| format!("{:?} {:?} {}", d.kind, d.span, d.message))
            .collect::<Vec<_>>()
    };
    assert_eq!(render(&first), render(&second));
    assert_eq!(first.diagnostics.len(), 1);
}

#[test]
fn calls_inside_loops_are_deferred_once() {
    // while (true) { f('str'); }
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl(
            "f",
            &["x"],
            vec![b.ret(Some(b.binary(BinaryOperator::Subtract, b.ident("x"), b.num(5.0))))],
        ),
        b.while_(
            b.boolean(true),
            vec![b.expr(b.call(b.ident("f"), vec![b.str("str")]))],
        ),
    ]);

    let outcome = Checker::new(CheckOptions::default()).check(&program, None);
    assert_eq!(
        outcome
            .diagnostics
            .iter()
            .map(|d| d.kind)
            .collect::<Vec<_>>(),
        vec![DiagnosticKind::InvalidArgumentType]
    );
}
