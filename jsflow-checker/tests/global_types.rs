use jsflow_checker::builder::ty;
use jsflow_checker::{
    AccessDiscipline, AstBuilder, CheckOptions, CheckOutcome, Checker, DiagnosticKind, Doc,
    Program, Statement,
};

fn check(program: &Program) -> CheckOutcome {
    Checker::new(CheckOptions::default()).check(program, None)
}

fn kinds(outcome: &CheckOutcome) -> Vec<DiagnosticKind> {
    outcome.diagnostics.iter().map(|d| d.kind).collect()
}

/// `/** @constructor */ function Dog() {}` plus a `feed(number)` method.
fn dog(b: &AstBuilder) -> Vec<Statement> {
    vec![
        b.function_decl_doc(Doc::new().constructor(), "Dog", &[], vec![]),
        b.expr_doc(
            Doc::new().param("amount", ty::number()),
            b.assign(b.path("Dog.prototype.feed"), b.function(&["amount"], vec![])),
        ),
    ]
}

/// `/** @record */ function Point() {}` with a numeric `x`.
fn point(b: &AstBuilder) -> Vec<Statement> {
    vec![
        b.function_decl_doc(Doc::new().record(), "Point", &[], vec![]),
        b.expr_doc(Doc::new().ty(ty::number()), b.path("Point.prototype.x")),
        b.function_decl_doc(
            Doc::new()
                .param("p", ty::non_null(ty::named("Point")))
                .returns(ty::number()),
            "norm",
            &["p"],
            vec![b.ret(Some(b.member(b.ident("p"), "x")))],
        ),
    ]
}

#[test]
fn constructor_requires_new() {
    let b = AstBuilder::new();
    let mut statements = dog(&b);
    statements.push(b.expr(b.call(b.ident("Dog"), vec![])));

    assert_eq!(
        kinds(&check(&b.program(statements))),
        vec![DiagnosticKind::ConstructorCalledWithoutNew]
    );
}

#[test]
fn method_arguments_are_checked() {
    let b = AstBuilder::new();
    let mut statements = dog(&b);
    statements.push(b.var("d", Some(b.new_(b.ident("Dog"), vec![]))));
    statements.push(b.expr(b.call(b.member(b.ident("d"), "feed"), vec![b.num(2.0)])));
    statements.push(b.expr(b.call(b.member(b.ident("d"), "feed"), vec![b.str("lots")])));

    assert_eq!(
        kinds(&check(&b.program(statements))),
        vec![DiagnosticKind::InvalidArgumentType]
    );
}

#[test]
fn unknown_property_on_instance_is_reported() {
    let b = AstBuilder::new();
    let mut statements = dog(&b);
    statements.push(b.var("d", Some(b.new_(b.ident("Dog"), vec![]))));
    statements.push(b.expr(b.member(b.ident("d"), "fly")));

    assert_eq!(
        kinds(&check(&b.program(statements))),
        vec![DiagnosticKind::InexistentProperty]
    );
}

#[test]
fn record_with_extra_property_satisfies_record_interface() {
    let b = AstBuilder::new();
    let mut statements = point(&b);
    statements.push(b.expr(b.call(
        b.ident("norm"),
        vec![b.object(vec![("x", b.num(1.0)), ("y", b.num(2.0))])],
    )));

    assert!(check(&b.program(statements)).diagnostics.is_empty());
}

#[test]
fn record_missing_a_property_does_not_satisfy_record_interface() {
    let b = AstBuilder::new();
    let mut statements = point(&b);
    statements.push(b.expr(b.call(b.ident("norm"), vec![b.object(vec![("y", b.num(2.0))])])));

    let outcome = check(&b.program(statements));
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::InvalidArgumentType]);
}

#[test]
fn interface_cannot_be_instantiated() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(Doc::new().interface(), "Shape", &[], vec![]),
        b.expr(b.new_(b.ident("Shape"), vec![])),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::CannotInstantiateInterface]
    );
}

#[test]
fn missing_interface_member_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(Doc::new().interface(), "Shape", &[], vec![]),
        b.expr_doc(
            Doc::new().ty(ty::function(vec![], Some(ty::number()))),
            b.path("Shape.prototype.area"),
        ),
        b.function_decl_doc(
            Doc::new().constructor().implements(ty::named("Shape")),
            "Square",
            &[],
            vec![],
        ),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::InterfaceMemberNotImplemented]
    );
}

#[test]
fn enum_members_flow_into_their_enum_and_backing_type() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.var_doc(
            Doc::new().enum_of(ty::string()),
            "Color",
            Some(b.object(vec![("RED", b.str("r")), ("GREEN", b.str("g"))])),
        ),
        b.function_decl_doc(
            Doc::new().param("c", ty::named("Color")).returns(ty::string()),
            "label",
            &["c"],
            vec![b.ret(Some(b.ident("c")))],
        ),
        b.expr(b.call(b.ident("label"), vec![b.path("Color.RED")])),
        b.expr(b.call(b.ident("label"), vec![b.str("r")])),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::InvalidArgumentType]
    );
}

#[test]
fn enum_member_with_wrong_type_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.var_doc(
        Doc::new().enum_of(ty::string()),
        "Size",
        Some(b.object(vec![("SMALL", b.num(1.0))])),
    )]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::EnumMemberTypeMismatch]
    );
}

#[test]
fn duplicate_enum_key_is_reported_once() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.var_doc(
        Doc::new().enum_of(ty::string()),
        "Color",
        Some(b.object(vec![("RED", b.str("r")), ("RED", b.str("s"))])),
    )]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::DuplicateEnumKey]);
}

#[test]
fn enum_backed_by_a_record_is_rejected() {
    let b = AstBuilder::new();
    let program = b.program(vec![b.var_doc(
        Doc::new().enum_of(ty::record(vec![("a", ty::number())])),
        "Shape",
        Some(b.object(vec![("SQUARE", b.num(1.0))])),
    )]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::InvalidEnumBackingType]
    );
}

#[test]
fn mutual_inheritance_is_reported_once() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(Doc::new().constructor().extends(ty::named("B")), "A", &[], vec![]),
        b.function_decl_doc(Doc::new().constructor().extends(ty::named("A")), "B", &[], vec![]),
    ]);

    assert_eq!(kinds(&check(&program)), vec![DiagnosticKind::InheritanceCycle]);
}

#[test]
fn implementing_a_class_is_reported() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(Doc::new().constructor(), "Base", &[], vec![]),
        b.function_decl_doc(
            Doc::new().constructor().implements(ty::named("Base")),
            "Impl",
            &[],
            vec![],
        ),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::ImplementsNonInterface]
    );
}

#[test]
fn incompatible_property_override_is_reported() {
    // Base.prototype.size is a number; Derived redeclares it as a string.
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(Doc::new().constructor(), "Base", &[], vec![]),
        b.expr_doc(Doc::new().ty(ty::number()), b.path("Base.prototype.size")),
        b.function_decl_doc(
            Doc::new().constructor().extends(ty::named("Base")),
            "Derived",
            &[],
            vec![],
        ),
        b.expr_doc(Doc::new().ty(ty::string()), b.path("Derived.prototype.size")),
    ]);

    let outcome = check(&program);
    assert_eq!(kinds(&outcome), vec![DiagnosticKind::InvalidPropertyOverride]);
    assert!(outcome.diagnostics[0].message.contains("size"));
}

#[test]
fn dict_class_cannot_extend_struct_class() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(
            Doc::new().constructor().access(AccessDiscipline::Struct),
            "Rigid",
            &[],
            vec![],
        ),
        b.function_decl_doc(
            Doc::new()
                .constructor()
                .extends(ty::named("Rigid"))
                .access(AccessDiscipline::Dict),
            "Loose",
            &[],
            vec![],
        ),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::StructDictInheritanceMismatch]
    );
}

#[test]
fn dict_instances_reject_dot_access() {
    // /** @constructor @dict */ function Bag() {}  var g = new Bag(); g.x;
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(
            Doc::new().constructor().access(AccessDiscipline::Dict),
            "Bag",
            &[],
            vec![],
        ),
        b.var("g", Some(b.new_(b.ident("Bag"), vec![]))),
        b.expr(b.member(b.ident("g"), "x")),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::IllegalDotAccessOnDict]
    );
}

#[test]
fn struct_instances_reject_bracket_access() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(
            Doc::new().constructor().access(AccessDiscipline::Struct),
            "Pt",
            &[],
            vec![],
        ),
        b.var("p", Some(b.new_(b.ident("Pt"), vec![]))),
        b.expr(b.index(b.ident("p"), b.str("x"))),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::IllegalBracketAccessOnStruct]
    );
}

#[test]
fn abstract_method_on_concrete_class_is_reported_once() {
    let b = AstBuilder::new();
    let program = b.program(vec![
        b.function_decl_doc(Doc::new().constructor(), "Plain", &[], vec![]),
        b.expr_doc(
            Doc::new().abstract_(),
            b.assign(b.path("Plain.prototype.m"), b.function(&[], vec![])),
        ),
    ]);

    assert_eq!(
        kinds(&check(&program)),
        vec![DiagnosticKind::AbstractMethodInConcreteClass]
    );
}

/// `/** @constructor @abstract */ function Shape() {}` with an abstract
/// `area`, and a concrete `Sq` extending it.
fn shapes(b: &AstBuilder) -> Vec<Statement> {
    vec![
        b.function_decl_doc(Doc::new().constructor().abstract_(), "Shape", &[], vec![]),
        b.expr_doc(
            Doc::new().abstract_(),
            b.assign(b.path("Shape.prototype.area"), b.function(&[], vec![])),
        ),
        b.function_decl_doc(
            Doc::new().constructor().extends(ty::named("Shape")),
            "Sq",
            &[],
            vec![],
        ),
    ]
}

#[test]
fn unimplemented_abstract_method_and_abstract_instantiation_are_reported() {
    let b = AstBuilder::new();
    let mut statements = shapes(&b);
    statements.push(b.expr(b.new_(b.ident("Shape"), vec![])));

    assert_eq!(
        kinds(&check(&b.program(statements))),
        vec![
            DiagnosticKind::AbstractMethodNotImplemented,
            DiagnosticKind::CannotInstantiateAbstractClass
        ]
    );
}

#[test]
fn implemented_abstract_method_is_accepted() {
    let b = AstBuilder::new();
    let mut statements = shapes(&b);
    statements.push(b.expr(b.assign(
        b.path("Sq.prototype.area"),
        b.function(&[], vec![b.ret(Some(b.num(1.0)))]),
    )));
    statements.push(b.expr(b.new_(b.ident("Sq"), vec![])));

    assert!(check(&b.program(statements)).diagnostics.is_empty());
}
