//! Whole-program declaration collection.
//!
//! The first pass registers a skeleton for every nominal type, enum, typedef
//! and namespace so that annotations can refer to them regardless of
//! declaration order. The second pass resolves annotations against the
//! complete skeleton, attaches properties, and validates inheritance. The
//! registry is frozen on return.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use tracing::{debug, debug_span, trace};

use crate::annotations::{annotation_name, qualify_template, AnnotationResolver};
use crate::ast::{
    AccessDiscipline, ClassDeclaration, ClassMemberKind, DeclarationKind, Expression,
    ExpressionKind, ExpressionStatement, FunctionLiteral, Identifier, JsDoc, ObjectLiteral,
    Program, SourceSpan, Statement, TypeAnnotationKind, UnaryOperator, VarDeclarator, VarKind,
    VarStatement,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Suppressions};
use crate::registry::{
    Declaration, EnumId, FunctionDecl, NamespaceId, NamespaceKind, NamespaceMember, NominalId,
    NominalKind, PropertyDecl, Registry, TypedefId,
};
use crate::types::{literal_type, FunctionType, Lattice, NominalInstance, ObjectType, PrimitiveSet, Property, RecordType, Type};
use crate::walk::{child_functions, walk_statements, Visitor};

/// Output of [`collect`]: the frozen registry plus the `@suppress` regions
/// found while walking declarations.
#[derive(Debug)]
pub struct CollectedProgram {
    pub registry: Registry,
    pub suppressions: Suppressions,
}

pub fn collect(
    program: &Program,
    externs: Option<&Program>,
    legacy_compatibility: bool,
    diagnostics: &mut Diagnostics,
) -> CollectedProgram {
    let span = debug_span!("collect");
    let _guard = span.enter();

    let mut collector = Collector::new(diagnostics, legacy_compatibility);
    if let Some(externs) = externs {
        collector.register_statements(&externs.statements, true);
    }
    collector.register_statements(&program.statements, false);
    debug!(
        nominals = collector.nominals.len(),
        enums = collector.enums.len(),
        members = collector.members.len(),
        "registration pass finished"
    );

    collector.resolve_typedefs();
    collector.resolve_enums();
    collector.resolve_nominal_headers();
    collector.break_inheritance_cycles();
    collector.bind_method_owners();
    if let Some(externs) = externs {
        collector.resolve_functions(&externs.statements, &[], true);
    }
    collector.resolve_functions(&program.statements, &[], false);
    collector.inherit_constructors();
    collector.resolve_members();
    collector.resolve_globals();
    collector.validate_nominals();

    let mut suppressions = Suppressions::default();
    if let Some(externs) = externs {
        collect_suppressions(&externs.statements, &mut suppressions);
    }
    collect_suppressions(&program.statements, &mut suppressions);

    let mut registry = collector.registry;
    registry.freeze();
    debug!("registry frozen");
    CollectedProgram {
        registry,
        suppressions,
    }
}

enum NominalSource<'p> {
    Function(&'p FunctionLiteral),
    Class(&'p ClassDeclaration),
}

struct NominalSite<'p> {
    id: NominalId,
    jsdoc: Option<&'p JsDoc>,
    source: NominalSource<'p>,
    explicit_access: bool,
}

struct EnumSite<'p> {
    id: EnumId,
    jsdoc: &'p JsDoc,
    initializer: Option<&'p Expression>,
    externs: bool,
    span: SourceSpan,
}

#[derive(Clone, Copy)]
enum MemberValue<'p> {
    Stub,
    Expression(&'p Expression),
    Function(&'p FunctionLiteral),
}

/// A property write or stub found during registration. The owner is kept
/// by name and resolved once every declaration is known.
struct MemberSite<'p> {
    owner: String,
    prototype: bool,
    name: String,
    jsdoc: Option<&'p JsDoc>,
    value: MemberValue<'p>,
    /// Constructor whose declared formals may type the value.
    constructor: Option<usize>,
    externs: bool,
    span: SourceSpan,
}

struct GlobalSite<'p> {
    name: String,
    jsdoc: Option<&'p JsDoc>,
    initializer: Option<&'p Expression>,
    function: Option<&'p FunctionLiteral>,
    kind: VarKind,
    externs: bool,
    span: SourceSpan,
}

struct Collector<'p, 'd> {
    registry: Registry,
    diagnostics: &'d mut Diagnostics,
    legacy_compatibility: bool,
    nominals: Vec<NominalSite<'p>>,
    enums: Vec<EnumSite<'p>>,
    typedefs: Vec<(TypedefId, bool)>,
    members: Vec<MemberSite<'p>>,
    globals: Vec<GlobalSite<'p>>,
    /// Function literal id to the nominal whose prototype holds it.
    method_owners: HashMap<usize, NominalId>,
    /// Function literal id to the nominal it constructs.
    constructors: HashMap<usize, NominalId>,
}

fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, name),
    }
}

fn split_prototype(name: &str) -> Option<(&str, &str)> {
    let (owner_and_prototype, property) = name.rsplit_once('.')?;
    let owner = owner_and_prototype.strip_suffix(".prototype")?;
    Some((owner, property))
}

fn is_namespace_literal(jsdoc: Option<&JsDoc>, value: &Expression) -> Option<bool> {
    let ExpressionKind::Object(literal) = &value.kind else {
        return None;
    };
    let is_const = jsdoc.is_some_and(|doc| doc.is_const);
    let typed = jsdoc.is_some_and(|doc| doc.type_annotation.is_some());
    if typed {
        return None;
    }
    if is_const {
        Some(true)
    } else if literal.properties.is_empty() {
        Some(false)
    } else {
        None
    }
}

impl<'p, 'd> Collector<'p, 'd> {
    fn new(diagnostics: &'d mut Diagnostics, legacy_compatibility: bool) -> Self {
        Self {
            registry: Registry::new(),
            diagnostics,
            legacy_compatibility,
            nominals: Vec::new(),
            enums: Vec::new(),
            typedefs: Vec::new(),
            members: Vec::new(),
            globals: Vec::new(),
            method_owners: HashMap::new(),
            constructors: HashMap::new(),
        }
    }

    // Registration pass

    fn register_statements(&mut self, statements: &'p [Statement], externs: bool) {
        for statement in statements {
            self.register_statement(statement, externs);
        }
    }

    fn register_statement(&mut self, statement: &'p Statement, externs: bool) {
        match statement {
            Statement::Function(declaration) => {
                let function = &declaration.function;
                let jsdoc = function.jsdoc.as_ref();
                match jsdoc.and_then(|doc| doc.kind) {
                    Some(kind) => {
                        self.register_nominal(
                            &declaration.name.name,
                            kind,
                            jsdoc,
                            NominalSource::Function(function),
                            function.span,
                            externs,
                        );
                    }
                    None => self.globals.push(GlobalSite {
                        name: declaration.name.name.clone(),
                        jsdoc,
                        initializer: None,
                        function: Some(function),
                        kind: VarKind::Var,
                        externs,
                        span: declaration.name.span,
                    }),
                }
            }
            Statement::Class(class) => self.register_class(class, externs),
            Statement::Var(var) => {
                for declarator in &var.declarations {
                    self.register_declarator(var, declarator, externs);
                }
            }
            Statement::Expression(statement) => self.register_expression_statement(statement, externs),
            Statement::If(statement) => {
                self.register_statement(&statement.consequent, externs);
                if let Some(alternative) = &statement.alternative {
                    self.register_statement(alternative, externs);
                }
            }
            Statement::Block(block) => self.register_statements(&block.statements, externs),
            Statement::Try(statement) => {
                self.register_statements(&statement.block.statements, externs);
                if let Some(handler) = &statement.handler {
                    self.register_statements(&handler.body.statements, externs);
                }
                if let Some(finalizer) = &statement.finalizer {
                    self.register_statements(&finalizer.statements, externs);
                }
            }
            Statement::While(statement) => self.register_statement(&statement.body, externs),
            Statement::DoWhile(statement) => self.register_statement(&statement.body, externs),
            Statement::For(statement) => {
                if let Some(init) = &statement.init {
                    self.register_statement(init, externs);
                }
                self.register_statement(&statement.body, externs);
            }
            Statement::ForIn(statement) => self.register_statement(&statement.body, externs),
            Statement::Switch(statement) => {
                for case in &statement.cases {
                    self.register_statements(&case.body, externs);
                }
            }
            Statement::Return(_)
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Throw(_)
            | Statement::Empty(_) => {}
        }
    }

    fn is_type_name_taken(&self, name: &str) -> bool {
        matches!(
            self.registry.lookup(name),
            Some(Declaration::Nominal(_) | Declaration::Enum(_) | Declaration::Typedef(_))
        )
    }

    /// Finds or creates the namespace a qualified name lives in.
    fn ensure_namespace(&mut self, qualified: &str, span: SourceSpan) -> NamespaceId {
        match self.registry.lookup(qualified) {
            Some(Declaration::Namespace(id)) => return id,
            Some(Declaration::Nominal(id)) => return self.registry.nominal(id).statics,
            Some(Declaration::Enum(id)) => return self.registry.enum_decl(id).namespace,
            _ => {}
        }
        let (parent, last) = split_qualified(qualified);
        let parent_id = match parent {
            Some(parent) => self.ensure_namespace(parent, span),
            None => NamespaceId::GLOBAL,
        };
        let id = self
            .registry
            .add_namespace(qualified, NamespaceKind::Incidental, span);
        self.registry
            .namespace_mut(parent_id)
            .members
            .insert(last.to_string(), NamespaceMember::Namespace(id));
        id
    }

    fn attach_to_parent(&mut self, qualified: &str, member: NamespaceMember, span: SourceSpan) {
        let (parent, last) = split_qualified(qualified);
        let parent_id = match parent {
            Some(parent) => self.ensure_namespace(parent, span),
            None => NamespaceId::GLOBAL,
        };
        self.registry
            .namespace_mut(parent_id)
            .members
            .insert(last.to_string(), member);
    }

    fn register_nominal(
        &mut self,
        name: &str,
        kind: DeclarationKind,
        jsdoc: Option<&'p JsDoc>,
        source: NominalSource<'p>,
        span: SourceSpan,
        externs: bool,
    ) -> Option<NominalId> {
        if self.is_type_name_taken(name) {
            self.diagnostics.push(
                DiagnosticKind::DuplicateTypeDeclaration,
                format!("type {name} is declared more than once"),
                span,
            );
            return None;
        }
        let nominal_kind = match kind {
            DeclarationKind::Constructor => NominalKind::Class,
            DeclarationKind::Interface => NominalKind::Interface,
            DeclarationKind::Record => NominalKind::Record,
        };
        let id = self.registry.add_nominal(name, nominal_kind, span);
        let explicit_access = jsdoc.and_then(|doc| doc.access);
        let default_access = match (&source, nominal_kind) {
            (_, NominalKind::Interface | NominalKind::Record) => AccessDiscipline::Struct,
            (NominalSource::Class(class), NominalKind::Class) if class.superclass.is_none() => {
                AccessDiscipline::Struct
            }
            _ => AccessDiscipline::Unrestricted,
        };
        let templates: Vec<String> = jsdoc
            .map(|doc| {
                doc.templates
                    .iter()
                    .map(|template| qualify_template(name, template))
                    .collect()
            })
            .unwrap_or_default();
        {
            let nominal = self.registry.nominal_mut(id);
            nominal.access = explicit_access.unwrap_or(default_access);
            nominal.is_abstract = jsdoc.is_some_and(|doc| doc.is_abstract);
            nominal.type_params = templates;
        }
        let statics = self.registry.nominal(id).statics;
        self.attach_to_parent(name, NamespaceMember::Namespace(statics), span);
        trace!(name, ?nominal_kind, "registered nominal type");

        match &source {
            NominalSource::Function(function) => {
                self.constructors.insert(function.id, id);
                self.register_constructor_body(name, function, externs);
            }
            NominalSource::Class(_) => {}
        }
        self.nominals.push(NominalSite {
            id,
            jsdoc,
            source,
            explicit_access: explicit_access.is_some(),
        });
        Some(id)
    }

    fn register_class(&mut self, class: &'p ClassDeclaration, externs: bool) {
        let jsdoc = class.jsdoc.as_ref();
        let kind = jsdoc
            .and_then(|doc| doc.kind)
            .unwrap_or(DeclarationKind::Constructor);
        let name = class.name.name.as_str();
        let Some(id) = self.register_nominal(name, kind, jsdoc, NominalSource::Class(class), class.span, externs)
        else {
            return;
        };
        for member in &class.members {
            let function = &member.function;
            match member.kind {
                ClassMemberKind::Constructor => {
                    self.constructors.insert(function.id, id);
                    self.register_constructor_body(name, function, externs);
                }
                ClassMemberKind::Method => {
                    self.method_owners.insert(function.id, id);
                    self.members.push(MemberSite {
                        owner: name.to_string(),
                        prototype: true,
                        name: member.name.clone(),
                        jsdoc: function.jsdoc.as_ref(),
                        value: MemberValue::Function(function),
                        constructor: None,
                        externs,
                        span: function.span,
                    });
                }
                ClassMemberKind::StaticMethod => {
                    self.members.push(MemberSite {
                        owner: name.to_string(),
                        prototype: false,
                        name: member.name.clone(),
                        jsdoc: function.jsdoc.as_ref(),
                        value: MemberValue::Function(function),
                        constructor: None,
                        externs,
                        span: function.span,
                    });
                }
            }
        }
    }

    /// Records `this.p = ...` writes and `this.p;` stubs in a constructor.
    fn register_constructor_body(&mut self, owner: &str, function: &'p FunctionLiteral, externs: bool) {
        struct ThisWrites<'p> {
            found: Vec<(&'p ExpressionStatement, String, Option<&'p Expression>)>,
        }

        impl<'p> Visitor<'p> for ThisWrites<'p> {
            fn function(&mut self, _function: &'p FunctionLiteral) -> bool {
                false
            }

            fn statement(&mut self, statement: &'p Statement) -> bool {
                if let Statement::Expression(expression_statement) = statement {
                    let (target, value) = match &expression_statement.expression.kind {
                        ExpressionKind::Assignment(assignment) if assignment.operator.is_none() => {
                            (&*assignment.target, Some(&*assignment.value))
                        }
                        ExpressionKind::Member(_) => (&expression_statement.expression, None),
                        _ => return true,
                    };
                    if let ExpressionKind::Member(member) = &target.kind {
                        if matches!(member.object.kind, ExpressionKind::This) {
                            self.found
                                .push((expression_statement, member.property.clone(), value));
                        }
                    }
                }
                true
            }
        }

        let mut writes = ThisWrites { found: Vec::new() };
        walk_statements(&function.body.statements, &mut writes);
        for (statement, property, value) in writes.found {
            self.members.push(MemberSite {
                owner: owner.to_string(),
                prototype: true,
                name: property,
                jsdoc: statement.jsdoc.as_ref(),
                value: value.map_or(MemberValue::Stub, MemberValue::Expression),
                constructor: Some(function.id),
                externs,
                span: statement.expression.span,
            });
        }
    }

    fn register_declarator(&mut self, var: &'p VarStatement, declarator: &'p VarDeclarator, externs: bool) {
        let jsdoc = var.jsdoc_for(declarator);
        let name = declarator.name.name.as_str();
        let span = declarator.name.span;
        if let Some(doc) = jsdoc {
            if let Some(kind) = doc.kind {
                match declarator.initializer.as_ref().map(|init| &init.kind) {
                    Some(ExpressionKind::Function(function)) => {
                        self.register_nominal(name, kind, jsdoc, NominalSource::Function(function), span, externs);
                    }
                    _ => self.diagnostics.push(
                        DiagnosticKind::MisplacedAnnotation,
                        format!("{name} is annotated as a type declaration but is not a function"),
                        span,
                    ),
                }
                return;
            }
            if doc.is_enum {
                self.register_enum(name, doc, declarator.initializer.as_ref(), externs, span);
                return;
            }
            if doc.is_typedef {
                self.register_typedef(name, doc, span);
                return;
            }
        }
        if let Some(initializer) = &declarator.initializer {
            if let Some(real) = is_namespace_literal(jsdoc, initializer) {
                self.register_namespace(name, real, initializer, externs);
                return;
            }
        }
        self.globals.push(GlobalSite {
            name: name.to_string(),
            jsdoc,
            initializer: declarator.initializer.as_ref(),
            function: None,
            kind: var.kind,
            externs,
            span,
        });
    }

    fn register_enum(
        &mut self,
        name: &str,
        jsdoc: &'p JsDoc,
        initializer: Option<&'p Expression>,
        externs: bool,
        span: SourceSpan,
    ) {
        if self.is_type_name_taken(name) {
            self.diagnostics.push(
                DiagnosticKind::DuplicateTypeDeclaration,
                format!("type {name} is declared more than once"),
                span,
            );
            return;
        }
        let id = self.registry.add_enum(name, Type::number(), span);
        let namespace = self.registry.enum_decl(id).namespace;
        self.attach_to_parent(name, NamespaceMember::Namespace(namespace), span);
        self.enums.push(EnumSite {
            id,
            jsdoc,
            initializer,
            externs,
            span,
        });
    }

    fn register_typedef(&mut self, name: &str, jsdoc: &'p JsDoc, span: SourceSpan) {
        if self.is_type_name_taken(name) {
            self.diagnostics.push(
                DiagnosticKind::DuplicateTypeDeclaration,
                format!("type {name} is declared more than once"),
                span,
            );
            return;
        }
        let id = self.registry.add_typedef(name, jsdoc.typedef.clone(), span);
        self.attach_to_parent(name, NamespaceMember::Typedef(id), span);
        self.typedefs.push((id, jsdoc.typedef.is_some()));
    }

    fn register_namespace(&mut self, name: &str, real: bool, value: &'p Expression, externs: bool) {
        let ExpressionKind::Object(literal) = &value.kind else {
            return;
        };
        let kind = if real {
            NamespaceKind::Real
        } else {
            NamespaceKind::Incidental
        };
        let id = match self.registry.lookup(name) {
            Some(Declaration::Namespace(id)) => id,
            _ => {
                let id = self.registry.add_namespace(name, kind, value.span);
                self.attach_to_parent(name, NamespaceMember::Namespace(id), value.span);
                id
            }
        };
        trace!(name, real, namespace = id.0, "registered namespace");
        self.register_namespace_literal(name, literal, externs);
    }

    fn register_namespace_literal(&mut self, name: &str, literal: &'p ObjectLiteral, externs: bool) {
        for property in &literal.properties {
            let qualified = format!("{name}.{}", property.key);
            let jsdoc = property.jsdoc.as_ref();
            if let Some(real) = is_namespace_literal(jsdoc, &property.value) {
                if real {
                    self.register_namespace(&qualified, true, &property.value, externs);
                    continue;
                }
            }
            if let Some(doc) = jsdoc {
                if doc.is_enum {
                    self.register_enum(&qualified, doc, Some(&property.value), externs, property.span);
                    continue;
                }
                if let (Some(kind), ExpressionKind::Function(function)) = (doc.kind, &property.value.kind) {
                    self.register_nominal(&qualified, kind, jsdoc, NominalSource::Function(function), property.span, externs);
                    continue;
                }
            }
            self.members.push(MemberSite {
                owner: name.to_string(),
                prototype: false,
                name: property.key.clone(),
                jsdoc,
                value: MemberValue::Expression(&property.value),
                constructor: None,
                externs,
                span: property.span,
            });
        }
    }

    fn register_expression_statement(&mut self, statement: &'p ExpressionStatement, externs: bool) {
        let jsdoc = statement.jsdoc.as_ref();
        let span = statement.expression.span;
        match &statement.expression.kind {
            ExpressionKind::Assignment(assignment) if assignment.operator.is_none() => {
                let Some(target) = assignment.target.qualified_name() else {
                    return;
                };
                self.register_assignment(&target, jsdoc, &assignment.value, externs, span);
            }
            ExpressionKind::Member(_) => {
                let Some(target) = statement.expression.qualified_name() else {
                    return;
                };
                self.register_stub(&target, jsdoc, externs, span);
            }
            _ => {}
        }
    }

    fn register_assignment(
        &mut self,
        target: &str,
        jsdoc: Option<&'p JsDoc>,
        value: &'p Expression,
        externs: bool,
        span: SourceSpan,
    ) {
        if target.starts_with("this.") {
            return;
        }
        if let Some(doc) = jsdoc {
            if let Some(kind) = doc.kind {
                match &value.kind {
                    ExpressionKind::Function(function) => {
                        self.register_nominal(target, kind, jsdoc, NominalSource::Function(function), span, externs);
                    }
                    _ => self.diagnostics.push(
                        DiagnosticKind::MisplacedAnnotation,
                        format!("{target} is annotated as a type declaration but is not a function"),
                        span,
                    ),
                }
                return;
            }
            if doc.is_enum {
                self.register_enum(target, doc, Some(value), externs, span);
                return;
            }
        }
        let (owner, name) = match split_prototype(target) {
            Some((owner, name)) => (owner, name),
            None => {
                let (parent, last) = split_qualified(target);
                let Some(parent) = parent else {
                    return;
                };
                if let Some(real) = is_namespace_literal(jsdoc, value) {
                    self.register_namespace(target, real, value, externs);
                    return;
                }
                self.push_member(parent, false, last, jsdoc, value, externs, span);
                return;
            }
        };
        self.push_member(owner, true, name, jsdoc, value, externs, span);
    }

    #[allow(clippy::too_many_arguments)]
    fn push_member(
        &mut self,
        owner: &str,
        prototype: bool,
        name: &str,
        jsdoc: Option<&'p JsDoc>,
        value: &'p Expression,
        externs: bool,
        span: SourceSpan,
    ) {
        let value = match &value.kind {
            ExpressionKind::Function(function) => MemberValue::Function(function),
            _ => MemberValue::Expression(value),
        };
        self.members.push(MemberSite {
            owner: owner.to_string(),
            prototype,
            name: name.to_string(),
            jsdoc,
            value,
            constructor: None,
            externs,
            span,
        });
    }

    fn register_stub(&mut self, target: &str, jsdoc: Option<&'p JsDoc>, externs: bool, span: SourceSpan) {
        let Some(doc) = jsdoc else {
            return;
        };
        if doc.is_typedef {
            self.register_typedef(target, doc, span);
            return;
        }
        if doc.is_enum {
            self.register_enum(target, doc, None, externs, span);
            return;
        }
        if target.starts_with("this.") {
            return;
        }
        let (owner, name, prototype) = match split_prototype(target) {
            Some((owner, name)) => (owner, name, true),
            None => match split_qualified(target) {
                (Some(parent), last) => (parent, last, false),
                (None, _) => return,
            },
        };
        self.members.push(MemberSite {
            owner: owner.to_string(),
            prototype,
            name: name.to_string(),
            jsdoc,
            value: MemberValue::Stub,
            constructor: None,
            externs,
            span,
        });
    }

    // Resolution pass

    fn resolve_typedefs(&mut self) {
        for (id, has_annotation) in self.typedefs.clone() {
            if !has_annotation {
                let typedef = self.registry.typedef(id);
                self.diagnostics.push(
                    DiagnosticKind::MalformedTypedef,
                    format!("typedef {} has no type", typedef.name),
                    typedef.span,
                );
                self.registry.typedef_mut(id).resolved = Some(Type::Unknown);
                continue;
            }
            let resolved = AnnotationResolver::new(&self.registry).resolve_typedef(id);
            let ty = match resolved {
                Ok(ty) => ty,
                Err(error) => {
                    error.report(self.diagnostics);
                    Type::Unknown
                }
            };
            self.registry.typedef_mut(id).resolved = Some(ty);
        }
    }

    fn resolve_enums(&mut self) {
        for index in 0..self.enums.len() {
            let EnumSite {
                id,
                jsdoc,
                initializer,
                externs,
                span,
            } = self.enums[index];
            let name = self.registry.enum_decl(id).name.clone();
            let mut backing = match &jsdoc.enum_type {
                Some(annotation) => AnnotationResolver::new(&self.registry)
                    .resolve_or_unknown(annotation, self.diagnostics)
                    .without_null_or_undefined(),
                None => Type::number(),
            };
            let invalid = !backing.is_scalar_only()
                || backing.primitives().is_empty()
                || (backing.member_count() > 1 && !backing.is_primitive(PrimitiveSet::BOOLEAN));
            if invalid {
                self.diagnostics.push(
                    DiagnosticKind::InvalidEnumBackingType,
                    format!(
                        "enum {} cannot be backed by {}",
                        name,
                        backing.describe(&self.registry)
                    ),
                    span,
                );
                backing = Type::Unknown;
            }

            let mut members: IndexMap<String, SourceSpan> = IndexMap::new();
            match initializer.map(|expression| &expression.kind) {
                Some(ExpressionKind::Object(literal)) => {
                    for property in &literal.properties {
                        if members.contains_key(&property.key) {
                            self.diagnostics.push(
                                DiagnosticKind::DuplicateEnumKey,
                                format!("enum {} declares {} twice", name, property.key),
                                property.span,
                            );
                            continue;
                        }
                        members.insert(property.key.clone(), property.span);
                        let value_type = self.simple_type(&property.value, None);
                        let lattice = Lattice::new(&self.registry);
                        if !value_type.is_unknown() && !lattice.is_subtype(&value_type, &backing) {
                            self.diagnostics.push(
                                DiagnosticKind::EnumMemberTypeMismatch,
                                format!(
                                    "enum member {}.{} has type {} but the enum is backed by {}",
                                    name,
                                    property.key,
                                    value_type.describe(&self.registry),
                                    backing.describe(&self.registry)
                                ),
                                property.value.span,
                            );
                        }
                    }
                }
                None if externs => {}
                _ => self.diagnostics.push(
                    DiagnosticKind::EnumInitializerNotObjectLiteral,
                    format!("enum {name} must be initialized with an object literal"),
                    span,
                ),
            }
            let decl = self.registry.enum_mut(id);
            decl.backing = backing;
            decl.members = members;
        }
    }

    fn resolve_nominal_headers(&mut self) {
        for index in 0..self.nominals.len() {
            let id = self.nominals[index].id;
            let jsdoc = self.nominals[index].jsdoc;
            let kind = self.registry.nominal(id).kind;
            let name = self.registry.nominal(id).name.clone();
            let span = self.registry.nominal(id).span;
            let type_params = self.registry.nominal(id).type_params.clone();

            let mut superclass: Option<NominalInstance> = None;
            let mut interfaces: Vec<NominalInstance> = Vec::new();
            {
                let resolver = AnnotationResolver::new(&self.registry).with_qualified_templates(&type_params);
                let extends = jsdoc.map(|doc| doc.extends.as_slice()).unwrap_or(&[]);
                let implements = jsdoc.map(|doc| doc.implements.as_slice()).unwrap_or(&[]);

                let class_superclass = match &self.nominals[index].source {
                    NominalSource::Class(class) => class.superclass.as_ref(),
                    NominalSource::Function(_) => None,
                };

                if kind == NominalKind::Class {
                    if extends.len() > 1 {
                        self.diagnostics.push(
                            DiagnosticKind::ConflictingExtendedType,
                            format!("class {name} may extend only one class"),
                            span,
                        );
                    }
                    if let Some(annotation) = extends.first() {
                        match resolver.resolve_nominal_reference(annotation) {
                            Ok(parent) => {
                                if self.registry.nominal(parent.id).kind != NominalKind::Class {
                                    self.diagnostics.push(
                                        DiagnosticKind::ConflictingExtendedType,
                                        format!(
                                            "class {} cannot extend interface {}",
                                            name,
                                            self.registry.nominal(parent.id).name
                                        ),
                                        annotation.span,
                                    );
                                } else {
                                    superclass = Some(parent);
                                }
                            }
                            Err(error) => error.report(self.diagnostics),
                        }
                    }
                    if let Some(expression) = class_superclass {
                        let parent = expression
                            .qualified_name()
                            .and_then(|qualified| match self.registry.lookup(&qualified) {
                                Some(Declaration::Nominal(parent)) => Some(parent),
                                _ => None,
                            });
                        match (parent, &superclass) {
                            (None, _) => self.diagnostics.push(
                                DiagnosticKind::ConflictingExtendedType,
                                format!("class {name} extends something that is not a class"),
                                expression.span,
                            ),
                            (Some(parent), Some(declared)) if declared.id != parent => {
                                self.diagnostics.push(
                                    DiagnosticKind::ConflictingExtendedType,
                                    format!(
                                        "class {} extends {} but is annotated as extending {}",
                                        name,
                                        self.registry.nominal(parent).name,
                                        self.registry.nominal(declared.id).name
                                    ),
                                    expression.span,
                                );
                            }
                            (Some(_), Some(_)) => {}
                            (Some(parent), None) => {
                                let parent_nominal = self.registry.nominal(parent);
                                if parent_nominal.kind != NominalKind::Class {
                                    self.diagnostics.push(
                                        DiagnosticKind::ConflictingExtendedType,
                                        format!(
                                            "class {} cannot extend interface {}",
                                            name, parent_nominal.name
                                        ),
                                        expression.span,
                                    );
                                } else {
                                    let args = vec![Type::Unknown; parent_nominal.type_params.len()];
                                    superclass = Some(NominalInstance::new(parent, args));
                                }
                            }
                        }
                    }
                    for annotation in implements {
                        match resolver.resolve_nominal_reference(annotation) {
                            Ok(interface) => {
                                if self.registry.nominal(interface.id).kind.is_interface() {
                                    interfaces.push(interface);
                                } else {
                                    self.diagnostics.push(
                                        DiagnosticKind::ImplementsNonInterface,
                                        format!(
                                            "{} implements {}, which is not an interface",
                                            name,
                                            annotation_name(annotation)
                                        ),
                                        annotation.span,
                                    );
                                }
                            }
                            Err(error) => error.report(self.diagnostics),
                        }
                    }
                } else {
                    if !implements.is_empty() {
                        self.diagnostics.push(
                            DiagnosticKind::MisplacedAnnotation,
                            format!("interface {name} cannot use @implements"),
                            span,
                        );
                    }
                    for annotation in extends {
                        match resolver.resolve_nominal_reference(annotation) {
                            Ok(parent) => {
                                if self.registry.nominal(parent.id).kind.is_interface() {
                                    interfaces.push(parent);
                                } else {
                                    self.diagnostics.push(
                                        DiagnosticKind::ConflictingExtendedType,
                                        format!(
                                            "interface {} cannot extend class {}",
                                            name,
                                            self.registry.nominal(parent.id).name
                                        ),
                                        annotation.span,
                                    );
                                }
                            }
                            Err(error) => error.report(self.diagnostics),
                        }
                    }
                }
            }

            let explicit_access = self.nominals[index].explicit_access;
            let nominal = self.registry.nominal_mut(id);
            nominal.superclass = superclass;
            nominal.interfaces = interfaces;
            if kind == NominalKind::Class && !explicit_access && nominal.superclass.is_some() {
                nominal.access = AccessDiscipline::Unrestricted;
            }
        }
    }

    /// Drops every supertype edge of a declaration that reaches itself.
    fn break_inheritance_cycles(&mut self) {
        for index in 0..self.nominals.len() {
            let id = self.nominals[index].id;
            let mut seen = HashSet::new();
            let mut queue: VecDeque<NominalId> = self
                .registry
                .nominal(id)
                .supertypes()
                .map(|supertype| supertype.id)
                .collect();
            let mut cyclic = false;
            while let Some(current) = queue.pop_front() {
                if current == id {
                    cyclic = true;
                    break;
                }
                if !seen.insert(current) {
                    continue;
                }
                queue.extend(self.registry.nominal(current).supertypes().map(|supertype| supertype.id));
            }
            if cyclic {
                let nominal = self.registry.nominal(id);
                self.diagnostics.push(
                    DiagnosticKind::InheritanceCycle,
                    format!("{} inherits from itself", nominal.name),
                    nominal.span,
                );
                let nominal = self.registry.nominal_mut(id);
                nominal.superclass = None;
                nominal.interfaces.clear();
            }
        }
    }

    /// Prototype assignments of function literals make them methods of the
    /// owning type.
    fn bind_method_owners(&mut self) {
        for site in &self.members {
            let MemberValue::Function(function) = site.value else {
                continue;
            };
            if !site.prototype {
                continue;
            }
            if let Some(Declaration::Nominal(owner)) = self.registry.lookup(&site.owner) {
                self.method_owners.insert(function.id, owner);
            }
        }
    }

    /// Resolves the declared signature of every function literal nested in
    /// `statements`, recursively, with enclosing template names in scope.
    fn resolve_functions(&mut self, statements: &'p [Statement], templates: &[String], externs: bool) {
        for function in child_functions(statements) {
            let owner = self
                .constructors
                .get(&function.id)
                .or_else(|| self.method_owners.get(&function.id))
                .copied();
            let is_constructor = self.constructors.contains_key(&function.id);
            let jsdoc = function.jsdoc.as_ref();
            let name = match (&function.name, owner) {
                (Some(name), _) => name.clone(),
                (None, Some(owner)) => self.registry.nominal(owner).name.clone(),
                (None, None) => format!("<anonymous@{}>", function.span.line),
            };

            let mut scope = templates.to_vec();
            let mut own_templates = Vec::new();
            if let Some(owner) = owner {
                scope.extend(self.registry.nominal(owner).type_params.iter().cloned());
            }
            if !is_constructor {
                let template_owner = format!("{}@{}", name, function.id);
                for template in jsdoc.map(|doc| doc.templates.as_slice()).unwrap_or(&[]) {
                    let qualified = qualify_template(&template_owner, template);
                    scope.push(qualified.clone());
                    own_templates.push(qualified);
                }
            }

            let resolution = AnnotationResolver::new(&self.registry)
                .with_qualified_templates(&scope)
                .resolve_signature(jsdoc, &function.parameters);
            for error in &resolution.errors {
                error.report(self.diagnostics);
            }
            let mut signature = resolution.signature;
            signature.type_params = own_templates;
            if let Some(owner) = owner {
                let instance = self.registry.instance_of_self(owner);
                if is_constructor {
                    signature.constructs = Some(instance.clone());
                    signature.receiver = Some(instance);
                    signature.type_params = self.registry.nominal(owner).type_params.clone();
                } else if signature.receiver.is_none() {
                    signature.receiver = Some(instance);
                }
            }
            if is_constructor {
                if let Some(owner) = owner {
                    self.registry.nominal_mut(owner).constructor = Some(signature.to_function_type());
                }
            }
            trace!(function = function.id, name = %name, "resolved declared signature");
            self.registry.add_function(FunctionDecl {
                id: function.id,
                name,
                signature,
                owner,
                from_externs: externs,
                span: function.span,
            });
            self.resolve_functions(&function.body.statements, &scope, externs);
        }
    }

    /// Classes without their own constructor take the nearest ancestor's
    /// formals.
    fn inherit_constructors(&mut self) {
        for index in 0..self.nominals.len() {
            let id = self.nominals[index].id;
            if self.registry.nominal(id).constructor.is_some()
                || self.registry.nominal(id).kind != NominalKind::Class
            {
                continue;
            }
            let inherited = self
                .registry
                .superclass_chain(id)
                .into_iter()
                .skip(1)
                .find_map(|ancestor| self.registry.nominal(ancestor).constructor.clone());
            let Some(mut constructor) = inherited else {
                continue;
            };
            constructor.constructs = Some(self.registry.instance_of_self(id));
            constructor.receiver = Some(self.registry.instance_of_self(id));
            constructor.type_params = self.registry.nominal(id).type_params.clone();
            self.registry.nominal_mut(id).constructor = Some(constructor);
        }
    }

    fn resolve_members(&mut self) {
        for index in 0..self.members.len() {
            let site = &self.members[index];
            let owner_name = site.owner.clone();
            let prototype = site.prototype;
            let name = site.name.clone();
            let jsdoc = site.jsdoc;
            let value = site.value;
            let constructor = site.constructor;
            let externs = site.externs;
            let span = site.span;

            enum Target {
                Prototype(NominalId),
                Namespace(NamespaceId),
            }
            let target = match (self.registry.lookup(&owner_name), prototype) {
                (Some(Declaration::Nominal(id)), true) => Target::Prototype(id),
                (Some(Declaration::Nominal(id)), false) => Target::Namespace(self.registry.nominal(id).statics),
                (Some(Declaration::Namespace(id)), false) => Target::Namespace(id),
                _ => continue,
            };
            let templates = match target {
                Target::Prototype(id) => self.registry.nominal(id).type_params.clone(),
                Target::Namespace(_) => Vec::new(),
            };

            let mut decl = self.member_decl(jsdoc, value, constructor, &templates, span);
            if jsdoc.is_some_and(|doc| doc.is_const) {
                decl.constant = true;
                if matches!(value, MemberValue::Stub) && !externs {
                    self.diagnostics.push(
                        DiagnosticKind::ConstWithoutInitializer,
                        format!("constant {owner_name}.{name} has no initializer"),
                        span,
                    );
                }
            }

            match target {
                Target::Prototype(id) => {
                    if jsdoc.is_some_and(|doc| doc.is_abstract) {
                        decl.is_abstract = true;
                        let nominal = self.registry.nominal(id);
                        if nominal.kind == NominalKind::Class && !nominal.is_abstract {
                            self.diagnostics.push(
                                DiagnosticKind::AbstractMethodInConcreteClass,
                                format!(
                                    "abstract method {} declared on non-abstract class {}",
                                    name, nominal.name
                                ),
                                span,
                            );
                        }
                    }
                    if self.registry.nominal(id).kind == NominalKind::Record
                        && decl.ty.primitives().contains(PrimitiveSet::UNDEFINED)
                    {
                        decl.optional = true;
                    }
                    let existing = self.registry.nominal(id).properties.get(&name).cloned();
                    let merged = self.merge_property(existing, decl, &owner_name, &name, span);
                    self.registry.nominal_mut(id).properties.insert(name, merged);
                }
                Target::Namespace(namespace) => {
                    let existing = match self.registry.namespace(namespace).members.get(&name) {
                        Some(NamespaceMember::Value(existing)) => Some(existing.clone()),
                        Some(_) => continue,
                        None => None,
                    };
                    let merged = self.merge_property(existing, decl, &owner_name, &name, span);
                    self.registry
                        .namespace_mut(namespace)
                        .members
                        .insert(name, NamespaceMember::Value(merged));
                }
            }
        }
    }

    fn member_decl(
        &mut self,
        jsdoc: Option<&'p JsDoc>,
        value: MemberValue<'p>,
        constructor: Option<usize>,
        templates: &[String],
        span: SourceSpan,
    ) -> PropertyDecl {
        if let MemberValue::Function(function) = value {
            let ty = match self.registry.function(function.id) {
                Some(decl) => Type::function(decl.signature.to_function_type()),
                None => Type::function(FunctionType::any()),
            };
            let mut decl = PropertyDecl::new(ty, true, span);
            decl.function = Some(function.id);
            return decl;
        }
        if let Some(doc) = jsdoc {
            if let Some(annotation) = &doc.type_annotation {
                let (annotation, optional) = match &annotation.kind {
                    TypeAnnotationKind::Optional(inner) => (&**inner, true),
                    _ => (annotation, false),
                };
                let ty = AnnotationResolver::new(&self.registry)
                    .with_qualified_templates(templates)
                    .resolve_or_unknown(annotation, self.diagnostics);
                let mut decl = PropertyDecl::new(ty, true, span);
                decl.optional = optional;
                return decl;
            }
            if doc.has_function_info() && matches!(value, MemberValue::Stub) {
                let parameters: Vec<Identifier> = doc
                    .params
                    .iter()
                    .map(|param| Identifier::new(param.name.clone(), param.annotation.span))
                    .collect();
                let resolution = AnnotationResolver::new(&self.registry)
                    .with_qualified_templates(templates)
                    .resolve_signature(Some(doc), &parameters);
                for error in &resolution.errors {
                    error.report(self.diagnostics);
                }
                let mut function = resolution.signature.to_function_type();
                if resolution.signature.return_type.is_none() {
                    function.return_type = Type::undefined();
                }
                return PropertyDecl::new(Type::function(function), true, span);
            }
        }
        let declared = jsdoc.is_some_and(|doc| doc.is_const);
        let ty = match value {
            MemberValue::Expression(expression) => self.simple_type(expression, constructor),
            _ => Type::Unknown,
        };
        PropertyDecl::new(ty, declared, span)
    }

    fn merge_property(
        &mut self,
        existing: Option<PropertyDecl>,
        incoming: PropertyDecl,
        owner: &str,
        name: &str,
        span: SourceSpan,
    ) -> PropertyDecl {
        let Some(existing) = existing else {
            return incoming;
        };
        let lattice = Lattice::new(&self.registry);
        match (existing.declared, incoming.declared) {
            (true, true) => {
                let compatible = lattice.is_subtype(&existing.ty, &incoming.ty)
                    && lattice.is_subtype(&incoming.ty, &existing.ty);
                if !compatible {
                    self.diagnostics.push(
                        DiagnosticKind::RedeclaredProperty,
                        format!(
                            "property {}.{} redeclared as {} but previously declared as {}",
                            owner,
                            name,
                            incoming.ty.describe(&self.registry),
                            existing.ty.describe(&self.registry)
                        ),
                        span,
                    );
                }
                PropertyDecl {
                    function: existing.function.or(incoming.function),
                    ..existing
                }
            }
            (true, false) => existing,
            (false, true) => incoming,
            (false, false) => PropertyDecl {
                ty: lattice.join(&existing.ty, &incoming.ty),
                ..existing
            },
        }
    }

    fn resolve_globals(&mut self) {
        for index in 0..self.globals.len() {
            let site = &self.globals[index];
            let name = site.name.clone();
            let jsdoc = site.jsdoc;
            let initializer = site.initializer;
            let function = site.function;
            let kind = site.kind;
            let externs = site.externs;
            let span = site.span;

            let decl = if let Some(function) = function {
                let ty = match self.registry.function(function.id) {
                    Some(decl) => Type::function(decl.signature.to_function_type()),
                    None => Type::function(FunctionType::any()),
                };
                let mut decl = PropertyDecl::new(ty, true, span);
                decl.function = Some(function.id);
                Some(decl)
            } else {
                let is_const = kind == VarKind::Const || jsdoc.is_some_and(|doc| doc.is_const);
                let annotation = jsdoc.and_then(|doc| doc.type_annotation.as_ref());
                if is_const && initializer.is_none() && !externs {
                    self.diagnostics.push(
                        DiagnosticKind::ConstWithoutInitializer,
                        format!("constant {name} has no initializer"),
                        span,
                    );
                }
                match (annotation, initializer) {
                    (Some(annotation), _) => {
                        let ty = AnnotationResolver::new(&self.registry)
                            .resolve_or_unknown(annotation, self.diagnostics);
                        let mut decl = PropertyDecl::new(ty, true, span);
                        decl.constant = is_const;
                        Some(decl)
                    }
                    (None, Some(initializer)) if is_const => {
                        let ty = self.simple_type(initializer, None);
                        let mut decl = PropertyDecl::new(ty, true, span);
                        decl.constant = true;
                        Some(decl)
                    }
                    (None, Some(Expression {
                        kind: ExpressionKind::Function(literal),
                        ..
                    })) if literal.jsdoc.as_ref().is_some_and(JsDoc::has_function_info) || jsdoc.is_some_and(JsDoc::has_function_info) => {
                        let ty = match self.registry.function(literal.id) {
                            Some(decl) => Type::function(decl.signature.to_function_type()),
                            None => Type::function(FunctionType::any()),
                        };
                        let mut decl = PropertyDecl::new(ty, true, span);
                        decl.function = Some(literal.id);
                        Some(decl)
                    }
                    (None, None) if externs => Some(PropertyDecl::new(Type::Unknown, true, span)),
                    _ => None,
                }
            };
            if let Some(decl) = decl {
                self.registry
                    .namespace_mut(NamespaceId::GLOBAL)
                    .members
                    .insert(name, NamespaceMember::Value(decl));
            }
        }
    }

    /// Type of a right-hand side computed without flow analysis.
    fn simple_type(&self, expression: &Expression, constructor: Option<usize>) -> Type {
        let lattice = Lattice::new(&self.registry);
        match &expression.kind {
            ExpressionKind::Literal(literal) => literal_type(literal),
            ExpressionKind::Object(literal) => {
                let mut record = RecordType::exact(IndexMap::new());
                for property in &literal.properties {
                    record.properties.insert(
                        property.key.clone(),
                        Property::inferred(self.simple_type(&property.value, constructor)),
                    );
                }
                Type::record(record)
            }
            ExpressionKind::Array(array) => {
                let elements: Vec<Type> = array
                    .elements
                    .iter()
                    .map(|element| self.simple_type(element, constructor))
                    .collect();
                let element = if elements.is_empty() {
                    Type::Unknown
                } else {
                    lattice.join_all(elements.iter())
                };
                Type::instance(NominalId::ARRAY, vec![element])
            }
            ExpressionKind::Function(function) => match self.registry.function(function.id) {
                Some(decl) => Type::function(decl.signature.to_function_type()),
                None => Type::function(FunctionType::any()),
            },
            ExpressionKind::New(call) => {
                let nominal = call
                    .callee
                    .qualified_name()
                    .and_then(|name| match self.registry.lookup(&name) {
                        Some(Declaration::Nominal(id)) => Some(id),
                        _ => None,
                    });
                match nominal {
                    Some(id) => {
                        let args = vec![Type::Unknown; self.registry.nominal(id).type_params.len()];
                        Type::instance(id, args)
                    }
                    None => Type::Unknown,
                }
            }
            ExpressionKind::Identifier(identifier) => {
                let from_constructor = constructor
                    .and_then(|id| self.registry.function(id))
                    .and_then(|decl| {
                        decl.signature
                            .params
                            .iter()
                            .find(|param| param.name == identifier.name)
                    })
                    .map(|param| param.ty.clone().unwrap_or(Type::Unknown));
                if let Some(ty) = from_constructor {
                    return ty;
                }
                match self.registry.global(&identifier.name) {
                    Some(NamespaceMember::Value(decl)) if decl.declared => decl.ty.clone(),
                    Some(member) => self.registry.member_type(member).unwrap_or(Type::Unknown),
                    None => Type::Unknown,
                }
            }
            ExpressionKind::Cast(cast) => AnnotationResolver::new(&self.registry)
                .resolve(&cast.annotation)
                .unwrap_or(Type::Unknown),
            ExpressionKind::Unary(unary) => match unary.operator {
                UnaryOperator::Not | UnaryOperator::Delete => Type::boolean(),
                UnaryOperator::Typeof => Type::string(),
                UnaryOperator::Void => Type::undefined(),
                UnaryOperator::Negative | UnaryOperator::Positive | UnaryOperator::BitNot => Type::number(),
            },
            ExpressionKind::Binary(binary) => {
                if binary.operator.is_arithmetic() {
                    return Type::number();
                }
                if binary.operator.is_relational() || binary.operator.is_equality() {
                    return Type::boolean();
                }
                match binary.operator {
                    crate::ast::BinaryOperator::Instanceof | crate::ast::BinaryOperator::In => Type::boolean(),
                    _ => {
                        let left = self.simple_type(&binary.left, constructor);
                        let right = self.simple_type(&binary.right, constructor);
                        if left.is_string() || right.is_string() {
                            Type::string()
                        } else if left.is_number() && right.is_number() {
                            Type::number()
                        } else {
                            Type::Unknown
                        }
                    }
                }
            }
            _ => Type::Unknown,
        }
    }

    // Validation

    fn validate_nominals(&mut self) {
        let ids: Vec<NominalId> = self.nominals.iter().map(|site| site.id).collect();
        for id in ids {
            self.validate_access(id);
            self.validate_overrides(id);
            match self.registry.nominal(id).kind {
                NominalKind::Class => {
                    self.validate_interfaces(id);
                    self.validate_abstract(id);
                }
                NominalKind::Interface | NominalKind::Record => self.validate_super_interfaces(id),
            }
        }
    }

    fn validate_access(&mut self, id: NominalId) {
        let nominal = self.registry.nominal(id);
        let Some(parent) = &nominal.superclass else {
            return;
        };
        let parent_access = self.registry.access_of(parent.id);
        let mismatch = matches!(
            (nominal.access, parent_access),
            (AccessDiscipline::Struct, AccessDiscipline::Dict)
                | (AccessDiscipline::Dict, AccessDiscipline::Struct)
        );
        if mismatch {
            self.diagnostics.push(
                DiagnosticKind::StructDictInheritanceMismatch,
                format!(
                    "{} and its superclass {} disagree on struct/dict access",
                    nominal.name,
                    self.registry.nominal(parent.id).name
                ),
                nominal.span,
            );
        }
    }

    fn override_lattice(&self) -> Lattice<'_> {
        Lattice::new(&self.registry).with_bivariant_params(self.legacy_compatibility)
    }

    fn validate_overrides(&mut self, id: NominalId) {
        let instance = NominalInstance::new(
            id,
            self.registry
                .nominal(id)
                .type_params
                .iter()
                .map(|name| Type::type_var(name.clone()))
                .collect(),
        );
        let supertypes = self.registry.supertypes_of(&instance);
        let own: Vec<(String, PropertyDecl)> = self
            .registry
            .nominal(id)
            .properties
            .iter()
            .map(|(name, decl)| (name.clone(), decl.clone()))
            .collect();
        let mut problems = Vec::new();
        {
            let lattice = self.override_lattice();
            for (name, decl) in &own {
                if !decl.declared {
                    continue;
                }
                for supertype in &supertypes {
                    let Some(inherited) = self.registry.lookup_property(supertype, name) else {
                        continue;
                    };
                    if !inherited.decl.declared {
                        continue;
                    }
                    let found = strip_receiver(&decl.ty);
                    let expected = strip_receiver(&inherited.decl.ty);
                    if !lattice.is_subtype(&found, &expected) {
                        let detail = lattice
                            .explain_mismatch(&found, &expected)
                            .map(|detail| format!(" ({detail})"))
                            .unwrap_or_default();
                        problems.push((
                            decl.span,
                            format!(
                                "{}.{} has type {} which is incompatible with {} inherited from {}{}",
                                self.registry.nominal(id).name,
                                name,
                                found.describe(&self.registry),
                                expected.describe(&self.registry),
                                self.registry.nominal(inherited.owner).name,
                                detail
                            ),
                        ));
                    }
                }
            }
        }
        for (span, message) in problems {
            self.diagnostics
                .push(DiagnosticKind::InvalidPropertyOverride, message, span);
        }
    }

    fn validate_interfaces(&mut self, id: NominalId) {
        let instance = match self.registry.instance_of_self(id).objects().first() {
            Some(ObjectType::Instance(instance)) => instance.clone(),
            _ => return,
        };
        let nominal = self.registry.nominal(id);
        let class_chain = self.registry.superclass_chain(id);
        let mut interfaces = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<NominalInstance> = self.registry.supertypes_of(&instance).into();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.id) {
                continue;
            }
            if self.registry.nominal(current.id).kind.is_interface() {
                interfaces.push(current.clone());
            }
            queue.extend(self.registry.supertypes_of(&current));
        }

        let mut problems = Vec::new();
        let lattice = self.override_lattice();
        for interface in &interfaces {
            for (name, expected) in self.registry.all_properties(interface) {
                let implemented = class_chain.iter().find_map(|ancestor| {
                    let upcast = self.registry.upcast(&instance, *ancestor)?;
                    self.registry
                        .nominal(*ancestor)
                        .properties
                        .contains_key(&name)
                        .then(|| self.registry.lookup_property(&upcast, &name))
                        .flatten()
                });
                match implemented {
                    None => {
                        if !expected.decl.optional && !nominal.is_abstract {
                            problems.push((
                                DiagnosticKind::InterfaceMemberNotImplemented,
                                format!(
                                    "property {} of interface {} is not implemented by {}",
                                    name,
                                    self.registry.nominal(interface.id).name,
                                    nominal.name
                                ),
                            ));
                        }
                    }
                    Some(found) => {
                        let found_ty = strip_receiver(&found.decl.ty);
                        let expected_ty = strip_receiver(&expected.decl.ty);
                        if found.decl.declared && !lattice.is_subtype(&found_ty, &expected_ty) {
                            problems.push((
                                DiagnosticKind::InvalidPropertyOverride,
                                format!(
                                    "{}.{} has type {} but interface {} requires {}",
                                    nominal.name,
                                    name,
                                    found_ty.describe(&self.registry),
                                    self.registry.nominal(interface.id).name,
                                    expected_ty.describe(&self.registry)
                                ),
                            ));
                        }
                    }
                }
            }
        }
        let span = nominal.span;
        for (kind, message) in problems {
            self.diagnostics.push(kind, message, span);
        }
    }

    fn validate_abstract(&mut self, id: NominalId) {
        let nominal = self.registry.nominal(id);
        if nominal.is_abstract {
            return;
        }
        let mut missing = Vec::new();
        let mut seen = HashSet::new();
        // The class's own abstract members are reported as misplaced
        // elsewhere; they still shadow inherited ones.
        for (depth, ancestor) in self.registry.superclass_chain(id).into_iter().enumerate() {
            for (name, decl) in &self.registry.nominal(ancestor).properties {
                if !seen.insert(name.clone()) {
                    continue;
                }
                if decl.is_abstract && depth > 0 {
                    missing.push((name.clone(), self.registry.nominal(ancestor).name.clone()));
                }
            }
        }
        let span = nominal.span;
        let class_name = nominal.name.clone();
        for (name, owner) in missing {
            self.diagnostics.push(
                DiagnosticKind::AbstractMethodNotImplemented,
                format!("abstract method {owner}.{name} is not implemented by {class_name}"),
                span,
            );
        }
    }

    /// Properties reachable through two different super-interfaces must
    /// agree.
    fn validate_super_interfaces(&mut self, id: NominalId) {
        let nominal = self.registry.nominal(id);
        if nominal.interfaces.len() < 2 {
            return;
        }
        let lattice = Lattice::new(&self.registry);
        let mut seen: HashMap<String, (Type, NominalId)> = HashMap::new();
        let mut problems = Vec::new();
        for parent in &nominal.interfaces {
            for (name, lookup) in self.registry.all_properties(parent) {
                if nominal.properties.contains_key(&name) {
                    continue;
                }
                match seen.get(&name) {
                    Some((ty, owner)) if *owner != lookup.owner => {
                        let related = lattice.is_subtype(ty, &lookup.decl.ty)
                            || lattice.is_subtype(&lookup.decl.ty, ty);
                        if !related {
                            problems.push(format!(
                                "{} inherits property {} with incompatible types {} and {}",
                                nominal.name,
                                name,
                                ty.describe(&self.registry),
                                lookup.decl.ty.describe(&self.registry)
                            ));
                        }
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(name, (lookup.decl.ty.clone(), lookup.owner));
                    }
                }
            }
        }
        let span = nominal.span;
        for message in problems {
            self.diagnostics
                .push(DiagnosticKind::SuperInterfaceConflict, message, span);
        }
    }
}

/// Method types carry the owner as receiver; overrides compare without it.
fn strip_receiver(ty: &Type) -> Type {
    match ty {
        Type::Union(union) => {
            let mut union = (**union).clone();
            for object in &mut union.objects {
                if let ObjectType::Function(function) = object {
                    function.receiver = None;
                }
            }
            Type::Union(Box::new(union))
        }
        other => other.clone(),
    }
}

fn collect_suppressions(statements: &[Statement], suppressions: &mut Suppressions) {
    struct SuppressionVisitor<'s> {
        suppressions: &'s mut Suppressions,
    }

    impl<'p> Visitor<'p> for SuppressionVisitor<'_> {
        fn statement(&mut self, statement: &'p Statement) -> bool {
            match statement {
                Statement::Var(var) => {
                    if let Some(doc) = &var.jsdoc {
                        self.suppressions.add(var.span, &doc.suppressions);
                    }
                    for declarator in &var.declarations {
                        if let (Some(doc), Some(initializer)) = (&declarator.jsdoc, &declarator.initializer) {
                            let span = SourceSpan::union(&declarator.name.span, &initializer.span);
                            self.suppressions.add(span, &doc.suppressions);
                        }
                    }
                }
                Statement::Expression(statement) => {
                    if let Some(doc) = &statement.jsdoc {
                        self.suppressions.add(statement.expression.span, &doc.suppressions);
                    }
                }
                _ => {}
            }
            true
        }

        fn function(&mut self, function: &'p FunctionLiteral) -> bool {
            if let Some(doc) = &function.jsdoc {
                self.suppressions.add(function.span, &doc.suppressions);
            }
            true
        }

        fn class(&mut self, class: &'p ClassDeclaration) -> bool {
            if let Some(doc) = &class.jsdoc {
                self.suppressions.add(class.span, &doc.suppressions);
            }
            true
        }
    }

    let mut visitor = SuppressionVisitor { suppressions };
    walk_statements(statements, &mut visitor);
}
