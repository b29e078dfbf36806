//! # AST builder
//!
//! A fluent way to put programs together without a parser, for tests and
//! for embedders that produce the AST themselves.
//!
//! Every node gets its own line, and composite nodes span their children,
//! so diagnostics point somewhere distinct and `@suppress` regions nest the
//! way they would in source. Function literal ids are handed out in
//! creation order.

use std::cell::Cell;

use crate::ast::*;

#[derive(Debug)]
pub struct AstBuilder {
    next_line: Cell<usize>,
    next_function: Cell<usize>,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            next_line: Cell::new(1),
            next_function: Cell::new(0),
        }
    }

    /// Starts function ids at `first`, so a second builder can produce
    /// externs whose ids do not collide with the program's.
    pub fn with_function_ids_from(first: usize) -> Self {
        let builder = Self::new();
        builder.next_function.set(first);
        builder
    }

    fn fresh(&self) -> SourceSpan {
        let line = self.next_line.get();
        self.next_line.set(line + 1);
        SourceSpan::new(line, 1, line, 2)
    }

    fn cover(&self, spans: impl IntoIterator<Item = SourceSpan>) -> SourceSpan {
        let own = self.fresh();
        spans
            .into_iter()
            .fold(own, |acc, span| SourceSpan::union(&acc, &span))
    }

    fn expression(&self, kind: ExpressionKind, children: &[SourceSpan]) -> Expression {
        Expression::new(kind, self.cover(children.iter().copied()))
    }

    pub fn program(&self, statements: Vec<Statement>) -> Program {
        Program::new(statements)
    }

    // Expressions

    pub fn num(&self, value: f64) -> Expression {
        self.expression(ExpressionKind::Literal(Literal::Number(value)), &[])
    }

    pub fn str(&self, value: &str) -> Expression {
        self.expression(ExpressionKind::Literal(Literal::String(value.to_string())), &[])
    }

    pub fn boolean(&self, value: bool) -> Expression {
        self.expression(ExpressionKind::Literal(Literal::Boolean(value)), &[])
    }

    pub fn null(&self) -> Expression {
        self.expression(ExpressionKind::Literal(Literal::Null), &[])
    }

    pub fn undefined(&self) -> Expression {
        self.expression(ExpressionKind::Literal(Literal::Undefined), &[])
    }

    pub fn ident(&self, name: &str) -> Expression {
        let span = self.fresh();
        Expression::new(ExpressionKind::Identifier(Identifier::new(name, span)), span)
    }

    pub fn this(&self) -> Expression {
        self.expression(ExpressionKind::This, &[])
    }

    /// `object.property`, or a dotted chain such as `a.b.c` when `object`
    /// is given as an identifier path.
    pub fn member(&self, object: Expression, property: &str) -> Expression {
        let property_span = self.fresh();
        let spans = [object.span, property_span];
        self.expression(
            ExpressionKind::Member(MemberExpression {
                object: Box::new(object),
                property: property.to_string(),
                property_span,
            }),
            &spans,
        )
    }

    /// Builds `a.b.c` from `"a.b.c"`.
    pub fn path(&self, dotted: &str) -> Expression {
        let mut parts = dotted.split('.');
        let first = parts.next().unwrap_or_default();
        let root = if first == "this" {
            self.this()
        } else {
            self.ident(first)
        };
        parts.fold(root, |object, part| self.member(object, part))
    }

    pub fn index(&self, object: Expression, index: Expression) -> Expression {
        let spans = [object.span, index.span];
        self.expression(
            ExpressionKind::Index(IndexExpression {
                object: Box::new(object),
                index: Box::new(index),
            }),
            &spans,
        )
    }

    pub fn call(&self, callee: Expression, arguments: Vec<Expression>) -> Expression {
        let spans = self.call_spans(&callee, &arguments);
        self.expression(
            ExpressionKind::Call(CallExpression {
                callee: Box::new(callee),
                arguments,
            }),
            &spans,
        )
    }

    pub fn new_(&self, callee: Expression, arguments: Vec<Expression>) -> Expression {
        let spans = self.call_spans(&callee, &arguments);
        self.expression(
            ExpressionKind::New(CallExpression {
                callee: Box::new(callee),
                arguments,
            }),
            &spans,
        )
    }

    fn call_spans(&self, callee: &Expression, arguments: &[Expression]) -> Vec<SourceSpan> {
        std::iter::once(callee.span)
            .chain(arguments.iter().map(|argument| argument.span))
            .collect()
    }

    pub fn function_literal(&self, parameters: &[&str], body: Vec<Statement>) -> FunctionLiteral {
        self.make_function(None, parameters, body, None, false)
    }

    fn make_function(
        &self,
        name: Option<&str>,
        parameters: &[&str],
        body: Vec<Statement>,
        jsdoc: Option<JsDoc>,
        is_arrow: bool,
    ) -> FunctionLiteral {
        let id = self.next_function.get();
        self.next_function.set(id + 1);
        let parameters: Vec<Identifier> = parameters
            .iter()
            .map(|name| Identifier::new(*name, self.fresh()))
            .collect();
        let body_span = self.cover(body.iter().map(Statement::span));
        let span = self.cover(
            parameters
                .iter()
                .map(|parameter| parameter.span)
                .chain(std::iter::once(body_span)),
        );
        FunctionLiteral {
            id,
            name: name.map(str::to_string),
            parameters,
            body: Block {
                statements: body,
                span: body_span,
            },
            jsdoc,
            is_arrow,
            span,
        }
    }

    pub fn function(&self, parameters: &[&str], body: Vec<Statement>) -> Expression {
        let function = self.function_literal(parameters, body);
        let span = function.span;
        Expression::new(ExpressionKind::Function(function), span)
    }

    pub fn function_doc(&self, jsdoc: impl Into<JsDoc>, parameters: &[&str], body: Vec<Statement>) -> Expression {
        let function = self.make_function(None, parameters, body, Some(jsdoc.into()), false);
        let span = function.span;
        Expression::new(ExpressionKind::Function(function), span)
    }

    pub fn arrow(&self, parameters: &[&str], body: Vec<Statement>) -> Expression {
        let function = self.make_function(None, parameters, body, None, true);
        let span = function.span;
        Expression::new(ExpressionKind::Function(function), span)
    }

    pub fn object(&self, properties: Vec<(&str, Expression)>) -> Expression {
        self.object_doc(
            properties
                .into_iter()
                .map(|(key, value)| (key, None, value))
                .collect(),
        )
    }

    pub fn object_doc(&self, properties: Vec<(&str, Option<JsDoc>, Expression)>) -> Expression {
        let properties: Vec<ObjectProperty> = properties
            .into_iter()
            .map(|(key, jsdoc, value)| {
                let span = self.cover([value.span]);
                ObjectProperty {
                    key: key.to_string(),
                    value,
                    jsdoc,
                    span,
                }
            })
            .collect();
        let spans: Vec<SourceSpan> = properties.iter().map(|property| property.span).collect();
        self.expression(ExpressionKind::Object(ObjectLiteral { properties }), &spans)
    }

    pub fn array(&self, elements: Vec<Expression>) -> Expression {
        let spans: Vec<SourceSpan> = elements.iter().map(|element| element.span).collect();
        self.expression(ExpressionKind::Array(ArrayLiteral { elements }), &spans)
    }

    pub fn unary(&self, operator: UnaryOperator, operand: Expression) -> Expression {
        let spans = [operand.span];
        self.expression(
            ExpressionKind::Unary(UnaryExpression {
                operator,
                operand: Box::new(operand),
            }),
            &spans,
        )
    }

    pub fn not(&self, operand: Expression) -> Expression {
        self.unary(UnaryOperator::Not, operand)
    }

    pub fn typeof_(&self, operand: Expression) -> Expression {
        self.unary(UnaryOperator::Typeof, operand)
    }

    pub fn increment(&self, target: Expression) -> Expression {
        let spans = [target.span];
        self.expression(
            ExpressionKind::Update(UpdateExpression {
                operator: UpdateOperator::Increment,
                prefix: false,
                target: Box::new(target),
            }),
            &spans,
        )
    }

    pub fn binary(&self, operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
        let spans = [left.span, right.span];
        self.expression(
            ExpressionKind::Binary(BinaryExpression {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            }),
            &spans,
        )
    }

    pub fn logical(&self, operator: LogicalOperator, left: Expression, right: Expression) -> Expression {
        let spans = [left.span, right.span];
        self.expression(
            ExpressionKind::Logical(LogicalExpression {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            }),
            &spans,
        )
    }

    pub fn and(&self, left: Expression, right: Expression) -> Expression {
        self.logical(LogicalOperator::And, left, right)
    }

    pub fn or(&self, left: Expression, right: Expression) -> Expression {
        self.logical(LogicalOperator::Or, left, right)
    }

    pub fn conditional(&self, test: Expression, consequent: Expression, alternative: Expression) -> Expression {
        let spans = [test.span, consequent.span, alternative.span];
        self.expression(
            ExpressionKind::Conditional(ConditionalExpression {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternative: Box::new(alternative),
            }),
            &spans,
        )
    }

    pub fn assign(&self, target: Expression, value: Expression) -> Expression {
        self.make_assignment(None, target, value)
    }

    pub fn compound_assign(&self, operator: BinaryOperator, target: Expression, value: Expression) -> Expression {
        self.make_assignment(Some(operator), target, value)
    }

    fn make_assignment(&self, operator: Option<BinaryOperator>, target: Expression, value: Expression) -> Expression {
        let spans = [target.span, value.span];
        self.expression(
            ExpressionKind::Assignment(AssignmentExpression {
                operator,
                target: Box::new(target),
                value: Box::new(value),
            }),
            &spans,
        )
    }

    pub fn cast(&self, annotation: TypeAnnotation, expression: Expression) -> Expression {
        let spans = [expression.span];
        self.expression(
            ExpressionKind::Cast(CastExpression {
                annotation,
                expression: Box::new(expression),
            }),
            &spans,
        )
    }

    // Statements

    pub fn var(&self, name: &str, initializer: Option<Expression>) -> Statement {
        self.declare(VarKind::Var, None, name, initializer)
    }

    pub fn var_doc(&self, jsdoc: impl Into<JsDoc>, name: &str, initializer: Option<Expression>) -> Statement {
        self.declare(VarKind::Var, Some(jsdoc.into()), name, initializer)
    }

    pub fn let_(&self, name: &str, initializer: Option<Expression>) -> Statement {
        self.declare(VarKind::Let, None, name, initializer)
    }

    pub fn const_(&self, name: &str, initializer: Expression) -> Statement {
        self.declare(VarKind::Const, None, name, Some(initializer))
    }

    fn declare(
        &self,
        kind: VarKind,
        jsdoc: Option<JsDoc>,
        name: &str,
        initializer: Option<Expression>,
    ) -> Statement {
        let mut initializer = initializer;
        if let (Some(doc), Some(value)) = (&jsdoc, initializer.as_mut()) {
            annotate_function_value(value, doc);
        }
        let name = Identifier::new(name, self.fresh());
        let span = self.cover(
            std::iter::once(name.span).chain(initializer.iter().map(|initializer| initializer.span)),
        );
        Statement::Var(VarStatement {
            kind,
            declarations: vec![VarDeclarator {
                name,
                jsdoc: None,
                initializer,
            }],
            jsdoc,
            span,
        })
    }

    pub fn function_decl(&self, name: &str, parameters: &[&str], body: Vec<Statement>) -> Statement {
        self.make_function_decl(name, None, parameters, body)
    }

    pub fn function_decl_doc(
        &self,
        jsdoc: impl Into<JsDoc>,
        name: &str,
        parameters: &[&str],
        body: Vec<Statement>,
    ) -> Statement {
        self.make_function_decl(name, Some(jsdoc.into()), parameters, body)
    }

    fn make_function_decl(
        &self,
        name: &str,
        jsdoc: Option<JsDoc>,
        parameters: &[&str],
        body: Vec<Statement>,
    ) -> Statement {
        let identifier = Identifier::new(name, self.fresh());
        let function = self.make_function(Some(name), parameters, body, jsdoc, false);
        Statement::Function(FunctionDeclaration {
            name: identifier,
            function,
        })
    }

    pub fn expr(&self, expression: Expression) -> Statement {
        Statement::Expression(ExpressionStatement {
            expression,
            jsdoc: None,
        })
    }

    /// `/** ... */ a.b.c = value;` or, without a value, the stub `a.b.c;`.
    pub fn expr_doc(&self, jsdoc: impl Into<JsDoc>, expression: Expression) -> Statement {
        let jsdoc = jsdoc.into();
        let mut expression = expression;
        if let ExpressionKind::Assignment(assignment) = &mut expression.kind {
            annotate_function_value(&mut assignment.value, &jsdoc);
        }
        Statement::Expression(ExpressionStatement {
            expression,
            jsdoc: Some(jsdoc),
        })
    }

    pub fn ret(&self, expression: Option<Expression>) -> Statement {
        let span = self.cover(expression.iter().map(|expression| expression.span));
        Statement::Return(ReturnStatement { span, expression })
    }

    pub fn if_(&self, condition: Expression, consequent: Vec<Statement>, alternative: Option<Vec<Statement>>) -> Statement {
        let consequent = self.block(consequent);
        let alternative = alternative.map(|statements| Box::new(self.block(statements)));
        let span = self.cover(
            [condition.span, consequent.span()]
                .into_iter()
                .chain(alternative.iter().map(|alternative| alternative.span())),
        );
        Statement::If(IfStatement {
            condition,
            consequent: Box::new(consequent),
            alternative,
            span,
        })
    }

    pub fn while_(&self, condition: Expression, body: Vec<Statement>) -> Statement {
        let body = self.block(body);
        let span = self.cover([condition.span, body.span()]);
        Statement::While(WhileStatement {
            condition,
            body: Box::new(body),
            span,
        })
    }

    pub fn do_while(&self, body: Vec<Statement>, condition: Expression) -> Statement {
        let body = self.block(body);
        let span = self.cover([body.span(), condition.span]);
        Statement::DoWhile(DoWhileStatement {
            body: Box::new(body),
            condition,
            span,
        })
    }

    pub fn for_(
        &self,
        init: Option<Statement>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Vec<Statement>,
    ) -> Statement {
        let body = self.block(body);
        let span = self.cover(
            init.iter()
                .map(Statement::span)
                .chain(condition.iter().map(|condition| condition.span))
                .chain(update.iter().map(|update| update.span))
                .chain(std::iter::once(body.span())),
        );
        Statement::For(ForStatement {
            init: init.map(Box::new),
            condition,
            update,
            body: Box::new(body),
            span,
        })
    }

    pub fn for_in(&self, variable: &str, object: Expression, body: Vec<Statement>) -> Statement {
        let variable = Identifier::new(variable, self.fresh());
        let body = self.block(body);
        let span = self.cover([variable.span, object.span, body.span()]);
        Statement::ForIn(ForInStatement {
            variable,
            declaration: Some(VarKind::Var),
            object,
            body: Box::new(body),
            span,
        })
    }

    pub fn block(&self, statements: Vec<Statement>) -> Statement {
        Statement::Block(self.make_block(statements))
    }

    fn make_block(&self, statements: Vec<Statement>) -> Block {
        let span = self.cover(statements.iter().map(Statement::span));
        Block { statements, span }
    }

    pub fn break_(&self) -> Statement {
        Statement::Break(self.fresh())
    }

    pub fn continue_(&self) -> Statement {
        Statement::Continue(self.fresh())
    }

    pub fn throw(&self, expression: Expression) -> Statement {
        let span = self.cover([expression.span]);
        Statement::Throw(ThrowStatement { expression, span })
    }

    pub fn try_(
        &self,
        block: Vec<Statement>,
        handler: Option<(Option<&str>, Vec<Statement>)>,
        finalizer: Option<Vec<Statement>>,
    ) -> Statement {
        let block = self.make_block(block);
        let handler = handler.map(|(parameter, body)| CatchClause {
            parameter: parameter.map(|name| Identifier::new(name, self.fresh())),
            body: self.make_block(body),
        });
        let finalizer = finalizer.map(|statements| self.make_block(statements));
        let span = self.cover(
            std::iter::once(block.span)
                .chain(handler.iter().map(|handler| handler.body.span))
                .chain(finalizer.iter().map(|finalizer| finalizer.span)),
        );
        Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
            span,
        })
    }

    pub fn switch(&self, discriminant: Expression, cases: Vec<(Option<Expression>, Vec<Statement>)>) -> Statement {
        let cases: Vec<SwitchCase> = cases
            .into_iter()
            .map(|(test, body)| SwitchCase { test, body })
            .collect();
        let span = self.cover(
            std::iter::once(discriminant.span).chain(
                cases
                    .iter()
                    .flat_map(|case| case.test.iter().map(|test| test.span).chain(case.body.iter().map(Statement::span))),
            ),
        );
        Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            span,
        })
    }

    pub fn class(
        &self,
        jsdoc: Option<JsDoc>,
        name: &str,
        superclass: Option<Expression>,
        members: Vec<ClassMember>,
    ) -> Statement {
        let name = Identifier::new(name, self.fresh());
        let span = self.cover(
            std::iter::once(name.span)
                .chain(superclass.iter().map(|superclass| superclass.span))
                .chain(members.iter().map(|member| member.function.span)),
        );
        Statement::Class(ClassDeclaration {
            name,
            superclass,
            members,
            jsdoc,
            span,
        })
    }

    pub fn constructor(&self, jsdoc: Option<JsDoc>, parameters: &[&str], body: Vec<Statement>) -> ClassMember {
        self.class_member(ClassMemberKind::Constructor, "constructor", jsdoc, parameters, body)
    }

    pub fn method(&self, jsdoc: Option<JsDoc>, name: &str, parameters: &[&str], body: Vec<Statement>) -> ClassMember {
        self.class_member(ClassMemberKind::Method, name, jsdoc, parameters, body)
    }

    pub fn static_method(
        &self,
        jsdoc: Option<JsDoc>,
        name: &str,
        parameters: &[&str],
        body: Vec<Statement>,
    ) -> ClassMember {
        self.class_member(ClassMemberKind::StaticMethod, name, jsdoc, parameters, body)
    }

    fn class_member(
        &self,
        kind: ClassMemberKind,
        name: &str,
        jsdoc: Option<JsDoc>,
        parameters: &[&str],
        body: Vec<Statement>,
    ) -> ClassMember {
        ClassMember {
            name: name.to_string(),
            kind,
            function: self.make_function(Some(name), parameters, body, jsdoc, false),
        }
    }
}

/// A comment on a statement whose value is a function literal annotates the
/// literal too, as a parser would attach it.
fn annotate_function_value(value: &mut Expression, jsdoc: &JsDoc) {
    if let ExpressionKind::Function(function) = &mut value.kind {
        if function.jsdoc.is_none() {
            function.jsdoc = Some(jsdoc.clone());
        }
    }
}

/// Chainable JSDoc construction.
#[derive(Debug, Clone, Default)]
pub struct Doc(JsDoc);

impl Doc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ty(mut self, annotation: TypeAnnotation) -> Self {
        self.0.type_annotation = Some(annotation);
        self
    }

    pub fn param(mut self, name: &str, annotation: TypeAnnotation) -> Self {
        self.0.params.push(ParamTag {
            name: name.to_string(),
            annotation,
        });
        self
    }

    pub fn returns(mut self, annotation: TypeAnnotation) -> Self {
        self.0.return_type = Some(annotation);
        self
    }

    pub fn this(mut self, annotation: TypeAnnotation) -> Self {
        self.0.this_type = Some(annotation);
        self
    }

    pub fn template(mut self, name: &str) -> Self {
        self.0.templates.push(name.to_string());
        self
    }

    pub fn constructor(mut self) -> Self {
        self.0.kind = Some(DeclarationKind::Constructor);
        self
    }

    pub fn interface(mut self) -> Self {
        self.0.kind = Some(DeclarationKind::Interface);
        self
    }

    pub fn record(mut self) -> Self {
        self.0.kind = Some(DeclarationKind::Record);
        self
    }

    pub fn extends(mut self, annotation: TypeAnnotation) -> Self {
        self.0.extends.push(annotation);
        self
    }

    pub fn implements(mut self, annotation: TypeAnnotation) -> Self {
        self.0.implements.push(annotation);
        self
    }

    pub fn enum_of(mut self, annotation: TypeAnnotation) -> Self {
        self.0.is_enum = true;
        self.0.enum_type = Some(annotation);
        self
    }

    pub fn typedef(mut self, annotation: TypeAnnotation) -> Self {
        self.0.is_typedef = true;
        self.0.typedef = Some(annotation);
        self
    }

    pub fn constant(mut self) -> Self {
        self.0.is_const = true;
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.0.is_abstract = true;
        self
    }

    pub fn access(mut self, access: AccessDiscipline) -> Self {
        self.0.access = Some(access);
        self
    }

    pub fn suppress(mut self, name: &str) -> Self {
        self.0.suppressions.push(name.to_string());
        self
    }

    pub fn build(self) -> JsDoc {
        self.0
    }
}

impl From<Doc> for JsDoc {
    fn from(doc: Doc) -> Self {
        doc.0
    }
}

/// Type annotation constructors.
pub mod ty {
    use crate::ast::{FunctionAnnotation, RecordField, TypeAnnotation, TypeAnnotationKind};

    pub fn named(name: &str) -> TypeAnnotation {
        generic(name, Vec::new())
    }

    pub fn generic(name: &str, arguments: Vec<TypeAnnotation>) -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Named {
            name: name.to_string(),
            arguments,
        })
    }

    pub fn number() -> TypeAnnotation {
        named("number")
    }

    pub fn string() -> TypeAnnotation {
        named("string")
    }

    pub fn boolean() -> TypeAnnotation {
        named("boolean")
    }

    pub fn any() -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Any)
    }

    pub fn unknown() -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Unknown)
    }

    pub fn nullable(inner: TypeAnnotation) -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Nullable(Box::new(inner)))
    }

    pub fn non_null(inner: TypeAnnotation) -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::NonNull(Box::new(inner)))
    }

    pub fn optional(inner: TypeAnnotation) -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Optional(Box::new(inner)))
    }

    pub fn rest(inner: TypeAnnotation) -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Rest(Box::new(inner)))
    }

    pub fn union(members: Vec<TypeAnnotation>) -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Union(members))
    }

    pub fn record(fields: Vec<(&str, TypeAnnotation)>) -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Record(
            fields
                .into_iter()
                .map(|(name, annotation)| RecordField {
                    name: name.to_string(),
                    annotation: Some(annotation),
                })
                .collect(),
        ))
    }

    pub fn function(parameters: Vec<TypeAnnotation>, return_type: Option<TypeAnnotation>) -> TypeAnnotation {
        TypeAnnotation::new(TypeAnnotationKind::Function(FunctionAnnotation {
            this_type: None,
            new_type: None,
            parameters,
            return_type: return_type.map(Box::new),
        }))
    }
}
