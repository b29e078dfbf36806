//! Generic AST traversal.

use crate::ast::{ClassDeclaration, Expression, ExpressionKind, FunctionLiteral, Statement};

/// Callbacks for [`walk_statements`]. Each hook returns whether to descend
/// into the node's children.
pub(crate) trait Visitor<'p> {
    fn statement(&mut self, _statement: &'p Statement) -> bool {
        true
    }

    fn expression(&mut self, _expression: &'p Expression) -> bool {
        true
    }

    fn function(&mut self, _function: &'p FunctionLiteral) -> bool {
        true
    }

    fn class(&mut self, _class: &'p ClassDeclaration) -> bool {
        true
    }
}

pub(crate) fn walk_statements<'p, V: Visitor<'p>>(statements: &'p [Statement], visitor: &mut V) {
    for statement in statements {
        walk_statement(statement, visitor);
    }
}

pub(crate) fn walk_statement<'p, V: Visitor<'p>>(statement: &'p Statement, visitor: &mut V) {
    if !visitor.statement(statement) {
        return;
    }
    match statement {
        Statement::Var(var) => {
            for declarator in &var.declarations {
                if let Some(initializer) = &declarator.initializer {
                    walk_expression(initializer, visitor);
                }
            }
        }
        Statement::Function(declaration) => walk_function(&declaration.function, visitor),
        Statement::Class(class) => {
            if visitor.class(class) {
                if let Some(superclass) = &class.superclass {
                    walk_expression(superclass, visitor);
                }
                for member in &class.members {
                    walk_function(&member.function, visitor);
                }
            }
        }
        Statement::Expression(statement) => walk_expression(&statement.expression, visitor),
        Statement::Return(statement) => {
            if let Some(expression) = &statement.expression {
                walk_expression(expression, visitor);
            }
        }
        Statement::If(statement) => {
            walk_expression(&statement.condition, visitor);
            walk_statement(&statement.consequent, visitor);
            if let Some(alternative) = &statement.alternative {
                walk_statement(alternative, visitor);
            }
        }
        Statement::While(statement) => {
            walk_expression(&statement.condition, visitor);
            walk_statement(&statement.body, visitor);
        }
        Statement::DoWhile(statement) => {
            walk_statement(&statement.body, visitor);
            walk_expression(&statement.condition, visitor);
        }
        Statement::For(statement) => {
            if let Some(init) = &statement.init {
                walk_statement(init, visitor);
            }
            if let Some(condition) = &statement.condition {
                walk_expression(condition, visitor);
            }
            if let Some(update) = &statement.update {
                walk_expression(update, visitor);
            }
            walk_statement(&statement.body, visitor);
        }
        Statement::ForIn(statement) => {
            walk_expression(&statement.object, visitor);
            walk_statement(&statement.body, visitor);
        }
        Statement::Block(block) => walk_statements(&block.statements, visitor),
        Statement::Throw(statement) => walk_expression(&statement.expression, visitor),
        Statement::Try(statement) => {
            walk_statements(&statement.block.statements, visitor);
            if let Some(handler) = &statement.handler {
                walk_statements(&handler.body.statements, visitor);
            }
            if let Some(finalizer) = &statement.finalizer {
                walk_statements(&finalizer.statements, visitor);
            }
        }
        Statement::Switch(statement) => {
            walk_expression(&statement.discriminant, visitor);
            for case in &statement.cases {
                if let Some(test) = &case.test {
                    walk_expression(test, visitor);
                }
                walk_statements(&case.body, visitor);
            }
        }
        Statement::Break(_) | Statement::Continue(_) | Statement::Empty(_) => {}
    }
}

pub(crate) fn walk_function<'p, V: Visitor<'p>>(function: &'p FunctionLiteral, visitor: &mut V) {
    if visitor.function(function) {
        walk_statements(&function.body.statements, visitor);
    }
}

pub(crate) fn walk_expression<'p, V: Visitor<'p>>(expression: &'p Expression, visitor: &mut V) {
    if !visitor.expression(expression) {
        return;
    }
    match &expression.kind {
        ExpressionKind::Literal(_) | ExpressionKind::Identifier(_) | ExpressionKind::This => {}
        ExpressionKind::Member(member) => walk_expression(&member.object, visitor),
        ExpressionKind::Index(index) => {
            walk_expression(&index.object, visitor);
            walk_expression(&index.index, visitor);
        }
        ExpressionKind::Call(call) | ExpressionKind::New(call) => {
            walk_expression(&call.callee, visitor);
            for argument in &call.arguments {
                walk_expression(argument, visitor);
            }
        }
        ExpressionKind::Function(function) => walk_function(function, visitor),
        ExpressionKind::Object(object) => {
            for property in &object.properties {
                walk_expression(&property.value, visitor);
            }
        }
        ExpressionKind::Array(array) => {
            for element in &array.elements {
                walk_expression(element, visitor);
            }
        }
        ExpressionKind::Unary(unary) => walk_expression(&unary.operand, visitor),
        ExpressionKind::Update(update) => walk_expression(&update.target, visitor),
        ExpressionKind::Binary(binary) => {
            walk_expression(&binary.left, visitor);
            walk_expression(&binary.right, visitor);
        }
        ExpressionKind::Logical(logical) => {
            walk_expression(&logical.left, visitor);
            walk_expression(&logical.right, visitor);
        }
        ExpressionKind::Conditional(conditional) => {
            walk_expression(&conditional.test, visitor);
            walk_expression(&conditional.consequent, visitor);
            walk_expression(&conditional.alternative, visitor);
        }
        ExpressionKind::Assignment(assignment) => {
            walk_expression(&assignment.target, visitor);
            walk_expression(&assignment.value, visitor);
        }
        ExpressionKind::Cast(cast) => walk_expression(&cast.expression, visitor),
    }
}

/// Function literals nested directly in `statements`, not inside another
/// function.
pub(crate) fn child_functions(statements: &[Statement]) -> Vec<&FunctionLiteral> {
    struct Children<'p> {
        found: Vec<&'p FunctionLiteral>,
    }

    impl<'p> Visitor<'p> for Children<'p> {
        fn function(&mut self, function: &'p FunctionLiteral) -> bool {
            self.found.push(function);
            false
        }
    }

    let mut children = Children { found: Vec::new() };
    walk_statements(statements, &mut children);
    children.found
}

/// Names called directly (`f(...)`) in `statements`, outside nested
/// functions.
pub(crate) fn called_names(statements: &[Statement]) -> Vec<&str> {
    struct Calls<'p> {
        names: Vec<&'p str>,
    }

    impl<'p> Visitor<'p> for Calls<'p> {
        fn function(&mut self, _function: &'p FunctionLiteral) -> bool {
            false
        }

        fn expression(&mut self, expression: &'p Expression) -> bool {
            if let ExpressionKind::Call(call) | ExpressionKind::New(call) = &expression.kind {
                if let ExpressionKind::Identifier(identifier) = &call.callee.kind {
                    self.names.push(identifier.name.as_str());
                }
            }
            true
        }
    }

    let mut calls = Calls { names: Vec::new() };
    walk_statements(statements, &mut calls);
    calls.names
}
