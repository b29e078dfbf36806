//! Backward inference of undeclared formals.
//!
//! The body is walked once from its last statement to its first. A use that
//! constrains a formal (an arithmetic operand, an argument passed where a
//! declared parameter type is expected) records a demand; an assignment to
//! the formal cancels demands recorded after it. What survives at entry is
//! the demand of the first use. Formals that are only dereferenced get a
//! loose record of the properties seen on them, each property typed by the
//! join of what its uses demand.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use super::scope::{LocalKind, ScopeId, ScopeTree};
use crate::ast::{
    BinaryOperator, Expression, ExpressionKind, Statement, UnaryOperator,
};
use crate::registry::{Declaration, NamespaceMember, Registry};
use crate::types::{FunctionType, Lattice, Property, RecordType, Type};

#[derive(Debug, Clone, Default)]
struct Demand {
    required: HashMap<String, Type>,
}

impl Demand {
    /// Both paths are possible; the first one to demand something wins.
    fn merge(mut self, other: Demand) -> Demand {
        for (name, ty) in other.required {
            self.required.entry(name).or_insert(ty);
        }
        self
    }
}

pub(super) struct BackwardInference<'a, 'p> {
    registry: &'a Registry,
    tree: &'a ScopeTree<'p>,
    scope: ScopeId,
    formals: HashSet<String>,
    properties: HashMap<String, IndexSet<String>>,
    property_demands: HashMap<(String, String), Type>,
}

impl<'a, 'p> BackwardInference<'a, 'p> {
    pub fn new(registry: &'a Registry, tree: &'a ScopeTree<'p>, scope: ScopeId, formals: Vec<String>) -> Self {
        Self {
            registry,
            tree,
            scope,
            formals: formals.into_iter().collect(),
            properties: HashMap::new(),
            property_demands: HashMap::new(),
        }
    }

    /// Tentative type for each formal; `?` when the body says nothing.
    pub fn run(mut self, body: &[Statement]) -> HashMap<String, Type> {
        let mut demand = Demand::default();
        self.statements(body, &mut demand);
        let mut inferred = HashMap::new();
        for name in &self.formals {
            let ty = match demand.required.remove(name) {
                Some(ty) => ty,
                None => match self.properties.get(name) {
                    Some(properties) if !properties.is_empty() => {
                        let mut record = RecordType::loose();
                        record.properties = properties
                            .iter()
                            .map(|property| {
                                let ty = self
                                    .property_demands
                                    .remove(&(name.clone(), property.clone()))
                                    .unwrap_or(Type::Unknown);
                                (property.clone(), Property::inferred(ty))
                            })
                            .collect::<IndexMap<_, _>>();
                        Type::record(record)
                    }
                    _ => Type::Unknown,
                },
            };
            inferred.insert(name.clone(), ty);
        }
        inferred
    }

    fn statements(&mut self, statements: &[Statement], demand: &mut Demand) {
        for statement in statements.iter().rev() {
            self.statement(statement, demand);
        }
    }

    fn branch(&mut self, statement: &Statement, demand: &Demand) -> Demand {
        let mut branch = demand.clone();
        self.statement(statement, &mut branch);
        branch
    }

    fn statement(&mut self, statement: &Statement, demand: &mut Demand) {
        match statement {
            Statement::Var(var) => {
                for declarator in var.declarations.iter().rev() {
                    if self.formals.contains(&declarator.name.name) && declarator.initializer.is_some() {
                        demand.required.remove(&declarator.name.name);
                    }
                    if let Some(initializer) = &declarator.initializer {
                        self.expression(initializer, demand);
                    }
                }
            }
            Statement::Expression(statement) => self.expression(&statement.expression, demand),
            Statement::Return(statement) => {
                // Nothing after a return is reachable from it.
                demand.required.clear();
                if let Some(expression) = &statement.expression {
                    self.expression(expression, demand);
                }
            }
            Statement::Throw(statement) => {
                demand.required.clear();
                self.expression(&statement.expression, demand);
            }
            Statement::If(statement) => {
                let consequent = self.branch(&statement.consequent, demand);
                let alternative = match &statement.alternative {
                    Some(alternative) => self.branch(alternative, demand),
                    None => demand.clone(),
                };
                *demand = consequent.merge(alternative);
                self.expression(&statement.condition, demand);
            }
            Statement::While(statement) => {
                let body = self.branch(&statement.body, demand);
                *demand = body.merge(demand.clone());
                self.expression(&statement.condition, demand);
            }
            Statement::DoWhile(statement) => {
                self.expression(&statement.condition, demand);
                self.statement(&statement.body, demand);
            }
            Statement::For(statement) => {
                let mut body = demand.clone();
                if let Some(update) = &statement.update {
                    self.expression(update, &mut body);
                }
                self.statement(&statement.body, &mut body);
                *demand = body.merge(demand.clone());
                if let Some(condition) = &statement.condition {
                    self.expression(condition, demand);
                }
                if let Some(init) = &statement.init {
                    self.statement(init, demand);
                }
            }
            Statement::ForIn(statement) => {
                let mut body = self.branch(&statement.body, demand);
                body.required.remove(&statement.variable.name);
                *demand = body.merge(demand.clone());
                self.expression(&statement.object, demand);
            }
            Statement::Block(block) => self.statements(&block.statements, demand),
            Statement::Try(statement) => {
                if let Some(finalizer) = &statement.finalizer {
                    self.statements(&finalizer.statements, demand);
                }
                let handler = statement.handler.as_ref().map(|handler| {
                    let mut branch = demand.clone();
                    self.statements(&handler.body.statements, &mut branch);
                    branch
                });
                self.statements(&statement.block.statements, demand);
                if let Some(handler) = handler {
                    *demand = demand.clone().merge(handler);
                }
            }
            Statement::Switch(statement) => {
                let mut merged = demand.clone();
                for case in statement.cases.iter().rev() {
                    let mut branch = demand.clone();
                    self.statements(&case.body, &mut branch);
                    if let Some(test) = &case.test {
                        self.expression(test, &mut branch);
                    }
                    merged = branch.merge(merged);
                }
                *demand = merged;
                self.expression(&statement.discriminant, demand);
            }
            Statement::Function(_)
            | Statement::Class(_)
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Empty(_) => {}
        }
    }

    fn formal<'e>(&self, expression: &'e Expression) -> Option<&'e str> {
        match &expression.kind {
            ExpressionKind::Identifier(identifier) if self.formals.contains(&identifier.name) => {
                Some(identifier.name.as_str())
            }
            _ => None,
        }
    }

    /// `formal.property`, for a formal of this function.
    fn formal_property<'e>(&self, expression: &'e Expression) -> Option<(&'e str, &'e str)> {
        match &expression.kind {
            ExpressionKind::Member(member) => {
                self.formal(&member.object).map(|name| (name, member.property.as_str()))
            }
            _ => None,
        }
    }

    /// Property uses accumulate over the whole body; assignments to the
    /// formal do not cancel them.
    fn demand_property(&mut self, expression: &Expression, ty: Type) {
        let Some((name, property)) = self.formal_property(expression) else {
            return;
        };
        let key = (name.to_string(), property.to_string());
        let joined = match self.property_demands.get(&key) {
            Some(previous) => Lattice::new(self.registry).join(previous, &ty),
            None => ty,
        };
        self.property_demands.insert(key, joined);
    }

    fn demand_number(&mut self, expression: &Expression, demand: &mut Demand) {
        if let Some(name) = self.formal(expression) {
            demand.required.insert(name.to_string(), Type::number());
        }
        self.demand_property(expression, Type::number());
    }

    fn expression(&mut self, expression: &Expression, demand: &mut Demand) {
        match &expression.kind {
            ExpressionKind::Literal(_) | ExpressionKind::Identifier(_) | ExpressionKind::This => {}
            ExpressionKind::Member(member) => {
                if let Some(name) = self.formal(&member.object) {
                    self.properties
                        .entry(name.to_string())
                        .or_default()
                        .insert(member.property.clone());
                }
                self.expression(&member.object, demand);
            }
            ExpressionKind::Index(index) => {
                self.expression(&index.index, demand);
                self.expression(&index.object, demand);
            }
            ExpressionKind::Call(call) | ExpressionKind::New(call) => {
                let is_new = matches!(expression.kind, ExpressionKind::New(_));
                let params = self.callee_params(&call.callee, is_new);
                for (index, argument) in call.arguments.iter().enumerate().rev() {
                    self.expression(argument, demand);
                    let expected = params.as_ref().and_then(|params| params.get(index)).cloned().flatten();
                    if let Some(expected) = expected {
                        if !expected.is_unknown() && !expected.contains_type_vars() {
                            if let Some(name) = self.formal(argument) {
                                demand.required.insert(name.to_string(), expected.clone());
                            }
                            self.demand_property(argument, expected);
                        }
                    }
                }
                self.demand_property(&call.callee, Type::function(FunctionType::any()));
                self.expression(&call.callee, demand);
            }
            ExpressionKind::Function(_) => {}
            ExpressionKind::Object(object) => {
                for property in object.properties.iter().rev() {
                    self.expression(&property.value, demand);
                }
            }
            ExpressionKind::Array(array) => {
                for element in array.elements.iter().rev() {
                    self.expression(element, demand);
                }
            }
            ExpressionKind::Unary(unary) => {
                if matches!(unary.operator, UnaryOperator::Negative | UnaryOperator::BitNot) {
                    self.demand_number(&unary.operand, demand);
                }
                self.expression(&unary.operand, demand);
            }
            ExpressionKind::Update(update) => {
                self.demand_number(&update.target, demand);
                self.expression(&update.target, demand);
            }
            ExpressionKind::Binary(binary) => {
                if binary.operator.is_arithmetic() {
                    self.demand_number(&binary.right, demand);
                }
                self.expression(&binary.right, demand);
                if binary.operator.is_arithmetic() {
                    self.demand_number(&binary.left, demand);
                }
                self.expression(&binary.left, demand);
            }
            ExpressionKind::Logical(logical) => {
                let mut right = demand.clone();
                self.expression(&logical.right, &mut right);
                *demand = right.merge(demand.clone());
                self.expression(&logical.left, demand);
            }
            ExpressionKind::Conditional(conditional) => {
                let mut consequent = demand.clone();
                self.expression(&conditional.consequent, &mut consequent);
                let mut alternative = demand.clone();
                self.expression(&conditional.alternative, &mut alternative);
                *demand = consequent.merge(alternative);
                self.expression(&conditional.test, demand);
            }
            ExpressionKind::Assignment(assignment) => {
                match (self.formal(&assignment.target), assignment.operator) {
                    (Some(name), None) => {
                        demand.required.remove(name);
                    }
                    (Some(_), Some(operator)) if operator != BinaryOperator::Add => {
                        self.demand_number(&assignment.target, demand);
                    }
                    _ => {}
                }
                self.expression(&assignment.value, demand);
                if self.formal(&assignment.target).is_none() {
                    self.expression(&assignment.target, demand);
                }
            }
            ExpressionKind::Cast(cast) => self.expression(&cast.expression, demand),
        }
    }

    /// Declared parameter types of a callee named directly, when known.
    fn callee_params(&self, callee: &Expression, is_new: bool) -> Option<Vec<Option<Type>>> {
        let ExpressionKind::Identifier(identifier) = &callee.kind else {
            return None;
        };
        if let Some((_, local)) = self.tree.resolve(self.scope, &identifier.name) {
            let function = match local.kind {
                LocalKind::Function(function) => Some(function),
                _ => local.function,
            }?;
            let decl = self.registry.function(function)?;
            return Some(decl.signature.params.iter().map(|param| param.ty.clone()).collect());
        }
        if is_new {
            if let Some(Declaration::Nominal(id)) = self.registry.lookup(&identifier.name) {
                let constructor = self.registry.nominal(id).constructor.as_ref()?;
                return Some(
                    constructor
                        .required
                        .iter()
                        .chain(constructor.optional.iter())
                        .map(|ty| Some(ty.clone()))
                        .collect(),
                );
            }
            return None;
        }
        match self.registry.global(&identifier.name) {
            Some(NamespaceMember::Value(decl)) => {
                let function = decl.ty.function_member()?;
                if function.is_generic() {
                    return None;
                }
                Some(
                    function
                        .required
                        .iter()
                        .chain(function.optional.iter())
                        .map(|ty| Some(ty.clone()))
                        .collect(),
                )
            }
            _ => None,
        }
    }
}
