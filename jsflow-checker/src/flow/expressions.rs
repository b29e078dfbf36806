use indexmap::IndexMap;

use super::env::FlowEnv;
use super::scope::{Local, LocalKind, ScopeId};
use super::ScopeWalker;
use crate::ast::{
    AssignmentExpression, BinaryOperator, CastExpression, Expression, ExpressionKind, Identifier,
    ObjectLiteral, SourceSpan, UnaryOperator,
};
use crate::diagnostics::DiagnosticKind;
use crate::registry::{Declaration, NamespaceMember, NominalId};
use crate::types::{literal_type, PrimitiveSet, Property, RecordType, Type};

impl ScopeWalker<'_, '_, '_> {
    pub(super) fn infer(&mut self, expression: &Expression, env: &mut FlowEnv) -> Type {
        let span = expression.span;
        let ty = match &expression.kind {
            ExpressionKind::Literal(literal) => literal_type(literal),
            ExpressionKind::Identifier(identifier) => self.read_name(identifier, env),
            ExpressionKind::This => env.get("this").cloned().unwrap_or_else(|| self.receiver.clone()),
            ExpressionKind::Member(member) => {
                let object = self.infer(&member.object, env);
                let read = self.read_property(&object, &member.property, member.property_span);
                match self.path_of(expression).and_then(|path| env.get(&path).cloned()) {
                    Some(refined) => refined,
                    None => read.ty,
                }
            }
            ExpressionKind::Index(index) => {
                let object = self.infer(&index.object, env);
                let key = self.infer(&index.index, env);
                self.element_access(&object, &key, span)
            }
            ExpressionKind::Call(call) => self.infer_call(call, span, false, env),
            ExpressionKind::New(call) => self.infer_call(call, span, true, env),
            ExpressionKind::Function(function) => {
                if function.is_arrow {
                    self.requires_transpilation("arrow function", function.span);
                }
                self.function_value(function.id)
            }
            ExpressionKind::Object(object) => self.object_literal(object, env),
            ExpressionKind::Array(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(self.infer(element, env));
                }
                let element = match elements.as_slice() {
                    [] => Type::Unknown,
                    _ => self.lattice.join_all(elements.iter()),
                };
                Type::instance(NominalId::ARRAY, vec![element])
            }
            ExpressionKind::Unary(unary) => {
                let operand = self.infer(&unary.operand, env);
                match unary.operator {
                    UnaryOperator::Not | UnaryOperator::Delete => Type::boolean(),
                    UnaryOperator::Typeof => Type::string(),
                    UnaryOperator::Void => Type::undefined(),
                    UnaryOperator::Positive => Type::number(),
                    UnaryOperator::Negative | UnaryOperator::BitNot => {
                        self.expect_number(&operand, "operand", unary.operand.span);
                        Type::number()
                    }
                }
            }
            ExpressionKind::Update(update) => {
                let current = self.infer(&update.target, env);
                self.expect_number(&current, "operand", update.target.span);
                self.assign_to(&update.target, Type::number(), span, env);
                Type::number()
            }
            ExpressionKind::Binary(binary) => {
                let left = self.infer(&binary.left, env);
                let right = self.infer(&binary.right, env);
                self.binary_result(binary.operator, &left, &right, binary.left.span, binary.right.span)
            }
            ExpressionKind::Logical(_) => {
                let entry = std::mem::replace(env, FlowEnv::dead());
                let branches = self.branch_on(expression, entry);
                *env = branches.when_true.join(&branches.when_false, &self.lattice);
                branches.ty
            }
            ExpressionKind::Conditional(conditional) => {
                let entry = std::mem::replace(env, FlowEnv::dead());
                let branches = self.branch_on(&conditional.test, entry);
                let mut when_true = branches.when_true;
                let consequent = self.infer(&conditional.consequent, &mut when_true);
                let mut when_false = branches.when_false;
                let alternative = self.infer(&conditional.alternative, &mut when_false);
                *env = when_true.join(&when_false, &self.lattice);
                self.lattice.join(&consequent, &alternative)
            }
            ExpressionKind::Assignment(assignment) => self.assignment(assignment, span, env),
            ExpressionKind::Cast(cast) => self.cast(cast, span, env),
        };

        if self.options.report_unknown_types
            && ty.is_unknown()
            && matches!(
                expression.kind,
                ExpressionKind::Identifier(_) | ExpressionKind::Member(_) | ExpressionKind::Call(_)
            )
        {
            let what = expression
                .qualified_name()
                .unwrap_or_else(|| "expression".to_string());
            self.report(
                DiagnosticKind::UnknownExpressionType,
                format!("could not determine the type of {what}"),
                span,
            );
        }
        ty
    }

    /// Environment key for expressions whose type can be narrowed: locals
    /// of the current scope, `this`, and property chains rooted at either.
    pub(super) fn path_of(&self, expression: &Expression) -> Option<String> {
        match &expression.kind {
            ExpressionKind::Identifier(identifier) => match self.tree.resolve(self.scope, &identifier.name) {
                Some((scope, _)) if scope == self.scope => Some(identifier.name.clone()),
                _ => None,
            },
            ExpressionKind::This => Some("this".to_string()),
            ExpressionKind::Member(member) => self
                .path_of(&member.object)
                .map(|object| format!("{object}.{}", member.property)),
            _ => None,
        }
    }

    fn read_name(&mut self, identifier: &Identifier, env: &FlowEnv) -> Type {
        let name = identifier.name.as_str();
        let tree = self.tree;
        match tree.resolve(self.scope, name) {
            Some((scope, local)) if scope == self.scope => env
                .get(name)
                .cloned()
                .unwrap_or_else(|| local.declared.clone().unwrap_or(Type::Unknown)),
            Some((scope, local)) => self.captured(scope, name, local),
            None => match self.global_value(name) {
                Some(ty) => ty,
                None => {
                    self.report(
                        DiagnosticKind::UndefinedName,
                        format!("variable {name} is not declared"),
                        identifier.span,
                    );
                    Type::Unknown
                }
            },
        }
    }

    /// A local of an enclosing scope: its declared type, or everything the
    /// enclosing scope ever assigned to it.
    fn captured(&self, scope: ScopeId, name: &str, local: &Local) -> Type {
        if let Some(declared) = &local.declared {
            return declared.clone();
        }
        if let LocalKind::Function(id) = local.kind {
            return self.function_value(id);
        }
        self.state
            .assigned
            .get(&scope)
            .and_then(|assigned| assigned.get(name))
            .cloned()
            .unwrap_or(Type::Unknown)
    }

    fn global_value(&self, name: &str) -> Option<Type> {
        match name {
            "undefined" => return Some(Type::undefined()),
            "NaN" | "Infinity" => return Some(Type::number()),
            _ => {}
        }
        if let Some(ty) = self
            .registry
            .global(name)
            .and_then(|member| self.registry.member_type(member))
        {
            return Some(ty);
        }
        match self.registry.lookup(name)? {
            Declaration::Nominal(id) => Some(Type::namespace(self.registry.nominal(id).statics)),
            Declaration::Namespace(id) => Some(Type::namespace(id)),
            Declaration::Enum(id) => Some(Type::namespace(self.registry.enum_decl(id).namespace)),
            Declaration::Typedef(_) => None,
        }
    }

    fn object_literal(&mut self, object: &ObjectLiteral, env: &mut FlowEnv) -> Type {
        let mut properties = IndexMap::new();
        for property in &object.properties {
            let value = self.infer(&property.value, env);
            let annotation = property
                .jsdoc
                .as_ref()
                .and_then(|jsdoc| jsdoc.type_annotation.as_ref());
            let entry = match annotation {
                Some(annotation) => {
                    let resolver = self.resolver();
                    let declared = resolver.resolve_or_unknown(annotation, &mut self.state.diagnostics);
                    if !self.lattice.is_subtype(&value, &declared) {
                        let message = self.mismatch(
                            format!(
                                "property {}: found {}, required {}",
                                property.key,
                                self.describe(&value),
                                self.describe(&declared)
                            ),
                            &value,
                            &declared,
                        );
                        self.report(DiagnosticKind::MistypedAssignRhs, message, property.span);
                    }
                    Property::declared(declared)
                }
                None => Property::inferred(value),
            };
            properties.insert(property.key.clone(), entry);
        }
        Type::record(RecordType::exact(properties))
    }

    fn assignment(&mut self, assignment: &AssignmentExpression, span: SourceSpan, env: &mut FlowEnv) -> Type {
        let value = match assignment.operator {
            Some(operator) => {
                let current = self.infer(&assignment.target, env);
                let right = self.infer(&assignment.value, env);
                self.binary_result(operator, &current, &right, assignment.target.span, assignment.value.span)
            }
            None => self.infer(&assignment.value, env),
        };
        self.assign_to(&assignment.target, value.clone(), span, env);
        value
    }

    pub(super) fn assign_to(&mut self, target: &Expression, value: Type, span: SourceSpan, env: &mut FlowEnv) {
        match &target.kind {
            ExpressionKind::Identifier(identifier) => self.assign_name(identifier, value, span, env),
            ExpressionKind::Member(member) => {
                let object = self.infer(&member.object, env);
                self.write_property(&object, &member.object, &member.property, &value, span, env);
            }
            ExpressionKind::Index(index) => {
                let object = self.infer(&index.object, env);
                let key = self.infer(&index.index, env);
                let element = self.element_access(&object, &key, span);
                if !self.lattice.is_subtype(&value, &element) {
                    let message = self.mismatch(
                        format!(
                            "element assignment: found {}, required {}",
                            self.describe(&value),
                            self.describe(&element)
                        ),
                        &value,
                        &element,
                    );
                    self.report(DiagnosticKind::MistypedAssignRhs, message, span);
                }
            }
            _ => {}
        }
    }

    pub(super) fn assign_name(&mut self, identifier: &Identifier, value: Type, span: SourceSpan, env: &mut FlowEnv) {
        let name = identifier.name.as_str();
        let tree = self.tree;
        match tree.resolve(self.scope, name) {
            Some((scope, local)) if scope == self.scope => {
                self.assign_local(env, name, local, value, span, false);
            }
            Some((_, local)) => {
                if local.constant {
                    self.report(
                        DiagnosticKind::ConstReassigned,
                        format!("constant {name} assigned a value more than once"),
                        span,
                    );
                }
                if let Some(declared) = &local.declared {
                    self.check_assignable(name, &value, declared, span);
                }
            }
            None => match self.registry.global(name) {
                Some(NamespaceMember::Value(decl)) => {
                    if decl.constant {
                        self.report(
                            DiagnosticKind::ConstReassigned,
                            format!("constant {name} assigned a value more than once"),
                            span,
                        );
                    }
                    if decl.declared {
                        let declared = decl.ty.clone();
                        self.check_assignable(name, &value, &declared, span);
                    }
                }
                Some(_) => {}
                None if self.registry.lookup(name).is_some() => {}
                None => self.report(
                    DiagnosticKind::UndefinedName,
                    format!("assignment to undeclared variable {name}"),
                    identifier.span,
                ),
            },
        }
    }

    fn check_assignable(&mut self, name: &str, value: &Type, declared: &Type, span: SourceSpan) {
        if !self.lattice.is_subtype(value, declared) {
            let message = self.mismatch(
                format!(
                    "assignment to {name}: found {}, required {}",
                    self.describe(value),
                    self.describe(declared)
                ),
                value,
                declared,
            );
            self.report(DiagnosticKind::MistypedAssignRhs, message, span);
        }
    }

    fn expect_number(&mut self, ty: &Type, role: &str, span: SourceSpan) {
        if !self.lattice.is_subtype(ty, &Type::number()) {
            self.report(
                DiagnosticKind::InvalidOperandType,
                format!("{role} must be number, found {}", self.describe(ty)),
                span,
            );
        }
    }

    pub(super) fn binary_result(
        &mut self,
        operator: BinaryOperator,
        left: &Type,
        right: &Type,
        left_span: SourceSpan,
        right_span: SourceSpan,
    ) -> Type {
        match operator {
            BinaryOperator::Add => {
                if left.is_unknown() || right.is_unknown() {
                    return Type::Unknown;
                }
                let stringy = |ty: &Type| {
                    ty.primitives().intersects(PrimitiveSet::STRING) || ty.has_objects() || ty.is_top()
                };
                if stringy(left) || stringy(right) {
                    Type::string()
                } else {
                    Type::number()
                }
            }
            operator if operator.is_arithmetic() => {
                let symbol = operator.symbol();
                self.expect_number(left, &format!("left operand of {symbol}"), left_span);
                self.expect_number(right, &format!("right operand of {symbol}"), right_span);
                Type::number()
            }
            operator if operator.is_relational() => {
                let number = Type::number();
                let string = Type::string();
                let comparable = (self.lattice.is_subtype(left, &number)
                    && self.lattice.is_subtype(right, &number))
                    || (self.lattice.is_subtype(left, &string) && self.lattice.is_subtype(right, &string));
                if !comparable {
                    self.report(
                        DiagnosticKind::InvalidOperandType,
                        format!(
                            "{} cannot compare {} with {}",
                            operator.symbol(),
                            self.describe(left),
                            self.describe(right)
                        ),
                        SourceSpan::union(&left_span, &right_span),
                    );
                }
                Type::boolean()
            }
            BinaryOperator::Instanceof => {
                self.instanceof_target(right, right_span);
                Type::boolean()
            }
            BinaryOperator::In => {
                if right.is_scalar_only() {
                    self.report(
                        DiagnosticKind::InvalidOperandType,
                        format!("right operand of in must be an object, found {}", self.describe(right)),
                        right_span,
                    );
                }
                Type::boolean()
            }
            _ => Type::boolean(),
        }
    }

    fn cast(&mut self, cast: &CastExpression, span: SourceSpan, env: &mut FlowEnv) -> Type {
        let value = self.infer(&cast.expression, env);
        let resolver = self.resolver();
        let target = resolver.resolve_or_unknown(&cast.annotation, &mut self.state.diagnostics);
        let related = self.lattice.is_subtype(&value, &target)
            || self.lattice.is_subtype(&target, &value)
            || !self.lattice.specialize(&value, &target).is_bottom();
        if !related {
            self.report(
                DiagnosticKind::InvalidCast,
                format!(
                    "cannot cast {} to {}",
                    self.describe(&value),
                    self.describe(&target)
                ),
                span,
            );
        }
        target
    }
}
