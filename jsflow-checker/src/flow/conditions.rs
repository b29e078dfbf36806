//! Narrowing on conditions.

use super::env::FlowEnv;
use super::ScopeWalker;
use crate::ast::{
    BinaryExpression, BinaryOperator, Expression, ExpressionKind, Literal, LogicalOperator, SourceSpan,
    UnaryOperator,
};
use crate::diagnostics::DiagnosticKind;
use crate::registry::NominalId;
use crate::types::{literal_type, ObjectType, PrimitiveSet, Type, TypeTag};

/// A condition's value and the environments where it is truthy or falsy.
pub(super) struct Branches {
    pub ty: Type,
    pub when_true: FlowEnv,
    pub when_false: FlowEnv,
}

impl Branches {
    fn unsplit(ty: Type, env: FlowEnv) -> Self {
        Self {
            ty,
            when_true: env.clone(),
            when_false: env,
        }
    }

    fn swapped(self, ty: Type) -> Self {
        Self {
            ty,
            when_true: self.when_false,
            when_false: self.when_true,
        }
    }
}

impl ScopeWalker<'_, '_, '_> {
    pub(super) fn branch_on(&mut self, expression: &Expression, mut env: FlowEnv) -> Branches {
        match &expression.kind {
            ExpressionKind::Unary(unary) if unary.operator == UnaryOperator::Not => {
                self.branch_on(&unary.operand, env).swapped(Type::boolean())
            }
            ExpressionKind::Logical(logical) => {
                let left = self.branch_on(&logical.left, env);
                match logical.operator {
                    LogicalOperator::And => {
                        let right = self.branch_on(&logical.right, left.when_true);
                        let ty = self.lattice.join(&self.lattice.falsy(&left.ty), &right.ty);
                        Branches {
                            ty,
                            when_true: right.when_true,
                            when_false: left.when_false.join(&right.when_false, &self.lattice),
                        }
                    }
                    LogicalOperator::Or => {
                        let right = self.branch_on(&logical.right, left.when_false);
                        let ty = self.lattice.join(&self.lattice.truthy(&left.ty), &right.ty);
                        Branches {
                            ty,
                            when_true: left.when_true.join(&right.when_true, &self.lattice),
                            when_false: right.when_false,
                        }
                    }
                }
            }
            ExpressionKind::Binary(binary) if binary.operator.is_equality() => {
                self.equality(binary, env)
            }
            ExpressionKind::Binary(binary) if binary.operator == BinaryOperator::Instanceof => {
                self.instanceof(binary, env)
            }
            ExpressionKind::Binary(binary) if binary.operator == BinaryOperator::In => {
                self.property_test(binary, expression, env)
            }
            _ => {
                let ty = self.infer(expression, &mut env);
                let mut branches = Branches::unsplit(ty, env);
                if let Some(path) = self.path_of(expression) {
                    branches.when_true.refine(&path, self.lattice.truthy(&branches.ty));
                    branches.when_false.refine(&path, self.lattice.falsy(&branches.ty));
                }
                branches
            }
        }
    }

    fn equality(&mut self, binary: &BinaryExpression, mut env: FlowEnv) -> Branches {
        let positive = matches!(binary.operator, BinaryOperator::Equal | BinaryOperator::StrictEqual);
        let strict = matches!(
            binary.operator,
            BinaryOperator::StrictEqual | BinaryOperator::StrictNotEqual
        );

        if let Some((operand, tag)) = typeof_test(&binary.left, &binary.right)
            .or_else(|| typeof_test(&binary.right, &binary.left))
        {
            let ty = self.infer(operand, &mut env);
            let mut branches = Branches::unsplit(Type::boolean(), env);
            if let Some(path) = self.path_of(operand) {
                branches
                    .when_true
                    .refine(&path, self.lattice.narrow_typeof(&ty, tag, true));
                branches
                    .when_false
                    .refine(&path, self.lattice.narrow_typeof(&ty, tag, false));
            }
            return if positive {
                branches
            } else {
                branches.swapped(Type::boolean())
            };
        }

        let left = self.infer(&binary.left, &mut env);
        let right = self.infer(&binary.right, &mut env);
        for (subject, subject_ty, other) in [
            (&*binary.left, &left, &*binary.right),
            (&*binary.right, &right, &*binary.left),
        ] {
            let Some(path) = self.path_of(subject) else {
                continue;
            };
            let Some((tested, excludable)) = compared_value(other, strict) else {
                continue;
            };
            let matching = self.lattice.specialize(subject_ty, &tested);
            let rest = if excludable {
                self.lattice.exclude(subject_ty, &tested)
            } else {
                subject_ty.clone()
            };
            let mut branches = Branches::unsplit(Type::boolean(), env);
            branches.when_true.refine(&path, matching);
            branches.when_false.refine(&path, rest);
            return if positive {
                branches
            } else {
                branches.swapped(Type::boolean())
            };
        }
        Branches::unsplit(Type::boolean(), env)
    }

    fn instanceof(&mut self, binary: &BinaryExpression, mut env: FlowEnv) -> Branches {
        let left = self.infer(&binary.left, &mut env);
        let right = self.infer(&binary.right, &mut env);
        let Some(instance) = self.instanceof_target(&right, binary.right.span) else {
            return Branches::unsplit(Type::boolean(), env);
        };
        let mut branches = Branches::unsplit(Type::boolean(), env);
        if let Some(path) = self.path_of(&binary.left) {
            branches
                .when_true
                .refine(&path, self.lattice.specialize(&left, &instance));
            branches
                .when_false
                .refine(&path, self.lattice.exclude(&left, &instance));
        }
        branches
    }

    /// Instance type produced by the right operand of `instanceof`. Reports
    /// operands that are not constructors.
    pub(super) fn instanceof_target(&mut self, target: &Type, span: SourceSpan) -> Option<Type> {
        if !matches!(target, Type::Union(_)) {
            return None;
        }
        if let [ObjectType::Namespace(namespace)] = target.objects() {
            if let Some((_, constructor)) = self.registry.constructor_of(*namespace) {
                let instance = constructor.constructs.unwrap_or(Type::Unknown);
                let erased = match instance.objects() {
                    [ObjectType::Instance(constructed)] => {
                        Type::instance(constructed.id, vec![Type::Unknown; constructed.args.len()])
                    }
                    _ => instance.clone(),
                };
                return Some(erased);
            }
        }
        if let Some(function) = target.function_member() {
            return function.constructs.clone();
        }
        let is_function_object = target.objects().iter().any(|object| {
            matches!(object, ObjectType::Instance(instance) if instance.id == NominalId::FUNCTION)
        });
        if !is_function_object {
            self.report(
                DiagnosticKind::InvalidInstanceofTarget,
                format!(
                    "right side of instanceof must be a constructor, found {}",
                    self.describe(target)
                ),
                span,
            );
        }
        None
    }

    fn property_test(&mut self, binary: &BinaryExpression, expression: &Expression, mut env: FlowEnv) -> Branches {
        let ty = self.infer(expression, &mut env);
        let mut branches = Branches::unsplit(ty, env);
        let (ExpressionKind::Literal(Literal::String(property)), Some(path)) =
            (&binary.left.kind, self.path_of(&binary.right))
        else {
            return branches;
        };
        let object = self.infer_quietly(&binary.right, &mut branches.when_true);
        self.muted += 1;
        let read = self.read_property(&object, property, binary.left.span);
        self.muted -= 1;
        branches.when_true.refine(
            &format!("{path}.{property}"),
            self.lattice.exclude(&read.ty, &Type::undefined()),
        );
        branches
    }

    fn infer_quietly(&mut self, expression: &Expression, env: &mut FlowEnv) -> Type {
        self.muted += 1;
        let ty = self.infer(expression, env);
        self.muted -= 1;
        ty
    }
}

fn typeof_test<'e>(candidate: &'e Expression, other: &Expression) -> Option<(&'e Expression, TypeTag)> {
    let ExpressionKind::Unary(unary) = &candidate.kind else {
        return None;
    };
    if unary.operator != UnaryOperator::Typeof {
        return None;
    }
    let ExpressionKind::Literal(Literal::String(name)) = &other.kind else {
        return None;
    };
    Some((&*unary.operand, TypeTag::from_typeof(name)?))
}

/// The type an equality test compares against, and whether values of that
/// type are definitely gone when the test fails.
fn compared_value(other: &Expression, strict: bool) -> Option<(Type, bool)> {
    let nullish = |ty: Type| {
        if strict {
            ty
        } else {
            Type::primitive(PrimitiveSet::NULL_OR_UNDEFINED)
        }
    };
    match &other.kind {
        ExpressionKind::Literal(Literal::Null) => Some((nullish(Type::null()), true)),
        ExpressionKind::Literal(Literal::Undefined) => Some((nullish(Type::undefined()), true)),
        ExpressionKind::Identifier(identifier) if identifier.name == "undefined" => {
            Some((nullish(Type::undefined()), true))
        }
        ExpressionKind::Literal(literal @ (Literal::String(_) | Literal::Number(_) | Literal::Boolean(_))) => {
            Some((literal_type(literal), false))
        }
        _ => None,
    }
}
