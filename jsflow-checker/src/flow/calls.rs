use super::env::FlowEnv;
use super::scope::LocalKind;
use super::ScopeWalker;
use crate::ast::{CallExpression, ExpressionKind, SourceSpan};
use crate::deferred::{CallSite, DeferredCheck};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::registry::{NamespaceMember, NominalId, NominalKind, ParamKind};
use crate::types::{FunctionType, Lattice, NominalInstance, ObjectType, Substitution, Type, UnifyError};

/// Checks a call against the callee's signature and returns the call's
/// result type.
pub(crate) fn check_call(
    lattice: &Lattice<'_>,
    diagnostics: &mut Diagnostics,
    site: &CallSite,
    callee: &FunctionType,
    arguments: &[Type],
    receiver: Option<&Type>,
) -> Type {
    let registry = lattice.registry();
    if callee.loose {
        return callee.return_type.clone();
    }

    let count = arguments.len();
    let (min, max) = match site.legacy_min_arity {
        Some(min) => (min, None),
        None => (callee.min_arity(), callee.max_arity()),
    };
    if count < min || max.is_some_and(|max| count > max) {
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("between {min} and {max}"),
            None => format!("at least {min}"),
        };
        diagnostics.push(
            DiagnosticKind::WrongArgumentCount,
            format!(
                "{} called with {count} argument(s) but expects {expected}",
                site.callee_name
            ),
            site.span,
        );
    }

    let function = if callee.is_generic() {
        let mut bindings = Substitution::new();
        let mut ambiguous = Vec::new();
        for (index, argument) in arguments.iter().enumerate() {
            let Some(param) = callee.param(index) else {
                break;
            };
            if let Err(UnifyError::NotUnique { var, first, second }) =
                lattice.unify(param, argument, &callee.type_params, &mut bindings)
            {
                diagnostics.push(
                    DiagnosticKind::NotUniqueInstantiation,
                    format!(
                        "cannot instantiate {} in call to {}: it would be both {} and {}",
                        short_name(&var),
                        site.callee_name,
                        first.describe(registry),
                        second.describe(registry)
                    ),
                    site.argument_span(index),
                );
                ambiguous.push(var);
            }
        }
        if let (Some(expected), Some(actual)) = (&callee.receiver, receiver) {
            // A receiver that does not fit is reported below.
            if let Err(UnifyError::NotUnique { var, first, second }) =
                lattice.unify(expected, actual, &callee.type_params, &mut bindings)
            {
                diagnostics.push(
                    DiagnosticKind::NotUniqueInstantiation,
                    format!(
                        "cannot instantiate {} in call to {}: the receiver would make it both {} and {}",
                        short_name(&var),
                        site.callee_name,
                        first.describe(registry),
                        second.describe(registry)
                    ),
                    site.span,
                );
                ambiguous.push(var);
            }
        }
        for var in ambiguous {
            bindings.insert(var, Type::Unknown);
        }
        lattice.instantiate(callee, &bindings)
    } else {
        callee.clone()
    };

    for (index, argument) in arguments.iter().enumerate() {
        let Some(param) = function.param(index) else {
            break;
        };
        if !lattice.is_subtype(argument, param) {
            let headline = format!(
                "argument {} of {}: found {}, required {}",
                index + 1,
                site.callee_name,
                argument.describe(registry),
                param.describe(registry)
            );
            let message = match lattice.explain_mismatch(argument, param) {
                Some(detail) => format!("{headline}: {detail}"),
                None => headline,
            };
            diagnostics.push(
                DiagnosticKind::InvalidArgumentType,
                message,
                site.argument_span(index),
            );
        }
    }

    if !site.is_new {
        if let (Some(expected), Some(actual)) = (&function.receiver, receiver) {
            if !lattice.is_subtype(actual, expected) {
                diagnostics.push(
                    DiagnosticKind::InvalidThisType,
                    format!(
                        "{} must be called on {}, not {}",
                        site.callee_name,
                        expected.describe(registry),
                        actual.describe(registry)
                    ),
                    site.span,
                );
            }
        }
    }

    if site.is_new {
        function.constructs.clone().unwrap_or(Type::Unknown)
    } else {
        function.return_type.clone()
    }
}

fn short_name(var: &str) -> &str {
    var.rsplit('#').next().unwrap_or(var)
}

impl ScopeWalker<'_, '_, '_> {
    pub(super) fn infer_call(
        &mut self,
        call: &CallExpression,
        span: SourceSpan,
        is_new: bool,
        env: &mut FlowEnv,
    ) -> Type {
        let (callee, receiver, function) = match &call.callee.kind {
            ExpressionKind::Member(member) => {
                let object = self.infer(&member.object, env);
                let read = self.read_property(&object, &member.property, member.property_span);
                let refined = self
                    .path_of(&call.callee)
                    .and_then(|path| env.get(&path).cloned());
                let receiver = object.without_null_or_undefined();
                (refined.unwrap_or(read.ty), Some(receiver), read.function)
            }
            ExpressionKind::Identifier(identifier) => {
                let callee = self.infer(&call.callee, env);
                (callee, None, self.function_named(&identifier.name))
            }
            _ => (self.infer(&call.callee, env), None, None),
        };

        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.infer(argument, env));
        }

        let mut site = CallSite::new(
            span,
            call.callee
                .qualified_name()
                .unwrap_or_else(|| "function".to_string()),
        );
        site.argument_spans = call.arguments.iter().map(|argument| argument.span).collect();
        site.is_new = is_new;
        self.dispatch_call(site, &callee, receiver, function, arguments)
    }

    /// Function literal a bare name is bound to.
    fn function_named(&self, name: &str) -> Option<usize> {
        if let Some((_, local)) = self.tree.resolve(self.scope, name) {
            return match local.kind {
                LocalKind::Function(id) => Some(id),
                _ => local.function,
            };
        }
        match self.registry.global(name) {
            Some(NamespaceMember::Value(decl)) => decl.function,
            _ => None,
        }
    }

    fn dispatch_call(
        &mut self,
        mut site: CallSite,
        callee: &Type,
        receiver: Option<Type>,
        function: Option<usize>,
        arguments: Vec<Type>,
    ) -> Type {
        if !matches!(callee, Type::Union(_)) {
            return Type::Unknown;
        }
        if callee.is_null_or_undefined() {
            self.report(
                DiagnosticKind::NotCallable,
                format!("{} is {} and cannot be called", site.callee_name, self.describe(callee)),
                site.span,
            );
            return Type::Unknown;
        }

        if let [ObjectType::Namespace(namespace)] = callee.objects() {
            if let Some((nominal, constructor)) = self.registry.constructor_of(*namespace) {
                return self.construct(site, nominal, &constructor, &arguments);
            }
        }

        let Some(signature) = callee.function_member().cloned() else {
            let callable = callee.objects().iter().any(|object| {
                matches!(object, ObjectType::Instance(NominalInstance { id, .. }) if *id == NominalId::FUNCTION)
            });
            if !callable {
                let kind = if site.is_new {
                    DiagnosticKind::NotAConstructor
                } else {
                    DiagnosticKind::NotCallable
                };
                self.report(
                    kind,
                    format!("{} has type {}, which is not callable", site.callee_name, self.describe(callee)),
                    site.span,
                );
            }
            return Type::Unknown;
        };

        if site.is_new && !signature.is_constructor() && !signature.loose {
            self.report(
                DiagnosticKind::NotAConstructor,
                format!("{} is not a constructor", site.callee_name),
                site.span,
            );
            return Type::Unknown;
        }

        let Some(id) = function else {
            return self.check_now(&site, &signature, &arguments, receiver.as_ref());
        };
        let registry = self.registry;
        let decl = registry.function(id);
        if self.options.legacy_compatibility {
            if let Some(decl) = decl.filter(|decl| decl.signature.has_undeclared_params()) {
                site.legacy_min_arity = Some(
                    decl.signature
                        .params
                        .iter()
                        .rposition(|param| param.ty.is_some() && param.kind == ParamKind::Required)
                        .map_or(0, |last| last + 1),
                );
            }
        }
        if let Some(summary) = self.state.summaries.get(&id) {
            let summary = summary.function.clone();
            return self.check_now(&site, &summary, &arguments, receiver.as_ref());
        }
        match decl {
            Some(decl) if !decl.from_externs && !decl.signature.is_complete() => {
                let result = match (&decl.signature.return_type, &decl.signature.constructs) {
                    (_, Some(constructs)) if site.is_new => constructs.clone(),
                    (Some(declared), _) => declared.clone(),
                    _ => Type::Unknown,
                };
                if self.muted == 0 {
                    self.state.deferred.defer(DeferredCheck {
                        site,
                        callee: id,
                        arguments,
                        receiver,
                    });
                }
                result
            }
            _ => self.check_now(&site, &signature, &arguments, receiver.as_ref()),
        }
    }

    fn construct(
        &mut self,
        site: CallSite,
        nominal: NominalId,
        constructor: &FunctionType,
        arguments: &[Type],
    ) -> Type {
        let registry = self.registry;
        let declared = registry.nominal(nominal);
        let name = declared.name.clone();
        if !site.is_new {
            if declared.kind == NominalKind::Class {
                self.report(
                    DiagnosticKind::ConstructorCalledWithoutNew,
                    format!("constructor {name} must be called with new"),
                    site.span,
                );
            }
            return Type::Unknown;
        }
        if declared.kind.is_interface() {
            self.report(
                DiagnosticKind::CannotInstantiateInterface,
                format!("cannot instantiate interface {name}"),
                site.span,
            );
            return Type::Unknown;
        }
        if declared.is_abstract {
            self.report(
                DiagnosticKind::CannotInstantiateAbstractClass,
                format!("cannot instantiate abstract class {name}"),
                site.span,
            );
        }
        self.check_now(&site, constructor, arguments, None)
    }

    fn check_now(
        &mut self,
        site: &CallSite,
        callee: &FunctionType,
        arguments: &[Type],
        receiver: Option<&Type>,
    ) -> Type {
        if self.muted > 0 {
            let mut scratch = Diagnostics::new();
            return check_call(&self.lattice, &mut scratch, site, callee, arguments, receiver);
        }
        check_call(
            &self.lattice,
            &mut self.state.diagnostics,
            site,
            callee,
            arguments,
            receiver,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn receiver_conflicting_with_arguments_is_not_unique() {
        // @template T @this {T} @param {T} x @return {T}
        let var = "pick@1#T";
        let mut pick = FunctionType::new(vec![Type::type_var(var)], Type::type_var(var));
        pick.receiver = Some(Type::type_var(var));
        pick.type_params = vec![var.to_string()];

        let registry = Registry::new();
        let lattice = Lattice::new(&registry);
        let mut diagnostics = Diagnostics::new();
        let mut site = CallSite::new(SourceSpan::new(4, 1, 4, 20), "holder.pick");
        site.argument_spans = vec![SourceSpan::new(4, 13, 4, 19)];

        let result = check_call(
            &lattice,
            &mut diagnostics,
            &site,
            &pick,
            &[Type::string()],
            Some(&Type::number()),
        );

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.entries()[0].kind,
            DiagnosticKind::NotUniqueInstantiation
        );
        assert!(diagnostics.entries()[0].message.contains("receiver"));
        assert!(result.is_unknown());
    }
}
