//! Turns annotation ASTs into [`Type`] values.

use thiserror::Error;

use crate::ast::{FunctionAnnotation, Identifier, JsDoc, SourceSpan, TypeAnnotation, TypeAnnotationKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::registry::{Declaration, DeclaredParam, DeclaredSignature, ParamKind, Registry, TypedefId};
use crate::types::{FunctionType, Lattice, PrimitiveSet, Property, RecordType, Type};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("unknown type `{name}`")]
    UnknownName { name: String, span: SourceSpan },
    #[error("`{name}` is not a type")]
    NotAType { name: String, span: SourceSpan },
    #[error("type `{name}` is not generic but was given type arguments")]
    NotGeneric { name: String, span: SourceSpan },
    #[error("type `{name}` expects {expected} type arguments, found {found}")]
    WrongArgumentCount {
        name: String,
        expected: usize,
        found: usize,
        span: SourceSpan,
    },
    #[error("union of functions with incompatible `this` types")]
    IncompatibleReceivers { span: SourceSpan },
    #[error("type annotation has no values")]
    Uninhabitable { span: SourceSpan },
    #[error("required parameter follows an optional parameter")]
    RequiredAfterOptional { span: SourceSpan },
    #[error("rest parameter must be the last parameter")]
    RestNotLast { span: SourceSpan },
    #[error("typedef `{name}` refers to itself")]
    CyclicTypedef { name: String, span: SourceSpan },
    #[error("`{what}` is not allowed in this position")]
    Misplaced { what: String, span: SourceSpan },
}

impl ResolveError {
    pub fn span(&self) -> SourceSpan {
        match self {
            ResolveError::UnknownName { span, .. }
            | ResolveError::NotAType { span, .. }
            | ResolveError::NotGeneric { span, .. }
            | ResolveError::WrongArgumentCount { span, .. }
            | ResolveError::IncompatibleReceivers { span }
            | ResolveError::Uninhabitable { span }
            | ResolveError::RequiredAfterOptional { span }
            | ResolveError::RestNotLast { span }
            | ResolveError::CyclicTypedef { span, .. }
            | ResolveError::Misplaced { span, .. } => *span,
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ResolveError::UnknownName { .. } | ResolveError::NotAType { .. } => {
                DiagnosticKind::UnrecognizedTypeName
            }
            ResolveError::NotGeneric { .. } => DiagnosticKind::GenericArgumentsOnNonGenericType,
            ResolveError::WrongArgumentCount { .. } => DiagnosticKind::WrongTypeArgumentCount,
            ResolveError::IncompatibleReceivers { .. } => DiagnosticKind::IncompatibleReceiverUnion,
            ResolveError::Uninhabitable { .. } => DiagnosticKind::UninhabitableType,
            ResolveError::RequiredAfterOptional { .. } => DiagnosticKind::RequiredAfterOptional,
            ResolveError::RestNotLast { .. } => DiagnosticKind::RestNotLast,
            ResolveError::CyclicTypedef { .. } => DiagnosticKind::CyclicTypedef,
            ResolveError::Misplaced { .. } => DiagnosticKind::MisplacedAnnotation,
        }
    }

    pub fn report(&self, diagnostics: &mut Diagnostics) {
        diagnostics.push(self.kind(), self.to_string(), self.span());
    }
}

/// Qualified name of a template parameter declared by `owner`.
pub fn qualify_template(owner: &str, name: &str) -> String {
    format!("{owner}#{name}")
}

/// Result of resolving a function's declared signature. Per-parameter
/// failures fall back to `?` and are listed in `errors`.
#[derive(Debug, Default)]
pub struct SignatureResolution {
    pub signature: DeclaredSignature,
    pub errors: Vec<ResolveError>,
}

pub struct AnnotationResolver<'r> {
    registry: &'r Registry,
    /// Template names in scope, innermost last: (short, qualified).
    templates: Vec<(String, String)>,
}

impl<'r> AnnotationResolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            templates: Vec::new(),
        }
    }

    /// Brings already-qualified template variables into scope.
    pub fn with_qualified_templates(mut self, qualified: &[String]) -> Self {
        for name in qualified {
            let short = name.rsplit('#').next().unwrap_or(name);
            self.templates.push((short.to_string(), name.clone()));
        }
        self
    }

    fn template(&self, name: &str) -> Option<&str> {
        self.templates
            .iter()
            .rev()
            .find(|(short, _)| short == name)
            .map(|(_, qualified)| qualified.as_str())
    }

    fn lattice(&self) -> Lattice<'r> {
        Lattice::new(self.registry)
    }

    pub fn resolve(&self, annotation: &TypeAnnotation) -> Result<Type, ResolveError> {
        let mut typedefs = Vec::new();
        self.resolve_inner(annotation, &mut typedefs)
    }

    /// Resolves, reporting failures and falling back to `?`.
    pub fn resolve_or_unknown(&self, annotation: &TypeAnnotation, diagnostics: &mut Diagnostics) -> Type {
        match self.resolve(annotation) {
            Ok(ty) => ty,
            Err(error) => {
                error.report(diagnostics);
                Type::Unknown
            }
        }
    }

    /// Resolves a typedef's body on its own, detecting self-reference.
    pub fn resolve_typedef(&self, id: TypedefId) -> Result<Type, ResolveError> {
        let mut typedefs = Vec::new();
        self.typedef_type(id, SourceSpan::default(), &mut typedefs)
    }

    fn resolve_inner(&self, annotation: &TypeAnnotation, typedefs: &mut Vec<TypedefId>) -> Result<Type, ResolveError> {
        let span = annotation.span;
        match &annotation.kind {
            TypeAnnotationKind::Any => Ok(Type::Top),
            TypeAnnotationKind::Unknown => Ok(Type::Unknown),
            TypeAnnotationKind::Named { name, arguments } => {
                self.resolve_named(name, arguments, span, typedefs)
            }
            TypeAnnotationKind::Nullable(inner) => {
                let ty = self.resolve_inner(inner, typedefs)?;
                Ok(self.lattice().join(&ty, &Type::null()))
            }
            TypeAnnotationKind::NonNull(inner) => {
                let ty = self.resolve_inner(inner, typedefs)?;
                let ty = match ty {
                    Type::Union(mut union) => {
                        union.primitives = union.primitives.without(PrimitiveSet::NULL);
                        Type::from_union(*union)
                    }
                    other => other,
                };
                if ty.is_bottom() {
                    return Err(ResolveError::Uninhabitable { span });
                }
                Ok(ty)
            }
            TypeAnnotationKind::Optional(inner) => {
                let ty = self.resolve_inner(inner, typedefs)?;
                Ok(self.lattice().join(&ty, &Type::undefined()))
            }
            TypeAnnotationKind::Rest(_) => Err(ResolveError::Misplaced {
                what: "...".to_string(),
                span,
            }),
            TypeAnnotationKind::Union(members) => {
                let mut resolved = Vec::with_capacity(members.len());
                for member in members {
                    resolved.push(self.resolve_inner(member, typedefs)?);
                }
                self.check_receivers(&resolved, span)?;
                let ty = self.lattice().join_all(resolved.iter());
                if ty.is_bottom() {
                    return Err(ResolveError::Uninhabitable { span });
                }
                Ok(ty)
            }
            TypeAnnotationKind::Record(fields) => {
                let mut record = RecordType::default();
                for field in fields {
                    let property = match &field.annotation {
                        Some(TypeAnnotation {
                            kind: TypeAnnotationKind::Optional(inner),
                            ..
                        }) => Property::optional(self.resolve_inner(inner, typedefs)?),
                        Some(annotation) => Property::declared(self.resolve_inner(annotation, typedefs)?),
                        None => Property::declared(Type::Unknown),
                    };
                    record.properties.insert(field.name.clone(), property);
                }
                Ok(Type::record(record))
            }
            TypeAnnotationKind::Function(function) => {
                Ok(Type::function(self.resolve_function(function, span, typedefs)?))
            }
        }
    }

    fn resolve_named(
        &self,
        name: &str,
        arguments: &[TypeAnnotation],
        span: SourceSpan,
        typedefs: &mut Vec<TypedefId>,
    ) -> Result<Type, ResolveError> {
        let primitive = match name {
            "number" => Some(Type::number()),
            "string" => Some(Type::string()),
            "boolean" => Some(Type::boolean()),
            "null" => Some(Type::null()),
            "undefined" | "void" => Some(Type::undefined()),
            _ => None,
        };
        if let Some(ty) = primitive {
            if !arguments.is_empty() {
                return Err(ResolveError::NotGeneric {
                    name: name.to_string(),
                    span,
                });
            }
            return Ok(ty);
        }
        if let Some(qualified) = self.template(name) {
            return Ok(Type::type_var(qualified));
        }
        match self.registry.lookup(name) {
            Some(Declaration::Nominal(id)) => {
                let nominal = self.registry.nominal(id);
                if !arguments.is_empty() && !nominal.is_generic() {
                    return Err(ResolveError::NotGeneric {
                        name: name.to_string(),
                        span,
                    });
                }
                if !arguments.is_empty() && arguments.len() != nominal.type_params.len() {
                    return Err(ResolveError::WrongArgumentCount {
                        name: name.to_string(),
                        expected: nominal.type_params.len(),
                        found: arguments.len(),
                        span,
                    });
                }
                let mut args = Vec::with_capacity(nominal.type_params.len());
                for index in 0..nominal.type_params.len() {
                    match arguments.get(index) {
                        Some(argument) => args.push(self.resolve_inner(argument, typedefs)?),
                        None => args.push(Type::Unknown),
                    }
                }
                let instance = Type::instance(id, args);
                Ok(self.lattice().join(&instance, &Type::null()))
            }
            Some(Declaration::Enum(id)) => {
                if !arguments.is_empty() {
                    return Err(ResolveError::NotGeneric {
                        name: name.to_string(),
                        span,
                    });
                }
                Ok(Type::enum_member(id))
            }
            Some(Declaration::Typedef(id)) => self.typedef_type(id, span, typedefs),
            Some(Declaration::Namespace(_)) => Err(ResolveError::NotAType {
                name: name.to_string(),
                span,
            }),
            None => Err(ResolveError::UnknownName {
                name: name.to_string(),
                span,
            }),
        }
    }

    fn typedef_type(&self, id: TypedefId, span: SourceSpan, typedefs: &mut Vec<TypedefId>) -> Result<Type, ResolveError> {
        let typedef = self.registry.typedef(id);
        if let Some(resolved) = &typedef.resolved {
            return Ok(resolved.clone());
        }
        if typedefs.contains(&id) {
            return Err(ResolveError::CyclicTypedef {
                name: typedef.name.clone(),
                span: if span.line == 0 { typedef.span } else { span },
            });
        }
        let Some(annotation) = &typedef.annotation else {
            return Ok(Type::Unknown);
        };
        typedefs.push(id);
        let result = self.resolve_inner(annotation, typedefs);
        typedefs.pop();
        result
    }

    fn check_receivers(&self, members: &[Type], span: SourceSpan) -> Result<(), ResolveError> {
        let receivers: Vec<&Type> = members
            .iter()
            .filter_map(|member| member.function_member())
            .filter_map(|function| function.receiver.as_ref())
            .collect();
        let lattice = self.lattice();
        for (index, first) in receivers.iter().enumerate() {
            for second in &receivers[index + 1..] {
                if !lattice.is_subtype(first, second) && !lattice.is_subtype(second, first) {
                    return Err(ResolveError::IncompatibleReceivers { span });
                }
            }
        }
        Ok(())
    }

    fn resolve_function(
        &self,
        function: &FunctionAnnotation,
        span: SourceSpan,
        typedefs: &mut Vec<TypedefId>,
    ) -> Result<FunctionType, ResolveError> {
        let mut resolved = FunctionType::new(Vec::new(), Type::Unknown);
        let count = function.parameters.len();
        for (index, parameter) in function.parameters.iter().enumerate() {
            match &parameter.kind {
                TypeAnnotationKind::Rest(inner) => {
                    if index + 1 != count {
                        return Err(ResolveError::RestNotLast {
                            span: parameter.span,
                        });
                    }
                    resolved.rest = Some(self.resolve_inner(inner, typedefs)?);
                }
                TypeAnnotationKind::Optional(inner) => {
                    resolved.optional.push(self.resolve_inner(inner, typedefs)?);
                }
                _ => {
                    if !resolved.optional.is_empty() {
                        return Err(ResolveError::RequiredAfterOptional {
                            span: parameter.span,
                        });
                    }
                    resolved.required.push(self.resolve_inner(parameter, typedefs)?);
                }
            }
        }
        if let Some(receiver) = &function.this_type {
            resolved.receiver = Some(self.resolve_inner(receiver, typedefs)?);
        }
        if let Some(constructs) = &function.new_type {
            let instance = self.resolve_inner(constructs, typedefs)?;
            resolved.constructs = Some(instance.without_null_or_undefined());
            resolved.return_type = Type::undefined();
        }
        if let Some(return_type) = &function.return_type {
            resolved.return_type = self.resolve_inner(return_type, typedefs)?;
        }
        if resolved.constructs.as_ref().is_some_and(Type::is_bottom) {
            return Err(ResolveError::Uninhabitable { span });
        }
        Ok(resolved)
    }

    /// Builds the declared signature of a function literal from its JsDoc.
    ///
    /// Formals without a `@param` tag stay undeclared. A formal tagged `T=`
    /// is optional and `...T` is rest; ordering mistakes are reported and the
    /// offending formal is treated as required.
    pub fn resolve_signature(&self, jsdoc: Option<&JsDoc>, parameters: &[Identifier]) -> SignatureResolution {
        let mut resolution = SignatureResolution::default();
        let mut seen_optional = false;
        let count = parameters.len();
        for (index, parameter) in parameters.iter().enumerate() {
            let annotation = jsdoc.and_then(|doc| doc.param(&parameter.name));
            let (kind, ty) = match annotation {
                None => {
                    let kind = if seen_optional {
                        ParamKind::Optional
                    } else {
                        ParamKind::Required
                    };
                    (kind, None)
                }
                Some(annotation) => match &annotation.kind {
                    TypeAnnotationKind::Rest(inner) => {
                        let ty = self.resolve_or_record(inner, &mut resolution.errors);
                        if index + 1 != count {
                            resolution.errors.push(ResolveError::RestNotLast {
                                span: annotation.span,
                            });
                            (ParamKind::Required, Some(ty))
                        } else {
                            (ParamKind::Rest, Some(ty))
                        }
                    }
                    TypeAnnotationKind::Optional(inner) => {
                        seen_optional = true;
                        let ty = self.resolve_or_record(inner, &mut resolution.errors);
                        (ParamKind::Optional, Some(ty))
                    }
                    _ => {
                        let ty = self.resolve_or_record(annotation, &mut resolution.errors);
                        if seen_optional {
                            resolution.errors.push(ResolveError::RequiredAfterOptional {
                                span: annotation.span,
                            });
                        }
                        (ParamKind::Required, Some(ty))
                    }
                },
            };
            resolution.signature.params.push(DeclaredParam {
                name: parameter.name.clone(),
                ty,
                kind,
            });
        }
        // A required formal after an optional one is demoted so the
        // declared shape stays well-formed.
        if seen_optional {
            let mut optional_seen = false;
            for param in &mut resolution.signature.params {
                match param.kind {
                    ParamKind::Optional => optional_seen = true,
                    ParamKind::Required if optional_seen => param.kind = ParamKind::Optional,
                    _ => {}
                }
            }
        }
        if let Some(doc) = jsdoc {
            if let Some(return_type) = &doc.return_type {
                resolution.signature.return_type =
                    Some(self.resolve_or_record(return_type, &mut resolution.errors));
            }
            if let Some(this_type) = &doc.this_type {
                let receiver = self.resolve_or_record(this_type, &mut resolution.errors);
                resolution.signature.receiver = Some(receiver.without_null_or_undefined());
            }
        }
        resolution
    }

    fn resolve_or_record(&self, annotation: &TypeAnnotation, errors: &mut Vec<ResolveError>) -> Type {
        match self.resolve(annotation) {
            Ok(ty) => ty,
            Err(error) => {
                errors.push(error);
                Type::Unknown
            }
        }
    }

    /// Resolves an `@extends`/`@implements` target to a nominal instance.
    pub fn resolve_nominal_reference(
        &self,
        annotation: &TypeAnnotation,
    ) -> Result<crate::types::NominalInstance, ResolveError> {
        let ty = self.resolve(annotation)?;
        let ty = ty.without_null_or_undefined();
        match ty.objects() {
            [crate::types::ObjectType::Instance(instance)] if ty.member_count() == 1 => {
                Ok(instance.clone())
            }
            _ => Err(ResolveError::NotAType {
                name: annotation_name(annotation),
                span: annotation.span,
            }),
        }
    }
}

/// Best-effort printable name of an annotation, for messages.
pub fn annotation_name(annotation: &TypeAnnotation) -> String {
    match &annotation.kind {
        TypeAnnotationKind::Named { name, .. } => name.clone(),
        TypeAnnotationKind::Nullable(inner)
        | TypeAnnotationKind::NonNull(inner)
        | TypeAnnotationKind::Optional(inner)
        | TypeAnnotationKind::Rest(inner) => annotation_name(inner),
        TypeAnnotationKind::Any => "*".to_string(),
        TypeAnnotationKind::Unknown => "?".to_string(),
        TypeAnnotationKind::Union(_) => "union".to_string(),
        TypeAnnotationKind::Record(_) => "record".to_string(),
        TypeAnnotationKind::Function(_) => "function".to_string(),
    }
}
