//! Property reads and writes on every kind of object type.

use super::env::FlowEnv;
use super::ScopeWalker;
use crate::ast::{AccessDiscipline, Expression, SourceSpan};
use crate::diagnostics::DiagnosticKind;
use crate::registry::{NamespaceKind, NamespaceMember, NominalId, PropertyDecl};
use crate::types::{Lattice, ObjectType, Property, RecordType, Type};

/// Result of reading `object.name`.
pub(super) struct PropertyRead {
    pub ty: Type,
    /// Function literal behind the property, when there is exactly one.
    pub function: Option<usize>,
}

impl PropertyRead {
    fn unknown() -> Self {
        Self {
            ty: Type::Unknown,
            function: None,
        }
    }
}

enum MemberLookup {
    Found { ty: Type, function: Option<usize> },
    Missing,
    /// The member accepts any property.
    Open,
}

impl ScopeWalker<'_, '_, '_> {
    pub(super) fn read_property(&mut self, object: &Type, name: &str, span: SourceSpan) -> PropertyRead {
        if !matches!(object, Type::Union(_)) {
            return PropertyRead::unknown();
        }
        if object.is_null_or_undefined() {
            self.report(
                DiagnosticKind::PropertyAccessOnNonObject,
                format!("cannot read property {name} of {}", self.describe(object)),
                span,
            );
            return PropertyRead::unknown();
        }
        if object.is_nullable() {
            self.report(
                DiagnosticKind::NullableDereference,
                format!(
                    "reading property {name} of {}, which may be null or undefined",
                    self.describe(object)
                ),
                span,
            );
        }

        // Scalars autobox and type variables may be anything.
        let mut open = object
            .as_union()
            .is_some_and(|union| !union.type_vars.is_empty() || !union.enums.is_empty())
            || !object.without_null_or_undefined().primitives().is_empty();
        let mut found: Vec<Type> = Vec::new();
        let mut functions: Vec<Option<usize>> = Vec::new();
        let mut missing = false;
        for member in object.objects() {
            match self.lookup_member(member, name, span) {
                MemberLookup::Found { ty, function } => {
                    found.push(ty);
                    functions.push(function);
                }
                MemberLookup::Missing => missing = true,
                MemberLookup::Open => open = true,
            }
        }

        if found.is_empty() {
            if missing && !open {
                self.report(
                    DiagnosticKind::InexistentProperty,
                    format!("property {name} never defined on {}", self.describe(object)),
                    span,
                );
            }
            return PropertyRead::unknown();
        }
        if missing {
            self.report(
                DiagnosticKind::PossiblyInexistentProperty,
                format!(
                    "property {name} may not be defined on every member of {}",
                    self.describe(object)
                ),
                span,
            );
        }
        let function = match functions.as_slice() {
            [single] => *single,
            _ => None,
        };
        PropertyRead {
            ty: self.lattice.join_all(found.iter()),
            function,
        }
    }

    fn lookup_member(&mut self, member: &ObjectType, name: &str, span: SourceSpan) -> MemberLookup {
        match member {
            ObjectType::Instance(instance) => {
                if instance.id == NominalId::OBJECT {
                    return MemberLookup::Open;
                }
                if self.registry.access_of(instance.id) == AccessDiscipline::Dict {
                    self.report(
                        DiagnosticKind::IllegalDotAccessOnDict,
                        format!(
                            "dict type {} must be accessed with brackets, not .{name}",
                            self.registry.nominal(instance.id).name
                        ),
                        span,
                    );
                    return MemberLookup::Open;
                }
                match self.registry.lookup_property(instance, name) {
                    Some(lookup) => MemberLookup::Found {
                        ty: property_value(&lookup.decl, &self.lattice),
                        function: lookup.decl.function,
                    },
                    None => MemberLookup::Missing,
                }
            }
            ObjectType::Record(record) => match record.property(name) {
                Some(property) => MemberLookup::Found {
                    ty: record_value(property, &self.lattice),
                    function: None,
                },
                None if record.loose => MemberLookup::Open,
                None => MemberLookup::Missing,
            },
            ObjectType::Function(_) => MemberLookup::Open,
            ObjectType::Namespace(id) => {
                let namespace = self.registry.namespace(*id);
                if let Some(NamespaceMember::Value(decl)) = namespace.members.get(name) {
                    return MemberLookup::Found {
                        ty: property_value(decl, &self.lattice),
                        function: decl.function,
                    };
                }
                if let Some(ty) = self.registry.namespace_property(*id, name) {
                    return MemberLookup::Found { ty, function: None };
                }
                match namespace.kind {
                    NamespaceKind::Global | NamespaceKind::Incidental => MemberLookup::Open,
                    NamespaceKind::Constructor(_) if name == "prototype" => MemberLookup::Open,
                    NamespaceKind::Real | NamespaceKind::Constructor(_) | NamespaceKind::Enum(_) => {
                        MemberLookup::Missing
                    }
                }
            }
        }
    }

    /// Checks `object.name = value` and records the refinement.
    pub(super) fn write_property(
        &mut self,
        object: &Type,
        object_expression: &Expression,
        name: &str,
        value: &Type,
        span: SourceSpan,
        env: &mut FlowEnv,
    ) {
        let mut stored = value.clone();
        if object.is_null_or_undefined() {
            self.report(
                DiagnosticKind::PropertyAccessOnNonObject,
                format!("cannot set property {name} of {}", self.describe(object)),
                span,
            );
        } else if object.is_nullable() {
            self.report(
                DiagnosticKind::NullableDereference,
                format!(
                    "setting property {name} of {}, which may be null or undefined",
                    self.describe(object)
                ),
                span,
            );
        }

        for member in object.objects() {
            match member {
                ObjectType::Instance(instance) => {
                    if instance.id == NominalId::OBJECT {
                        continue;
                    }
                    let access = self.registry.access_of(instance.id);
                    if access == AccessDiscipline::Dict {
                        self.report(
                            DiagnosticKind::IllegalDotAccessOnDict,
                            format!(
                                "dict type {} must be written with brackets, not .{name}",
                                self.registry.nominal(instance.id).name
                            ),
                            span,
                        );
                        continue;
                    }
                    match self.registry.lookup_property(instance, name) {
                        Some(lookup) => {
                            if let Some(declared) = self.check_property_write(&lookup.decl, name, value, span) {
                                stored = declared;
                            }
                        }
                        None if access == AccessDiscipline::Struct => {
                            self.report(
                                DiagnosticKind::IllegalPropertyCreationOnStruct,
                                format!(
                                    "cannot add property {name} to struct {}",
                                    self.registry.nominal(instance.id).name
                                ),
                                span,
                            );
                        }
                        None => {}
                    }
                }
                ObjectType::Record(record) => {
                    if let Some(property) = record.property(name) {
                        let expected = record_value(property, &self.lattice);
                        if property.declared && !self.lattice.is_subtype(value, &expected) {
                            let message = self.mismatch(
                                format!(
                                    "assignment to property {name}: found {}, required {}",
                                    self.describe(value),
                                    self.describe(&expected)
                                ),
                                value,
                                &expected,
                            );
                            self.report(DiagnosticKind::MistypedAssignRhs, message, span);
                            stored = expected;
                        }
                    }
                }
                ObjectType::Namespace(id) => {
                    if let Some(NamespaceMember::Value(decl)) =
                        self.registry.namespace(*id).members.get(name).cloned()
                    {
                        if let Some(declared) = self.check_property_write(&decl, name, value, span) {
                            stored = declared;
                        }
                    }
                }
                ObjectType::Function(_) => {}
            }
        }

        let Some(path) = self.path_of(object_expression) else {
            return;
        };
        // New properties on a local exact record extend its shape.
        if !path.contains('.') && path != "this" {
            if let [ObjectType::Record(record)] = object.objects() {
                if !record.loose && record.property(name).is_none() && object.member_count() == 1 {
                    let mut extended: RecordType = record.clone();
                    extended
                        .properties
                        .insert(name.to_string(), Property::inferred(stored.clone()));
                    env.refine(&path, Type::record(extended));
                }
            }
        }
        env.set(&format!("{path}.{name}"), stored);
    }

    /// Returns the declared type to keep in the environment when the value
    /// does not fit it.
    fn check_property_write(
        &mut self,
        decl: &PropertyDecl,
        name: &str,
        value: &Type,
        span: SourceSpan,
    ) -> Option<Type> {
        if decl.constant && decl.span != span {
            self.report(
                DiagnosticKind::ConstPropertyReassigned,
                format!("constant property {name} assigned a value more than once"),
                span,
            );
        }
        let expected = property_value(decl, &self.lattice);
        if decl.declared && !self.lattice.is_subtype(value, &expected) {
            let message = self.mismatch(
                format!(
                    "assignment to property {name}: found {}, required {}",
                    self.describe(value),
                    self.describe(&expected)
                ),
                value,
                &expected,
            );
            self.report(DiagnosticKind::MistypedAssignRhs, message, span);
            return Some(expected);
        }
        None
    }

    /// `object[index]`, read or written.
    pub(super) fn element_access(&mut self, object: &Type, index: &Type, span: SourceSpan) -> Type {
        if !matches!(object, Type::Union(_)) {
            return Type::Unknown;
        }
        if object.is_null_or_undefined() {
            self.report(
                DiagnosticKind::PropertyAccessOnNonObject,
                format!("cannot index {}", self.describe(object)),
                span,
            );
            return Type::Unknown;
        }
        if object.is_nullable() {
            self.report(
                DiagnosticKind::NullableDereference,
                format!("indexing {}, which may be null or undefined", self.describe(object)),
                span,
            );
        }
        let mut elements = Vec::new();
        for member in object.objects() {
            let ObjectType::Instance(instance) = member else {
                elements.push(Type::Unknown);
                continue;
            };
            if instance.id == NominalId::ARRAY {
                if !self.lattice.is_subtype(index, &Type::number()) {
                    self.report(
                        DiagnosticKind::InvalidIndexType,
                        format!("array index must be number, found {}", self.describe(index)),
                        span,
                    );
                }
                elements.push(instance.args.first().cloned().unwrap_or(Type::Unknown));
                continue;
            }
            if self.registry.access_of(instance.id) == AccessDiscipline::Struct {
                self.report(
                    DiagnosticKind::IllegalBracketAccessOnStruct,
                    format!(
                        "struct type {} cannot be accessed with brackets",
                        self.registry.nominal(instance.id).name
                    ),
                    span,
                );
            }
            elements.push(Type::Unknown);
        }
        match elements.as_slice() {
            [] => Type::Unknown,
            _ => self.lattice.join_all(elements.iter()),
        }
    }
}

fn property_value(decl: &PropertyDecl, lattice: &Lattice<'_>) -> Type {
    if decl.optional {
        lattice.join(&decl.ty, &Type::undefined())
    } else {
        decl.ty.clone()
    }
}

fn record_value(property: &Property, lattice: &Lattice<'_>) -> Type {
    if property.optional {
        lattice.join(&property.ty, &Type::undefined())
    } else {
        property.ty.clone()
    }
}
